//! Raw source implementations

pub mod archive;
pub mod archiving;
pub mod channel;

pub use archive::ArchiveSource;
pub use archiving::ArchivingSource;
pub use channel::ChannelSource;
