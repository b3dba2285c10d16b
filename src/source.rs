//! Raw source trait for live-timing feeds

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::types::RawFragment;

/// Trait for raw feed sources.
///
/// Sources abstract over where fragments come from (live socket, archived
/// replay, local capture file). They deliver fragments in arrival order and
/// never pace them: timing is the scheduler's job.
#[async_trait::async_trait]
pub trait Source: Send + 'static {
    /// Open the underlying transport.
    ///
    /// Failures here are fatal: the session is never created.
    async fn connect(&mut self) -> Result<()>;

    /// Get the next fragment
    ///
    /// Returns:
    /// - `Ok(Some(fragment))` - New fragment available
    /// - `Ok(None)` - Feed ended (normal termination)
    /// - `Err(e)` - Read failed; the reader retries with backoff
    async fn next_fragment(&mut self) -> Result<Option<RawFragment>>;

    /// Seek controls, for sources that can move their own cursor.
    fn control(&self) -> Option<Arc<dyn SourceControl>> {
        None
    }
}

#[async_trait::async_trait]
impl<S: Source + ?Sized> Source for Box<S> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn next_fragment(&mut self) -> Result<Option<RawFragment>> {
        (**self).next_fragment().await
    }

    fn control(&self) -> Option<Arc<dyn SourceControl>> {
        (**self).control()
    }
}

/// Cursor controls exposed by seekable replay transports.
pub trait SourceControl: Send + Sync {
    /// Move the source's own cursor forward by `delta` of session time.
    fn increment_time(&self, delta: Duration);

    /// Move the cursor to the session start, returning that instant if known.
    fn jump_to_start(&self) -> Option<DateTime<Utc>>;
}
