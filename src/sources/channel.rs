//! Push-fed source for external transports

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::source::{Source, SourceControl};
use crate::types::RawFragment;
use crate::{Result, TimingError};

/// Source fed through an `mpsc` sender.
///
/// Adapts any transport (websocket client, HTTP archive fetcher) that
/// produces fragments on its own task. The feed ends when every sender is
/// dropped.
pub struct ChannelSource {
    receiver: mpsc::Receiver<RawFragment>,
    control: Option<Arc<dyn SourceControl>>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<RawFragment>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self { receiver, control: None })
    }

    /// Wrap an existing receiver.
    pub fn from_receiver(receiver: mpsc::Receiver<RawFragment>) -> Self {
        Self { receiver, control: None }
    }

    /// Attach the transport's cursor controls.
    pub fn with_control(mut self, control: Arc<dyn SourceControl>) -> Self {
        self.control = Some(control);
        self
    }
}

#[async_trait::async_trait]
impl Source for ChannelSource {
    async fn connect(&mut self) -> Result<()> {
        if self.receiver.is_closed() && self.receiver.is_empty() {
            return Err(TimingError::connection_failed("feed transport closed before connecting"));
        }
        debug!("Channel source connected");
        Ok(())
    }

    async fn next_fragment(&mut self) -> Result<Option<RawFragment>> {
        Ok(self.receiver.recv().await)
    }

    fn control(&self) -> Option<Arc<dyn SourceControl>> {
        self.control.clone()
    }
}
