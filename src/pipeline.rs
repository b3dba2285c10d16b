//! Pipeline spawns and supervises the session's processing tasks
//!
//! ```text
//! Source ──fragments──▶ parser task ──messages──▶ scheduler ──▶ output queues
//! ```
//!
//! Every channel is bounded, so a stalled consumer eventually holds back the
//! reader. All three tasks share one cancellation token and observe it at
//! every blocking point.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, trace, warn};

use crate::TimingError;
use crate::parser::Parser;
use crate::queues::OutputQueues;
use crate::scheduler::{PlaybackHandle, Scheduler, SchedulerConfig, SchedulerReport};
use crate::source::Source;
use crate::types::{Message, RawFragment};

/// Consecutive read errors tolerated before the reader gives up.
const MAX_ERRORS: u32 = 10;

/// Channel sizes between the tasks.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fragment_capacity: usize,
    pub message_capacity: usize,
    pub scheduler: SchedulerConfig,
}

/// Totals from every task once the pipeline has stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub fragments_read: u64,
    pub messages_parsed: u64,
    pub scheduler: SchedulerReport,
}

/// Handles onto the three running tasks.
pub struct Pipeline {
    reader: JoinHandle<u64>,
    parser: JoinHandle<u64>,
    scheduler: JoinHandle<SchedulerReport>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Spawn the reader, parser, and scheduler tasks.
    ///
    /// `source` must already be connected. Each task runs inside a child of
    /// `span`, so its logs carry the session's context.
    pub fn spawn<S>(
        source: S,
        parser: Parser,
        output: OutputQueues,
        handle: PlaybackHandle,
        config: PipelineConfig,
        cancel: CancellationToken,
        span: &Span,
    ) -> Self
    where
        S: Source,
    {
        let (fragment_tx, fragment_rx) = mpsc::channel(config.fragment_capacity.max(1));
        let (message_tx, message_rx) = mpsc::channel(config.message_capacity.max(1));

        let reader = tokio::spawn(
            reader_task(source, fragment_tx, cancel.clone())
                .instrument(tracing::debug_span!(parent: span, "reader")),
        );
        let parser = tokio::spawn(
            parser_task(parser, fragment_rx, message_tx, cancel.clone())
                .instrument(tracing::debug_span!(parent: span, "parser")),
        );
        let scheduler = Scheduler::new(config.scheduler, message_rx, output, handle, cancel.clone());
        let scheduler =
            tokio::spawn(scheduler.run().instrument(tracing::debug_span!(parent: span, "scheduler")));

        Self { reader, parser, scheduler, cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether every task has exited.
    pub fn is_finished(&self) -> bool {
        self.reader.is_finished() && self.parser.is_finished() && self.scheduler.is_finished()
    }

    /// Wait for all tasks to exit.
    ///
    /// Does not cancel; call [`Pipeline::cancel`] first to stop early.
    pub async fn join(self) -> PipelineReport {
        let fragments_read = self.reader.await.unwrap_or_else(|e| {
            error!("Reader task failed: {}", e);
            0
        });
        let messages_parsed = self.parser.await.unwrap_or_else(|e| {
            error!("Parser task failed: {}", e);
            0
        });
        let scheduler = self.scheduler.await.unwrap_or_else(|e| {
            error!("Scheduler task failed: {}", e);
            SchedulerReport { cancelled: true, ..SchedulerReport::default() }
        });

        PipelineReport { fragments_read, messages_parsed, scheduler }
    }
}

/// Reader task - pulls fragments from the source into the parser channel
async fn reader_task<S>(mut source: S, fragments: mpsc::Sender<RawFragment>, cancel: CancellationToken) -> u64
where
    S: Source,
{
    info!("Reader task started");
    let mut fragment_count = 0u64;
    let mut error_count = 0u32;

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Reader cancelled during read");
                break;
            }
            result = source.next_fragment() => result,
        };

        match result {
            Ok(Some(fragment)) => {
                fragment_count += 1;
                error_count = 0;
                trace!("Fragment {}: {} at {}", fragment_count, fragment.category, fragment.timestamp);

                let sent = tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Reader cancelled while parser was busy");
                        break;
                    }
                    sent = fragments.send(fragment) => sent,
                };
                if sent.is_err() {
                    debug!("Parser dropped, shutting down reader");
                    break;
                }
            }
            Ok(None) => {
                info!("Source ended after {} fragments", fragment_count);
                break;
            }
            Err(e) => {
                // Don't end the feed on transient failures
                error_count += 1;
                error!("Source error ({}/{}): {}", error_count, MAX_ERRORS, e);

                if error_count >= MAX_ERRORS {
                    error!("Too many source errors, ending feed");
                    break;
                }

                // Exponential backoff: 100ms, 200ms, 400ms, ... capped at 1.6s
                let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }
    }

    info!("Reader task ended (read {} fragments)", fragment_count);
    fragment_count
}

/// Parser task - folds fragments into session state and forwards messages
async fn parser_task(
    mut parser: Parser,
    mut fragments: mpsc::Receiver<RawFragment>,
    messages: mpsc::Sender<Message>,
    cancel: CancellationToken,
) -> u64 {
    info!(requested = ?parser.requested(), "Parser task started");
    let mut message_count = 0u64;

    'fragments: loop {
        let fragment = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Parser cancelled");
                break;
            }
            fragment = fragments.recv() => match fragment {
                Some(fragment) => fragment,
                None => break,
            },
        };

        let parsed = parser.parse(&fragment);
        for error in &parsed.errors {
            match error {
                TimingError::UnknownVariant { .. } => warn!(category = %fragment.category, "{}", error),
                _ => debug!(category = %fragment.category, "{}", error),
            }
        }

        for message in parsed.messages {
            let sent = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Parser cancelled while scheduler was busy");
                    break 'fragments;
                }
                sent = messages.send(message) => sent,
            };
            if sent.is_err() {
                debug!("Scheduler dropped, shutting down parser");
                break 'fragments;
            }
            message_count += 1;
        }
    }

    info!(
        "Parser task ended ({} fragments, {} messages)",
        parser.fragments_parsed(),
        message_count
    );
    message_count
}
