//! Timing session orchestrator.
//!
//! [`TimingSession`] wires a [`Source`] to the parser, the pacing scheduler
//! and the output queues, then hands the queues to the consumer:
//!
//! ```rust,no_run
//! use paddock::{SessionConfig, TimingSession};
//!
//! #[tokio::main]
//! async fn main() -> paddock::Result<()> {
//!     let mut session = TimingSession::debug_replay("capture.txt", SessionConfig::default()).await?;
//!     let mut queues = session.take_queues().expect("queues are taken once");
//!
//!     while let Some(timing) = queues.timing.recv().await {
//!         println!("{} P{} {:?}", timing.name, timing.position, timing.last_lap);
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info};

use crate::config::SessionConfig;
use crate::event::RaceEvent;
use crate::parser::{Parser, TelemetryFilter};
use crate::pipeline::{Pipeline, PipelineReport};
use crate::queues::{self, MessageQueues, QueueDepths, QueueProbe};
use crate::scheduler::PlaybackHandle;
use crate::source::{Source, SourceControl};
use crate::sources::{ArchiveSource, ArchivingSource};
use crate::types::{FlowMode, SessionType};
use crate::Result;

/// How the session's fragments are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Live feed, paced in real time
    Live,
    /// Recorded session from the static archive
    Replay,
    /// Live feed that is also written to a local archive
    ArchivedLive,
    /// Local archive written by an archived-live session
    DebugReplay,
}

/// Descriptive data about the session, known before any fragment arrives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub name: String,
    pub session_type: Option<SessionType>,
    /// IANA timezone of the circuit
    pub timezone: Option<String>,
    pub track: String,
    pub track_year: Option<i32>,
    #[serde(rename = "time_lost_in_pitlane_ms", with = "crate::config::millis")]
    pub time_lost_in_pitlane: Duration,
    /// Scheduled start
    pub session_start: Option<DateTime<Utc>>,
}

/// A running timing session.
///
/// Dropping the session cancels its tasks; [`TimingSession::close`] also
/// waits for them, after which every queue reports end of stream.
pub struct TimingSession {
    kind: SourceKind,
    metadata: SessionMetadata,
    queues: Option<MessageQueues>,
    filter: TelemetryFilter,
    playback: PlaybackHandle,
    control: Option<Arc<dyn SourceControl>>,
    session_start: watch::Receiver<Option<DateTime<Utc>>>,
    probe: QueueProbe,
    cancel: CancellationToken,
    pipeline: Option<Pipeline>,
    span: Span,
}

impl TimingSession {
    /// Connect `source` and spawn the processing tasks.
    ///
    /// Returns once the tasks are running. A source that cannot connect fails
    /// the call and nothing is spawned.
    pub async fn start<S>(kind: SourceKind, mut source: S, metadata: SessionMetadata, config: SessionConfig) -> Result<Self>
    where
        S: Source,
    {
        let config = config.normalized()?;
        let span = tracing::info_span!("session", name = %metadata.name, kind = ?kind);
        info!(parent: &span, flow = ?config.flow, speed = config.speed, "Starting timing session");

        source.connect().await?;
        let control = source.control();

        let parser = Parser::new(config.data_sources);
        let filter = parser.telemetry_filter().clone();
        let session_start = parser.session_start_updates();

        let (output, queues) = queues::channel(&config.queues)?;
        let probe = output.probe();
        let playback = PlaybackHandle::new(config.speed, config.start_paused);
        let cancel = CancellationToken::new();

        let pipeline =
            Pipeline::spawn(source, parser, output, playback.clone(), config.pipeline_config(), cancel.clone(), &span);

        info!(parent: &span, "Timing session running");
        Ok(Self {
            kind,
            metadata,
            queues: Some(queues),
            filter,
            playback,
            control,
            session_start,
            probe,
            cancel,
            pipeline: Some(pipeline),
            span,
        })
    }

    /// Follow a live feed; always paced in real time.
    pub async fn live<S: Source>(transport: S, event: &RaceEvent, config: SessionConfig) -> Result<Self> {
        Self::start(SourceKind::Live, transport, event.metadata(), config.with_flow(FlowMode::Realtime)).await
    }

    /// Replay a recorded session delivered by `transport`.
    pub async fn replay<S: Source>(transport: S, event: &RaceEvent, config: SessionConfig) -> Result<Self> {
        Self::start(SourceKind::Replay, transport, event.metadata(), config).await
    }

    /// Follow a live feed while capturing it to `archive` for debug replays.
    pub async fn archived_live<S: Source, P: AsRef<Path>>(
        transport: S,
        event: &RaceEvent,
        archive: P,
        config: SessionConfig,
    ) -> Result<Self> {
        let source = ArchivingSource::new(transport, archive);
        Self::start(SourceKind::ArchivedLive, source, event.metadata(), config.with_flow(FlowMode::Realtime)).await
    }

    /// Replay a local capture written by [`TimingSession::archived_live`].
    pub async fn debug_replay<P: AsRef<Path>>(path: P, config: SessionConfig) -> Result<Self> {
        let path = path.as_ref();
        let name = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default();
        let metadata = SessionMetadata { name, ..SessionMetadata::default() };
        Self::start(SourceKind::DebugReplay, ArchiveSource::new(path), metadata, config).await
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// Authoritative session start from the feed, else the scheduled start.
    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        (*self.session_start.borrow()).or(self.metadata.session_start)
    }

    /// Session start as reported by the feed, once known.
    pub fn session_start_updates(&self) -> BoxStream<'static, DateTime<Utc>> {
        WatchStream::new(self.session_start.clone()).filter_map(|start| async move { start }).boxed()
    }

    /// The consumer side of the output queues. Available once.
    pub fn take_queues(&mut self) -> Option<MessageQueues> {
        self.queues.take()
    }

    /// Limit telemetry decoding to these car numbers. Locations are unaffected.
    pub fn select_telemetry_sources(&self, drivers: &[u32]) {
        debug!(parent: &self.span, ?drivers, "Selecting telemetry sources");
        self.filter.select(drivers);
    }

    /// Decode telemetry for every car again.
    pub fn clear_telemetry_filter(&self) {
        self.filter.clear();
    }

    pub fn pause(&self) {
        self.playback.pause();
    }

    pub fn resume(&self) {
        self.playback.resume();
    }

    /// Returns whether playback is now paused.
    pub fn toggle_pause(&self) -> bool {
        self.playback.toggle_pause()
    }

    pub fn is_paused(&self) -> bool {
        self.playback.is_paused()
    }

    /// Skip `delta` of session time in the source (if it can seek) and the scheduler.
    pub fn increment_time(&self, delta: Duration) {
        if let Some(control) = &self.control {
            control.increment_time(delta);
        }
        self.playback.increment_time(delta);
    }

    /// Release everything up to the session start.
    ///
    /// Returns the target, or `None` while the start is still unknown.
    pub fn skip_to_session_start(&self) -> Option<DateTime<Utc>> {
        let target = self
            .control
            .as_ref()
            .and_then(|control| control.jump_to_start())
            .or_else(|| *self.session_start.borrow());

        match target {
            Some(start) => {
                info!(parent: &self.span, %start, "Skipping to session start");
                self.playback.jump_to(start);
                Some(start)
            }
            None => {
                debug!(parent: &self.span, "Session start not known yet; skip ignored");
                None
            }
        }
    }

    /// Skip to the next lap. Only meaningful for races and sprints.
    pub fn increment_lap(&self) {
        match self.metadata.session_type {
            Some(session_type) if !session_type.is_race() => {
                debug!(parent: &self.span, %session_type, "Lap skip ignored outside a race");
            }
            _ => self.playback.increment_lap(),
        }
    }

    /// Current session time of the scheduler.
    pub fn virtual_time(&self) -> Option<DateTime<Utc>> {
        self.playback.virtual_time()
    }

    /// Messages waiting in each output queue.
    pub fn queue_depths(&self) -> QueueDepths {
        self.probe.depths()
    }

    /// Whether every task has exited, e.g. after the feed ended.
    pub fn is_finished(&self) -> bool {
        self.pipeline.as_ref().is_none_or(Pipeline::is_finished)
    }

    /// Cancel every task and wait for them to exit.
    ///
    /// The output queues close once this returns. Later calls return `None`.
    pub async fn close(&mut self) -> Option<PipelineReport> {
        let pipeline = self.pipeline.take()?;
        self.cancel.cancel();
        let report = pipeline.join().await;
        info!(
            parent: &self.span,
            fragments = report.fragments_read,
            released = report.scheduler.released,
            "Timing session closed"
        );
        Some(report)
    }
}

impl Drop for TimingSession {
    fn drop(&mut self) {
        debug!(parent: &self.span, "Dropping timing session");
        self.cancel.cancel();
    }
}
