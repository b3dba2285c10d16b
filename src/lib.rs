//! Type-safe Rust library for motorsport live-timing feeds.
//!
//! Paddock ingests the named, delta-encoded fragments of a live-timing feed
//! (live, archived replay, or a local capture), folds them into session state,
//! paces the resulting typed messages against a virtual session clock, and
//! fans them out to one bounded queue per message category.
//!
//! # Features
//!
//! - **Stateful delta parsing**: timing lines, roster, session, clock,
//!   race control, weather, team radio, car telemetry and positions
//! - **Replay pacing**: real-time or straight-through release with pause,
//!   time skips, jump to session start and lap skips
//! - **Backpressure, not loss**: full queues block the pipeline instead of
//!   dropping data; depths are observable
//! - **Graceful shutdown**: one cancellation token for every task
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use paddock::types::DataSource;
//! use paddock::{SessionConfig, TimingSession};
//!
//! #[tokio::main]
//! async fn main() -> paddock::Result<()> {
//!     paddock::logging::init("paddock=info");
//!
//!     let config = SessionConfig::default()
//!         .with_data_sources(DataSource::TIMING | DataSource::EVENT)
//!         .with_speed(4.0);
//!     let mut session = TimingSession::debug_replay("bahrain-2023-race.txt", config).await?;
//!     let mut queues = session.take_queues().expect("queues are taken once");
//!
//!     session.skip_to_session_start();
//!     while let Some(event) = queues.event.recv().await {
//!         println!("Lap {}/{}", event.current_lap, event.total_laps);
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Throttling high-rate queues
//!
//! Telemetry and location queues carry a sample per car several times a
//! second. A display that redraws less often can keep only the latest sample
//! per car with [`ThrottleExt::throttle_by`]:
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use paddock::{SessionConfig, ThrottleExt, TimingSession};
//! use std::time::Duration;
//! use tokio_stream::wrappers::ReceiverStream;
//!
//! # async fn run() -> paddock::Result<()> {
//! let mut session = TimingSession::debug_replay("bahrain-2023-race.txt", SessionConfig::default()).await?;
//! let queues = session.take_queues().expect("queues are taken once");
//!
//! let mut cars = ReceiverStream::new(queues.location).throttle_by(Duration::from_millis(250), |l| l.driver_number);
//! while let Some(location) = cars.next().await {
//!     println!("#{} at ({:.0}, {:.0})", location.driver_number, location.x, location.y);
//! }
//! # Ok(())
//! # }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod event;
pub mod logging;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Ingestion pipeline
pub mod parser;
pub mod pipeline;
pub mod queues;
pub mod scheduler;
pub mod source;
pub mod sources;
pub mod stream;

// Orchestration
pub mod session;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use config::SessionConfig;
pub use event::RaceEvent;
pub use parser::{Parsed, Parser, TelemetryFilter};
pub use queues::{MessageQueues, QueueCapacities, QueueDepths};
pub use scheduler::PlaybackHandle;
pub use session::{SessionMetadata, SourceKind, TimingSession};
pub use source::{Source, SourceControl};
pub use sources::{ArchiveSource, ArchivingSource, ChannelSource};
pub use stream::ThrottleExt;
