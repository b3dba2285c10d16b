//! Replay pacing scheduler.
//!
//! Sits between the parser and the output queues. In [`FlowMode::Realtime`]
//! each message is held until the virtual clock reaches its timestamp, so
//! releases reproduce the original spacing (scaled by speed). In
//! [`FlowMode::StraightThrough`] messages are forwarded as fast as the
//! queues accept them.
//!
//! ## States
//!
//! - **Streaming**: releasing due messages in arrival order
//! - **Paused**: nothing is released; input keeps buffering until the
//!   pending buffer is full, then the parser is back-pressured
//! - **Skipping**: a lap skip releases everything up to the next lap
//!   transition without waiting
//!
//! Time skips (`increment_time`, jump to start) release a catch-up burst of
//! every message at or before the new virtual time, paused or not. Skips
//! interrupt pacing waits but never a blocked queue send: a full queue holds
//! the scheduler until its consumer drains it or the session is cancelled.

mod clock;
mod control;

pub use clock::VirtualClock;
pub use control::PlaybackHandle;

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use control::Command;

use crate::TimingError;
use crate::queues::OutputQueues;
use crate::types::{DataSource, FlowMode, Message};

/// Scheduler tuning, usually derived from the session configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub flow: FlowMode,
    /// Maximum messages held back while paused or waiting
    pub buffer_capacity: usize,
    /// How long a blocked queue send may last before it is logged
    pub stall_warning: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { flow: FlowMode::Realtime, buffer_capacity: 10_000, stall_warning: Duration::from_secs(5) }
    }
}

/// Totals reported when the scheduler exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub released: u64,
    /// Messages discarded because their queue's consumer went away
    pub discarded: u64,
    pub cancelled: bool,
}

enum Stop {
    Cancelled,
}

/// The pacing task. Construct with [`Scheduler::new`] and drive with [`Scheduler::run`].
pub struct Scheduler {
    config: SchedulerConfig,
    input: mpsc::Receiver<Message>,
    input_closed: bool,
    output: OutputQueues,
    handle: PlaybackHandle,
    cancel: CancellationToken,

    pending: VecDeque<Message>,
    /// Release everything at or before this instant, even while paused
    catch_up: Option<DateTime<Utc>>,
    /// Lap a lap skip is heading for
    skip_to_lap: Option<u32>,
    released_lap: u32,
    race: bool,
    closed: DataSource,
    report: SchedulerReport,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        input: mpsc::Receiver<Message>,
        output: OutputQueues,
        handle: PlaybackHandle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            input,
            input_closed: false,
            output,
            handle,
            cancel,
            pending: VecDeque::new(),
            catch_up: None,
            skip_to_lap: None,
            released_lap: 0,
            race: false,
            closed: DataSource::empty(),
            report: SchedulerReport::default(),
        }
    }

    /// Run until the input is exhausted and drained, or until cancelled.
    ///
    /// The output queues close when this returns.
    pub async fn run(mut self) -> SchedulerReport {
        info!(flow = ?self.config.flow, "Scheduler started");

        loop {
            self.apply_commands();

            if let Err(Stop::Cancelled) = self.release_due().await {
                self.report.cancelled = true;
                break;
            }

            if self.input_closed && self.pending.is_empty() {
                break;
            }

            let deadline = self.next_deadline();
            let can_pull = !self.input_closed && self.pending.len() < self.config.buffer_capacity;
            let wake = self.handle.notified();

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.report.cancelled = true;
                    break;
                }
                _ = wake => {}
                received = self.input.recv(), if can_pull => match received {
                    Some(message) => {
                        self.ingest(message);
                        self.pull_ready();
                    }
                    None => self.input_closed = true,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {}
            }
        }

        info!(
            released = self.report.released,
            discarded = self.report.discarded,
            cancelled = self.report.cancelled,
            "Scheduler finished"
        );
        self.report
    }

    /// Take whatever the parser already queued, up to the buffer limit.
    fn pull_ready(&mut self) {
        while self.pending.len() < self.config.buffer_capacity {
            match self.input.try_recv() {
                Ok(message) => self.ingest(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.input_closed = true;
                    break;
                }
            }
        }
    }

    fn ingest(&mut self, message: Message) {
        if let Message::Event(event) = &message {
            if let Some(event_type) = event.event_type {
                self.race = event_type.is_race();
            }
        }
        self.pending.push_back(message);
    }

    fn apply_commands(&mut self) {
        let mut state = self.handle.lock();
        while let Some(command) = state.commands.pop_front() {
            match command {
                Command::Advance(delta) => {
                    if !state.clock.is_started() {
                        match self.pending.front() {
                            Some(head) => state.clock.set(head.timestamp()),
                            None => {
                                debug!(?delta, "Ignoring time skip before any data");
                                continue;
                            }
                        }
                    }
                    state.clock.advance(delta);
                    self.catch_up = state.clock.now();
                    debug!(?delta, to = ?self.catch_up, "Skipping forward");
                }
                Command::JumpTo(target) => {
                    if state.clock.now().is_some_and(|now| target <= now) {
                        debug!(%target, "Ignoring jump to a time already passed");
                        continue;
                    }
                    state.clock.set(target);
                    self.catch_up = Some(target);
                    debug!(%target, "Jumping forward");
                }
                Command::NextLap => {
                    if !self.race {
                        debug!("Ignoring lap skip outside a race session");
                        continue;
                    }
                    let target = self.released_lap + 1;
                    debug!(lap = target, "Skipping to next lap");
                    self.skip_to_lap = Some(target);
                }
            }
        }
    }

    /// Release the head of the buffer while it is due.
    async fn release_due(&mut self) -> Result<(), Stop> {
        self.release_caught_up().await?;

        while let Some(timestamp) = self.pending.front().map(Message::timestamp) {
            if !self.is_due(timestamp) {
                break;
            }
            let Some(message) = self.pending.pop_front() else {
                break;
            };
            self.observe(&message);
            self.deliver(message).await?;
        }
        Ok(())
    }

    /// Release every buffered message at or before the catch-up target.
    ///
    /// Categories are not ordered against each other, so the whole buffer is
    /// scanned; released messages keep their arrival order and later ones
    /// stay where they are.
    async fn release_caught_up(&mut self) -> Result<(), Stop> {
        let Some(target) = self.catch_up else {
            return Ok(());
        };

        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].timestamp() > target {
                index += 1;
                continue;
            }
            let Some(message) = self.pending.remove(index) else {
                break;
            };
            self.observe(&message);
            self.deliver(message).await?;
        }

        // Held while paused so late arrivals at or before the target still go out
        let state = self.handle.lock();
        let passed = !self.config.flow.is_paced() || state.clock.now().is_some_and(|now| now > target);
        if !state.paused && passed {
            trace!(%target, "Catch-up complete");
            self.catch_up = None;
        }
        Ok(())
    }

    fn is_due(&mut self, timestamp: DateTime<Utc>) -> bool {
        if self.skip_to_lap.is_some() {
            return true;
        }

        let mut state = self.handle.lock();
        if state.paused {
            return false;
        }
        if !self.config.flow.is_paced() {
            return true;
        }
        if !state.clock.is_started() {
            state.clock.start_at(timestamp);
            return true;
        }
        state.clock.instant_for(timestamp).is_some_and(|at| at <= tokio::time::Instant::now())
    }

    fn next_deadline(&self) -> Option<tokio::time::Instant> {
        if !self.config.flow.is_paced() {
            return None;
        }
        let head = self.pending.front()?;
        self.handle.lock().clock.instant_for(head.timestamp())
    }

    /// Bookkeeping for a message about to be released.
    fn observe(&mut self, message: &Message) {
        let Message::Event(event) = message else {
            return;
        };

        if let Some(target) = self.skip_to_lap {
            if event.current_lap >= target {
                debug!(lap = event.current_lap, at = %event.timestamp, "Reached lap");
                self.skip_to_lap = None;
                self.handle.lock().clock.set(event.timestamp);
            }
        } else if self.catch_up.is_none() && self.config.flow.is_paced() {
            if let Some(now) = message.clock_sync() {
                let mut state = self.handle.lock();
                if !state.paused {
                    state.clock.sync_forward(now);
                }
            }
        }

        self.released_lap = event.current_lap;
    }

    /// Send one message, waiting out backpressure unless cancelled.
    async fn deliver(&mut self, message: Message) -> Result<(), Stop> {
        let kind = message.kind();
        if self.closed.contains(kind.source()) {
            self.report.discarded += 1;
            return Ok(());
        }

        let stall_warning = self.config.stall_warning;
        let send = self.output.send(message);
        tokio::pin!(send);
        let stall = tokio::time::sleep(stall_warning);
        tokio::pin!(stall);
        let mut warned = false;

        let result = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Stop::Cancelled),
                result = &mut send => break result,
                _ = &mut stall, if !warned => {
                    warned = true;
                    warn!(queue = %kind, waited = ?stall_warning, "Output queue full; pipeline stalled until it is drained");
                }
            }
        };

        match result {
            Ok(()) => {
                if warned {
                    info!(queue = %kind, "Output queue drained; pipeline resumed");
                }
                self.report.released += 1;
            }
            Err(TimingError::QueueClosed { queue }) => {
                debug!(queue, "Consumer dropped queue; discarding its messages");
                self.closed |= kind.source();
                self.report.discarded += 1;
            }
            Err(error) => warn!(%error, "Unexpected queue error"),
        }
        Ok(())
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests;
