//! Consumer-facing playback controls shared with the scheduler task

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::debug;

use super::VirtualClock;

/// Skip requests queued for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Command {
    Advance(Duration),
    JumpTo(DateTime<Utc>),
    NextLap,
}

#[derive(Debug)]
pub(crate) struct ControlState {
    pub paused: bool,
    pub clock: VirtualClock,
    pub commands: VecDeque<Command>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ControlState>,
    wake: Notify,
}

/// Handle for pausing and skipping a running scheduler.
///
/// Cloneable; every clone controls the same scheduler. Pause takes effect
/// before the next release. Skips are applied by the scheduler task in the
/// order they were requested.
#[derive(Debug, Clone)]
pub struct PlaybackHandle {
    shared: Arc<Shared>,
}

impl PlaybackHandle {
    pub(crate) fn new(speed: f64, paused: bool) -> Self {
        let mut clock = VirtualClock::new(speed);
        if paused {
            clock.freeze();
        }
        let state = ControlState { paused, clock, commands: VecDeque::new() };
        Self { shared: Arc::new(Shared { state: Mutex::new(state), wake: Notify::new() }) }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notified(&self) -> Notified<'_> {
        self.shared.wake.notified()
    }

    fn update(&self, change: impl FnOnce(&mut ControlState)) {
        change(&mut self.lock());
        self.shared.wake.notify_one();
    }

    pub fn pause(&self) {
        self.update(|state| {
            if !state.paused {
                debug!("Playback paused");
                state.paused = true;
                state.clock.freeze();
            }
        });
    }

    pub fn resume(&self) {
        self.update(|state| {
            if state.paused {
                debug!("Playback resumed");
                state.paused = false;
                state.clock.thaw();
            }
        });
    }

    /// Flip the pause state; returns whether playback is now paused.
    pub fn toggle_pause(&self) -> bool {
        let mut paused = false;
        self.update(|state| {
            state.paused = !state.paused;
            if state.paused {
                state.clock.freeze();
            } else {
                state.clock.thaw();
            }
            paused = state.paused;
        });
        debug!(paused, "Playback toggled");
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Fast-forward session time by `delta`, releasing everything it passes.
    pub fn increment_time(&self, delta: Duration) {
        self.update(|state| state.commands.push_back(Command::Advance(delta)));
    }

    /// Jump session time forward to `at`, releasing everything before it.
    pub fn jump_to(&self, at: DateTime<Utc>) {
        self.update(|state| state.commands.push_back(Command::JumpTo(at)));
    }

    /// Skip to the next lap transition. Ignored outside races and sprints.
    pub fn increment_lap(&self) {
        self.update(|state| state.commands.push_back(Command::NextLap));
    }

    /// Current session time of the scheduler, `None` before the first release.
    pub fn virtual_time(&self) -> Option<DateTime<Utc>> {
        self.lock().clock.now()
    }

    pub fn speed(&self) -> f64 {
        self.lock().clock.speed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_state_round_trips() {
        let handle = PlaybackHandle::new(1.0, false);
        assert!(!handle.is_paused());
        assert!(handle.toggle_pause());
        assert!(handle.is_paused());
        assert!(handle.lock().clock.is_frozen());

        handle.resume();
        assert!(!handle.is_paused());
        assert!(!handle.toggle_pause());
    }

    #[test]
    fn commands_queue_in_request_order() {
        let handle = PlaybackHandle::new(1.0, true);
        handle.increment_time(Duration::from_secs(30));
        handle.increment_lap();

        let state = handle.lock();
        assert_eq!(
            state.commands.iter().copied().collect::<Vec<_>>(),
            vec![Command::Advance(Duration::from_secs(30)), Command::NextLap]
        );
    }
}
