//! Virtual session clock

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Maps session time onto the tokio clock.
///
/// The clock is anchored at a session instant and a wall instant; session
/// time advances at `speed` times wall time unless frozen. It stays unset
/// until the first message (or an explicit jump) gives it an anchor.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    origin: Option<(DateTime<Utc>, Instant)>,
    speed: f64,
    frozen: bool,
}

impl VirtualClock {
    pub fn new(speed: f64) -> Self {
        Self { origin: None, speed, frozen: false }
    }

    pub fn is_started(&self) -> bool {
        self.origin.is_some()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Current session time, `None` before the clock is anchored.
    pub fn now(&self) -> Option<DateTime<Utc>> {
        let (session, wall) = self.origin?;
        if self.frozen {
            return Some(session);
        }
        let elapsed = Instant::now().saturating_duration_since(wall).mul_f64(self.speed);
        Some(session + TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::zero()))
    }

    /// Anchor at `at` unless already running.
    pub fn start_at(&mut self, at: DateTime<Utc>) {
        if self.origin.is_none() {
            self.origin = Some((at, Instant::now()));
        }
    }

    /// Move session time to `at`, keeping the frozen state.
    pub fn set(&mut self, at: DateTime<Utc>) {
        self.origin = Some((at, Instant::now()));
    }

    pub fn advance(&mut self, delta: Duration) {
        if let Some(now) = self.now() {
            self.set(now + TimeDelta::from_std(delta).unwrap_or(TimeDelta::zero()));
        }
    }

    /// Resynchronise from an authoritative clock; never moves backwards.
    pub fn sync_forward(&mut self, at: DateTime<Utc>) {
        if self.now().is_some_and(|now| at > now) {
            self.set(at);
        }
    }

    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        if let Some(now) = self.now() {
            self.origin = Some((now, Instant::now()));
        }
        self.frozen = true;
    }

    pub fn thaw(&mut self) {
        if !self.frozen {
            return;
        }
        self.frozen = false;
        if let Some((session, _)) = self.origin {
            self.origin = Some((session, Instant::now()));
        }
    }

    /// Wall instant at which session time reaches `at`.
    ///
    /// `None` while frozen or unanchored.
    pub fn instant_for(&self, at: DateTime<Utc>) -> Option<Instant> {
        if self.frozen {
            return None;
        }
        let (session, wall) = self.origin?;
        let ahead = (at - session).to_std().unwrap_or(Duration::ZERO);
        Some(wall + ahead.div_f64(self.speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::at;

    #[tokio::test(start_paused = true)]
    async fn runs_at_configured_speed() {
        let mut clock = VirtualClock::new(2.0);
        assert_eq!(clock.now(), None);

        clock.start_at(at(0));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(clock.now(), Some(at(1_000)));

        let release = clock.instant_for(at(3_000)).unwrap();
        assert_eq!(release - Instant::now(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn freeze_holds_session_time() {
        let mut clock = VirtualClock::new(1.0);
        clock.start_at(at(0));
        tokio::time::advance(Duration::from_secs(2)).await;

        clock.freeze();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(clock.now(), Some(at(2_000)));
        assert_eq!(clock.instant_for(at(3_000)), None);

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), Some(at(7_000)));

        clock.thaw();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(clock.now(), Some(at(8_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn sync_only_moves_forward() {
        let mut clock = VirtualClock::new(1.0);
        clock.start_at(at(10_000));

        clock.sync_forward(at(9_000));
        assert_eq!(clock.now(), Some(at(10_000)));

        clock.sync_forward(at(12_000));
        assert_eq!(clock.now(), Some(at(12_000)));
    }
}
