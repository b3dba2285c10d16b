//! Session configuration.
//!
//! Every field has a default, so a YAML file only needs the keys it changes:
//!
//! ```rust
//! use paddock::SessionConfig;
//! use paddock::types::{DataSource, FlowMode};
//!
//! let config = SessionConfig::from_yaml_str(
//!     "data_sources: TIMING | EVENT | WEATHER\nflow: straight_through\nspeed: 4.0\n",
//! )
//! .unwrap();
//!
//! assert_eq!(config.data_sources, DataSource::TIMING | DataSource::EVENT | DataSource::WEATHER);
//! assert_eq!(config.flow, FlowMode::StraightThrough);
//! assert_eq!(config.queues.timing, 10_000);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::pipeline::PipelineConfig;
use crate::queues::QueueCapacities;
use crate::scheduler::SchedulerConfig;
use crate::types::{DataSource, FlowMode};
use crate::{Result, TimingError};

/// Slowest and fastest supported replay speed.
pub const SPEED_RANGE: (f64, f64) = (0.1, 10.0);

/// Tuning for one timing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Output categories to decode
    pub data_sources: DataSource,
    pub flow: FlowMode,
    /// Replay speed multiplier, clamped to [`SPEED_RANGE`]
    pub speed: f64,
    pub start_paused: bool,
    /// Messages the scheduler may hold back while paused
    pub buffer_capacity: usize,
    /// Source to parser channel
    pub fragment_capacity: usize,
    /// Parser to scheduler channel
    pub message_capacity: usize,
    pub queues: QueueCapacities,
    /// Blocked queue sends longer than this are logged
    #[serde(rename = "stall_warning_ms", with = "millis")]
    pub stall_warning: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_sources: DataSource::all(),
            flow: FlowMode::Realtime,
            speed: 1.0,
            start_paused: false,
            buffer_capacity: 10_000,
            fragment_capacity: 100,
            message_capacity: 1_000,
            queues: QueueCapacities::default(),
            stall_warning: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    /// Parse YAML, clamp the speed and validate capacities.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: SessionConfig = serde_yaml_ng::from_str(yaml)?;
        config.normalized()
    }

    /// Load from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| TimingError::file_error(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn with_flow(mut self, flow: FlowMode) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_data_sources(mut self, data_sources: DataSource) -> Self {
        self.data_sources = data_sources;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = clamp_speed(speed);
        self
    }

    pub fn paused(mut self) -> Self {
        self.start_paused = true;
        self
    }

    /// Clamp the speed into range and reject capacities tokio cannot honour.
    pub fn normalized(mut self) -> Result<Self> {
        self.speed = clamp_speed(self.speed);
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        self.queues.validate()?;
        for (name, capacity) in [
            ("buffer_capacity", self.buffer_capacity),
            ("fragment_capacity", self.fragment_capacity),
            ("message_capacity", self.message_capacity),
        ] {
            if capacity == 0 {
                return Err(TimingError::config_error(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    pub(crate) fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fragment_capacity: self.fragment_capacity,
            message_capacity: self.message_capacity,
            scheduler: SchedulerConfig {
                flow: self.flow,
                buffer_capacity: self.buffer_capacity,
                stall_warning: self.stall_warning,
            },
        }
    }
}

fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() { 1.0 } else { speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1) }
}

/// `Duration` as whole milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = SessionConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.queues.event_time, 10);
    }

    #[test]
    fn speed_is_clamped() {
        let config = SessionConfig::from_yaml_str("speed: 50").unwrap();
        assert_eq!(config.speed, 10.0);
        assert_eq!(SessionConfig::default().with_speed(0.01).speed, 0.1);
        assert_eq!(SessionConfig::default().with_speed(f64::NAN).speed, 1.0);
    }

    #[test]
    fn partial_queue_overrides_keep_other_defaults() {
        let yaml = "queues:\n  weather: 5\nstall_warning_ms: 250\nstart_paused: true\n";
        let config = SessionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.queues.weather, 5);
        assert_eq!(config.queues.telemetry, 1_000);
        assert_eq!(config.stall_warning, Duration::from_millis(250));
        assert!(config.start_paused);
    }

    #[test]
    fn zero_capacities_are_rejected() {
        let error = SessionConfig::from_yaml_str("message_capacity: 0").unwrap_err();
        assert!(matches!(error, TimingError::Config { .. }));
        assert!(SessionConfig::from_yaml_str("queues:\n  timing: 0\n").is_err());
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let error = SessionConfig::from_yaml_str("flow: sideways").unwrap_err();
        assert!(matches!(error, TimingError::Config { .. }));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.yaml");
        std::fs::write(&path, "flow: straight_through\n").unwrap();
        assert_eq!(SessionConfig::load(&path).unwrap().flow, FlowMode::StraightThrough);

        let missing = SessionConfig::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(missing, TimingError::File { .. }));
    }
}
