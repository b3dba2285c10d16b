//! Session-level state: event snapshot and its enumerations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Fixed number of mini-sector slots tracked per lap.
pub const MAX_SEGMENTS: usize = 40;

/// Weekend session a connection was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    Practice1,
    Practice2,
    Practice3,
    Qualifying,
    Sprint,
    Race,
    PreSeason,
}

impl SessionType {
    /// Whether lap-based controls make sense for this session.
    pub fn is_race(self) -> bool {
        matches!(self, SessionType::Race | SessionType::Sprint)
    }

    /// Path segment used by the static archive.
    pub fn archive_name(self) -> &'static str {
        match self {
            SessionType::Practice1 => "Practice_1",
            SessionType::Practice2 => "Practice_2",
            SessionType::Practice3 => "Practice_3",
            SessionType::Qualifying => "Qualifying",
            SessionType::Sprint => "Sprint",
            SessionType::Race => "Race",
            SessionType::PreSeason => "Test",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionType::Practice1 => "Practice 1",
            SessionType::Practice2 => "Practice 2",
            SessionType::Practice3 => "Practice 3",
            SessionType::Qualifying => "Qualifying",
            SessionType::Sprint => "Sprint",
            SessionType::Race => "Race",
            SessionType::PreSeason => "Pre-Season Test",
        })
    }
}

/// Session type as reported by the feed, including qualifying stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Practice1,
    Practice2,
    Practice3,
    Qualifying0,
    Qualifying1,
    Qualifying2,
    Qualifying3,
    Sprint,
    Race,
    PreSeason,
}

impl EventType {
    pub fn is_race(self) -> bool {
        matches!(self, EventType::Race | EventType::Sprint)
    }

    pub fn is_qualifying(self) -> bool {
        matches!(
            self,
            EventType::Qualifying0
                | EventType::Qualifying1
                | EventType::Qualifying2
                | EventType::Qualifying3
        )
    }

    /// Qualifying stage for a `SessionPart` number.
    pub fn qualifying_stage(part: u64) -> Option<Self> {
        match part {
            0 => Some(EventType::Qualifying0),
            1 => Some(EventType::Qualifying1),
            2 => Some(EventType::Qualifying2),
            3 => Some(EventType::Qualifying3),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventType::Practice1 => "Practice 1",
            EventType::Practice2 => "Practice 2",
            EventType::Practice3 => "Practice 3",
            EventType::Qualifying0 => "Qualifying 0",
            EventType::Qualifying1 => "Qualifying 1",
            EventType::Qualifying2 => "Qualifying 2",
            EventType::Qualifying3 => "Qualifying 3",
            EventType::Sprint => "Sprint",
            EventType::Race => "Race",
            EventType::PreSeason => "Pre-season",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Unknown,
    Inactive,
    Started,
    Aborted,
    Finished,
    Finalised,
    Ended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagState {
    #[default]
    None,
    Green,
    Yellow,
    DoubleYellow,
    Red,
    Chequered,
    Blue,
    BlackAndWhite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackState {
    #[default]
    Clear,
    VirtualSafetyCar,
    VirtualSafetyCarEnding,
    SafetyCar,
    SafetyCarEnding,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrsState {
    #[default]
    Unknown,
    Enabled,
    Disabled,
}

/// Meeting (weekend) details carried by session info.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingInfo {
    pub name: String,
    pub official_name: String,
    pub location: String,
    pub country: String,
    pub circuit: String,
    /// Circuit offset from UTC in seconds
    pub gmt_offset_secs: Option<i32>,
}

/// Snapshot of session-wide state, emitted whenever any of it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,

    pub name: String,
    /// `None` until session info has been received
    pub event_type: Option<EventType>,
    pub meeting: MeetingInfo,

    pub status: SessionStatus,
    pub heartbeat: bool,
    /// Authoritative wall clock from the last heartbeat
    pub now: Option<DateTime<Utc>>,

    pub current_lap: u32,
    pub total_laps: u32,
    pub sector1_segments: usize,
    pub sector2_segments: usize,
    pub sector3_segments: usize,
    pub total_segments: usize,
    pub segment_flags: Vec<FlagState>,

    pub pit_exit_open: bool,
    pub track_status: FlagState,
    pub safety_car: TrackState,

    pub remaining_time: Duration,
    pub session_start_time: Option<DateTime<Utc>>,
    pub clock_stopped: bool,

    pub drs_enabled: DrsState,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            name: String::new(),
            event_type: None,
            meeting: MeetingInfo::default(),
            status: SessionStatus::Unknown,
            heartbeat: false,
            now: None,
            current_lap: 0,
            total_laps: 0,
            sector1_segments: 0,
            sector2_segments: 0,
            sector3_segments: 0,
            total_segments: 0,
            segment_flags: vec![FlagState::None; MAX_SEGMENTS],
            pit_exit_open: false,
            track_status: FlagState::None,
            safety_car: TrackState::Clear,
            remaining_time: Duration::ZERO,
            session_start_time: None,
            clock_stopped: true,
            drs_enabled: DrsState::Unknown,
        }
    }
}

impl Event {
    /// Segment-array offset of the first mini-sector of `sector` (0-based).
    pub fn segment_offset(&self, sector: usize) -> usize {
        match sector {
            0 => 0,
            1 => self.sector1_segments,
            _ => self.sector1_segments + self.sector2_segments,
        }
    }
}
