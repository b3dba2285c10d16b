//! Per-driver timing line

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Color, MAX_SEGMENTS};

/// Where a car currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarLocation {
    #[default]
    NoLocation,
    Pitlane,
    PitOut,
    OutLap,
    OnTrack,
    OutOfRace,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TireType {
    #[default]
    Unknown,
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
    Test,
    HyperSoft,
    UltraSoft,
    SuperSoft,
}

/// Mini-sector status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    #[default]
    None,
    Yellow,
    Green,
    /// Not displayed by the official feed (track limits / invalid time)
    Invalid,
    Purple,
    /// After the chequered flag or when stopped on track
    Red,
    Pitlane,
}

/// Time behind another car.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gap {
    #[default]
    None,
    Time(Duration),
    Laps(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitStop {
    pub lap: u32,
    pub pitlane_entry: DateTime<Utc>,
    pub pitlane_exit: Option<DateTime<Utc>>,
    pub pitlane_time: Duration,
}

/// One driver's timing line.
///
/// The parser keeps one of these per car and emits a copy every time a
/// fragment changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub timestamp: DateTime<Utc>,

    pub position: u32,

    pub name: String,
    pub short_name: String,
    pub number: u32,
    pub team: String,
    pub hex_color: String,
    pub color: Color,

    pub time_diff_to_fastest: Gap,
    pub time_diff_to_position_ahead: Gap,
    pub gap_to_leader: Gap,

    pub previous_segment_index: usize,
    pub segments: Vec<SegmentType>,
    pub sector1: Duration,
    pub sector1_personal_fastest: bool,
    pub sector1_overall_fastest: bool,
    pub sector2: Duration,
    pub sector2_personal_fastest: bool,
    pub sector2_overall_fastest: bool,
    pub sector3: Duration,
    pub sector3_personal_fastest: bool,
    pub sector3_overall_fastest: bool,
    pub last_lap: Duration,
    pub last_lap_personal_fastest: bool,
    pub last_lap_overall_fastest: bool,

    pub fastest_lap: Duration,
    pub overall_fastest_lap: bool,

    pub knocked_out_of_qualifying: bool,
    pub chequered_flag: bool,

    pub tire: TireType,
    pub laps_on_tire: u32,
    pub lap: u32,

    pub drs_open: bool,

    pub pitstops: u32,
    pub pit_stop_times: Vec<PitStop>,

    pub location: CarLocation,

    pub speed_trap: u32,
    pub speed_trap_personal_fastest: bool,
    pub speed_trap_overall_fastest: bool,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            position: 0,
            name: String::new(),
            short_name: String::new(),
            number: 0,
            team: String::new(),
            hex_color: String::new(),
            color: Color::WHITE,
            time_diff_to_fastest: Gap::None,
            time_diff_to_position_ahead: Gap::None,
            gap_to_leader: Gap::None,
            previous_segment_index: 0,
            segments: vec![SegmentType::None; MAX_SEGMENTS],
            sector1: Duration::ZERO,
            sector1_personal_fastest: false,
            sector1_overall_fastest: false,
            sector2: Duration::ZERO,
            sector2_personal_fastest: false,
            sector2_overall_fastest: false,
            sector3: Duration::ZERO,
            sector3_personal_fastest: false,
            sector3_overall_fastest: false,
            last_lap: Duration::ZERO,
            last_lap_personal_fastest: false,
            last_lap_overall_fastest: false,
            fastest_lap: Duration::ZERO,
            overall_fastest_lap: false,
            knocked_out_of_qualifying: false,
            chequered_flag: false,
            tire: TireType::Unknown,
            laps_on_tire: 0,
            lap: 0,
            drs_open: false,
            pitstops: 0,
            pit_stop_times: Vec::new(),
            location: CarLocation::NoLocation,
            speed_trap: 0,
            speed_trap_personal_fastest: false,
            speed_trap_overall_fastest: false,
        }
    }
}

impl Timing {
    /// Clear everything that belongs to one session stage.
    ///
    /// Identity (number, names, team, colour), position and tyre survive;
    /// times, fastest flags, segments and location do not.
    pub fn reset_session_results(&mut self) {
        self.chequered_flag = false;
        self.sector1 = Duration::ZERO;
        self.sector2 = Duration::ZERO;
        self.sector3 = Duration::ZERO;
        self.overall_fastest_lap = false;
        self.fastest_lap = Duration::ZERO;
        self.time_diff_to_position_ahead = Gap::None;
        self.time_diff_to_fastest = Gap::None;
        self.gap_to_leader = Gap::None;
        self.last_lap = Duration::ZERO;
        self.last_lap_personal_fastest = false;
        self.last_lap_overall_fastest = false;
        self.speed_trap = 0;
        self.speed_trap_overall_fastest = false;
        self.speed_trap_personal_fastest = false;
        self.sector1_overall_fastest = false;
        self.sector1_personal_fastest = false;
        self.sector2_overall_fastest = false;
        self.sector2_personal_fastest = false;
        self.sector3_overall_fastest = false;
        self.sector3_personal_fastest = false;
        self.segments.iter_mut().for_each(|segment| *segment = SegmentType::None);
        self.previous_segment_index = 0;
        self.location = CarLocation::NoLocation;
    }
}
