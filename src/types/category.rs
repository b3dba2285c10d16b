//! Feed categories and the consumer-facing data source selection

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named slice of the live-timing feed.
///
/// Each raw fragment belongs to exactly one category. Names the library does
/// not know map to [`Category::Unknown`] and are ignored by the parser so that
/// feed additions never break ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Heartbeat,
    ExtrapolatedClock,
    DriverList,
    TimingData,
    TimingAppData,
    LapCount,
    SessionInfo,
    SessionStatus,
    TrackStatus,
    RaceControlMessages,
    WeatherData,
    TeamRadio,
    /// `CarData.z` (compressed) or `CarData`
    CarData,
    /// `Position.z` (compressed) or `Position`
    Position,
    Unknown,
}

impl Category {
    /// Every category the parser understands.
    pub const KNOWN: [Category; 14] = [
        Category::Heartbeat,
        Category::ExtrapolatedClock,
        Category::DriverList,
        Category::TimingData,
        Category::TimingAppData,
        Category::LapCount,
        Category::SessionInfo,
        Category::SessionStatus,
        Category::TrackStatus,
        Category::RaceControlMessages,
        Category::WeatherData,
        Category::TeamRadio,
        Category::CarData,
        Category::Position,
    ];

    /// Map a feed category name to a [`Category`].
    pub fn from_wire(name: &str) -> Self {
        match name {
            "Heartbeat" => Category::Heartbeat,
            "ExtrapolatedClock" => Category::ExtrapolatedClock,
            "DriverList" => Category::DriverList,
            "TimingData" => Category::TimingData,
            "TimingAppData" => Category::TimingAppData,
            "LapCount" => Category::LapCount,
            "SessionInfo" => Category::SessionInfo,
            "SessionStatus" => Category::SessionStatus,
            "TrackStatus" => Category::TrackStatus,
            "RaceControlMessages" => Category::RaceControlMessages,
            "WeatherData" => Category::WeatherData,
            "TeamRadio" => Category::TeamRadio,
            "CarData.z" | "CarData" => Category::CarData,
            "Position.z" | "Position" => Category::Position,
            _ => Category::Unknown,
        }
    }

    /// Canonical feed name, as written to archives.
    pub fn wire_name(self) -> &'static str {
        match self {
            Category::Heartbeat => "Heartbeat",
            Category::ExtrapolatedClock => "ExtrapolatedClock",
            Category::DriverList => "DriverList",
            Category::TimingData => "TimingData",
            Category::TimingAppData => "TimingAppData",
            Category::LapCount => "LapCount",
            Category::SessionInfo => "SessionInfo",
            Category::SessionStatus => "SessionStatus",
            Category::TrackStatus => "TrackStatus",
            Category::RaceControlMessages => "RaceControlMessages",
            Category::WeatherData => "WeatherData",
            Category::TeamRadio => "TeamRadio",
            Category::CarData => "CarData.z",
            Category::Position => "Position.z",
            Category::Unknown => "Unknown",
        }
    }

    /// Output data sources this category can produce.
    pub fn outputs(self) -> DataSource {
        match self {
            Category::Heartbeat | Category::ExtrapolatedClock => {
                DataSource::EVENT | DataSource::EVENT_TIME
            }
            Category::DriverList => DataSource::DRIVERS,
            Category::TimingData => DataSource::TIMING | DataSource::EVENT,
            Category::TimingAppData => DataSource::TIMING,
            Category::LapCount | Category::SessionStatus | Category::TrackStatus => {
                DataSource::EVENT
            }
            Category::SessionInfo => DataSource::EVENT | DataSource::TIMING,
            Category::RaceControlMessages => DataSource::RACE_CONTROL | DataSource::EVENT,
            Category::WeatherData => DataSource::WEATHER,
            Category::TeamRadio => DataSource::TEAM_RADIO,
            Category::CarData => DataSource::TELEMETRY,
            Category::Position => DataSource::LOCATION,
            Category::Unknown => DataSource::empty(),
        }
    }

    /// Categories that maintain state other categories depend on.
    ///
    /// These are decoded even when none of their outputs were requested: the
    /// roster backs every timing line and session info drives the partial
    /// reset on session-type changes.
    pub fn is_structural(self) -> bool {
        matches!(self, Category::DriverList | Category::SessionInfo | Category::LapCount)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

bitflags! {
    /// Selection of output message categories a session should decode.
    ///
    /// Callers request e.g. `TIMING | EVENT | WEATHER` so unused categories
    /// are skipped before their payload is decoded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DataSource: u16 {
        const EVENT_TIME = 1 << 0;
        const TIMING = 1 << 1;
        const EVENT = 1 << 2;
        const RACE_CONTROL = 1 << 3;
        const TEAM_RADIO = 1 << 4;
        const WEATHER = 1 << 5;
        const LOCATION = 1 << 6;
        const TELEMETRY = 1 << 7;
        const DRIVERS = 1 << 8;
    }
}

impl Default for DataSource {
    fn default() -> Self {
        DataSource::all()
    }
}

impl DataSource {
    /// Whether a fragment of `category` needs decoding for this selection.
    pub fn wants(self, category: Category) -> bool {
        category != Category::Unknown
            && (category.is_structural() || self.intersects(category.outputs()))
    }
}
