//! Typed messages produced by the parser

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{DataSource, Drivers, Event, FlagState, Timing};

/// Session clock update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTime {
    pub timestamp: DateTime<Utc>,
    /// Wall clock from the last heartbeat
    pub now: Option<DateTime<Utc>>,
    pub remaining: Duration,
    pub clock_stopped: bool,
}

/// Flag or incident announcement from race control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceControlMessage {
    pub timestamp: DateTime<Utc>,
    pub utc: DateTime<Utc>,
    pub lap: Option<u32>,
    pub category: String,
    pub message: String,
    pub flag: FlagState,
    pub scope: Option<String>,
    pub sector: Option<u32>,
    pub driver_number: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub timestamp: DateTime<Utc>,
    pub air_temp: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub rainfall: bool,
    pub track_temp: f64,
    pub wind_direction: f64,
    pub wind_speed: f64,
}

/// Team radio clip reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Radio {
    pub timestamp: DateTime<Utc>,
    pub utc: DateTime<Utc>,
    pub driver_number: u32,
    pub driver_name: String,
    /// Clip path relative to the session's static URL
    pub path: String,
}

/// One car-data channel sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub timestamp: DateTime<Utc>,
    pub driver_number: u32,
    pub rpm: u16,
    pub speed: f32,
    pub gear: u8,
    pub throttle: f32,
    pub brake: f32,
    pub drs: bool,
}

/// One car position sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub timestamp: DateTime<Utc>,
    pub driver_number: u32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Output category of a [`Message`]; one queue exists per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Drivers,
    Timing,
    Event,
    EventTime,
    RaceControl,
    Weather,
    Radio,
    Telemetry,
    Location,
}

impl MessageKind {
    pub const ALL: [MessageKind; 9] = [
        MessageKind::Drivers,
        MessageKind::Timing,
        MessageKind::Event,
        MessageKind::EventTime,
        MessageKind::RaceControl,
        MessageKind::Weather,
        MessageKind::Radio,
        MessageKind::Telemetry,
        MessageKind::Location,
    ];

    /// Data source flag that enables this kind.
    pub fn source(self) -> DataSource {
        match self {
            MessageKind::Drivers => DataSource::DRIVERS,
            MessageKind::Timing => DataSource::TIMING,
            MessageKind::Event => DataSource::EVENT,
            MessageKind::EventTime => DataSource::EVENT_TIME,
            MessageKind::RaceControl => DataSource::RACE_CONTROL,
            MessageKind::Weather => DataSource::WEATHER,
            MessageKind::Radio => DataSource::TEAM_RADIO,
            MessageKind::Telemetry => DataSource::TELEMETRY,
            MessageKind::Location => DataSource::LOCATION,
        }
    }

    pub fn queue_name(self) -> &'static str {
        match self {
            MessageKind::Drivers => "drivers",
            MessageKind::Timing => "timing",
            MessageKind::Event => "event",
            MessageKind::EventTime => "event_time",
            MessageKind::RaceControl => "race_control",
            MessageKind::Weather => "weather",
            MessageKind::Radio => "radio",
            MessageKind::Telemetry => "telemetry",
            MessageKind::Location => "location",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.queue_name())
    }
}

/// Typed domain message, one variant per output category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    Drivers(Drivers),
    Timing(Timing),
    Event(Event),
    EventTime(EventTime),
    RaceControl(RaceControlMessage),
    Weather(Weather),
    Radio(Radio),
    Telemetry(Telemetry),
    Location(Location),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Drivers(_) => MessageKind::Drivers,
            Message::Timing(_) => MessageKind::Timing,
            Message::Event(_) => MessageKind::Event,
            Message::EventTime(_) => MessageKind::EventTime,
            Message::RaceControl(_) => MessageKind::RaceControl,
            Message::Weather(_) => MessageKind::Weather,
            Message::Radio(_) => MessageKind::Radio,
            Message::Telemetry(_) => MessageKind::Telemetry,
            Message::Location(_) => MessageKind::Location,
        }
    }

    /// Session time this message belongs to; drives replay pacing.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Message::Drivers(m) => m.timestamp,
            Message::Timing(m) => m.timestamp,
            Message::Event(m) => m.timestamp,
            Message::EventTime(m) => m.timestamp,
            Message::RaceControl(m) => m.timestamp,
            Message::Weather(m) => m.timestamp,
            Message::Radio(m) => m.timestamp,
            Message::Telemetry(m) => m.timestamp,
            Message::Location(m) => m.timestamp,
        }
    }

    /// Heartbeat wall-clock carried by event snapshots.
    pub fn clock_sync(&self) -> Option<DateTime<Utc>> {
        match self {
            Message::Event(event) => event.now,
            _ => None,
        }
    }
}
