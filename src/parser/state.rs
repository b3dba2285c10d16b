//! Cumulative session state owned by the parser

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::types::{DriverInfo, Event, Timing, Weather};

/// Everything the feed has told us so far.
///
/// Only the parser task mutates this. Consumers see copies through the
/// messages it emits.
#[derive(Debug, Clone)]
pub(crate) struct SessionState {
    /// Append-only roster
    pub drivers: BTreeMap<u32, DriverInfo>,
    /// One line per roster entry, created together with it
    pub timing: BTreeMap<u32, Timing>,
    pub event: Event,
    pub weather: Weather,
    /// Highest stint index seen per car
    pub stints: BTreeMap<u32, usize>,
    /// Last successfully parsed fragment timestamp
    pub last_timestamp: DateTime<Utc>,
    pub session_start: Option<DateTime<Utc>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            drivers: BTreeMap::new(),
            timing: BTreeMap::new(),
            event: Event::default(),
            weather: Weather::default(),
            stints: BTreeMap::new(),
            last_timestamp: DateTime::<Utc>::UNIX_EPOCH,
            session_start: None,
        }
    }
}

impl SessionState {
    /// Register a new car. Returns `false` when the number is already known.
    pub fn add_driver(&mut self, info: DriverInfo) -> bool {
        if self.drivers.contains_key(&info.number) {
            return false;
        }

        let timing = Timing {
            number: info.number,
            position: info.start_position,
            name: info.name.clone(),
            short_name: info.short_name.clone(),
            team: info.team.clone(),
            hex_color: info.hex_color.clone(),
            color: info.color,
            ..Timing::default()
        };
        self.timing.insert(info.number, timing);
        self.drivers.insert(info.number, info);
        true
    }

    pub fn driver_name(&self, number: u32) -> String {
        self.drivers.get(&number).map(|d| d.name.clone()).unwrap_or_default()
    }
}
