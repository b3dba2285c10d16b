//! Race weekend metadata and the static archive layout

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Result;
use crate::session::SessionMetadata;
use crate::types::SessionType;

/// Root of the static live-timing archive.
pub const STATIC_ARCHIVE_ROOT: &str = "https://livetiming.formula1.com/static";

/// One session of a race weekend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEvent {
    /// Display name, e.g. "Bahrain Grand Prix"
    pub name: String,
    pub country: String,
    /// Start of the weekend's race; dates the archive folder
    pub race_time: DateTime<Utc>,
    /// Scheduled start of this session
    pub event_time: DateTime<Utc>,
    pub session_type: SessionType,
    /// IANA timezone of the circuit, e.g. "Asia/Bahrain"
    pub timezone: String,
    pub track: String,
    /// Year the current track layout was introduced
    pub track_year: i32,
    #[serde(rename = "time_lost_in_pitlane_ms", with = "crate::config::millis")]
    pub time_lost_in_pitlane: Duration,
    /// Name used in the archive path, e.g. "Bahrain" for `Bahrain_Grand_Prix`
    pub url_name: String,
}

impl RaceEvent {
    /// Folder of this session in the static archive.
    pub fn url(&self) -> String {
        format!(
            "{}/{}/{}_{}_Grand_Prix/{}_{}/",
            STATIC_ARCHIVE_ROOT,
            self.race_time.year(),
            self.race_time.format("%Y-%m-%d"),
            self.url_name,
            self.event_time.format("%Y-%m-%d"),
            self.session_type.archive_name(),
        )
    }

    /// Local replay cache folder: `root/year/date_event/session`.
    pub fn cache_path<P: AsRef<Path>>(&self, root: P) -> PathBuf {
        root.as_ref()
            .join(self.race_time.year().to_string())
            .join(format!("{}_{}", self.race_time.format("%Y-%m-%d"), self.name))
            .join(self.session_type.to_string())
    }

    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            name: self.name.clone(),
            session_type: Some(self.session_type),
            timezone: Some(self.timezone.clone()),
            track: self.track.clone(),
            track_year: Some(self.track_year),
            time_lost_in_pitlane: self.time_lost_in_pitlane,
            session_start: Some(self.event_time),
        }
    }

    /// Parse a YAML list of events.
    pub fn calendar_from_yaml(yaml: &str) -> Result<Vec<RaceEvent>> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }
}
