//! Fragment builders shared by unit tests and benchmarks
//!
//! Timestamps are expressed as offsets from a fixed session base so tests
//! can reason about pacing in plain seconds.

#![cfg(any(test, feature = "benchmark"))]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use serde_json::{Value, json};
use std::io::Write;

use crate::types::{Category, RawFragment};

/// Session base time used by every builder: 2023-03-05 15:00:00 UTC.
pub fn base_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_678_028_400, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Base time plus `millis`.
pub fn at(millis: i64) -> DateTime<Utc> {
    base_time() + ChronoDuration::milliseconds(millis)
}

/// Feed-formatted timestamp `millis` after the base.
pub fn stamp(millis: i64) -> String {
    at(millis).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Encode JSON the way compressed (`.z`) categories arrive: base64 raw deflate.
pub fn compress_payload(value: &Value) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    let compressed = match encoder.write_all(&bytes) {
        Ok(()) => encoder.finish().unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    STANDARD.encode(compressed).into_bytes()
}

/// Plain JSON fragment.
pub fn fragment(category: &str, payload: Value, millis: i64) -> RawFragment {
    let bytes = serde_json::to_vec(&payload).unwrap_or_default();
    RawFragment::from_wire(category, bytes, stamp(millis))
}

/// Compressed fragment for `CarData.z` / `Position.z`.
pub fn compressed_fragment(category: Category, payload: Value, millis: i64) -> RawFragment {
    RawFragment::new(category, compress_payload(&payload), stamp(millis))
}

/// Roster entry in feed format.
pub fn driver_entry(number: u32, line: u32, name: &str, tla: &str, team: &str, colour: &str) -> Value {
    json!({
        "RacingNumber": number.to_string(),
        "Line": line,
        "FullName": name,
        "Tla": tla,
        "TeamName": team,
        "TeamColour": colour,
    })
}

/// Two-car roster fragment at `millis`.
pub fn roster(millis: i64) -> RawFragment {
    fragment(
        "DriverList",
        json!({
            "1": driver_entry(1, 1, "Max VERSTAPPEN", "VER", "Red Bull Racing", "3671C6"),
            "44": driver_entry(44, 2, "Lewis HAMILTON", "HAM", "Mercedes", "6CD3BF"),
        }),
        millis,
    )
}

/// A short race: roster, session info, clock start, then `laps` lap counts
/// with timing, telemetry and position traffic one second apart.
pub fn race_session(laps: u32) -> Vec<RawFragment> {
    let mut fragments = vec![
        fragment(
            "SessionInfo",
            json!({"Meeting": {"Name": "Bahrain Grand Prix"}, "Name": "Race", "Type": "Race"}),
            0,
        ),
        roster(0),
        fragment("SessionStatus", json!({"Status": "Started"}), 1_000),
        fragment(
            "ExtrapolatedClock",
            json!({"Utc": stamp(1_000), "Remaining": "2:00:00", "Extrapolating": true}),
            1_000,
        ),
    ];

    for lap in 1..=laps {
        let millis = i64::from(lap) * 1_000 + 1_000;
        fragments.push(fragment("LapCount", json!({"CurrentLap": lap, "TotalLaps": laps}), millis));
        fragments.push(fragment(
            "TimingData",
            json!({"Lines": {"44": {"NumberOfLaps": lap, "LastLapTime": {"Value": "1:35.123"}}}}),
            millis,
        ));
        fragments.push(compressed_fragment(
            Category::CarData,
            json!({"Entries": [{"Utc": stamp(millis), "Cars": {
                "1": {"Channels": {"0": 11000, "2": 290, "3": 8, "4": 100, "5": 0, "45": 12}},
                "44": {"Channels": {"0": 10800, "2": 288, "3": 8, "4": 99, "5": 0, "45": 8}},
            }}]}),
            millis,
        ));
        fragments.push(compressed_fragment(
            Category::Position,
            json!({"Position": [{"Timestamp": stamp(millis), "Entries": {
                "1": {"Status": "OnTrack", "X": 1200.5, "Y": -340.0, "Z": 12.0},
                "44": {"Status": "OnTrack", "X": 1100.0, "Y": -300.5, "Z": 12.0},
            }}]}),
            millis,
        ));
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_offset_from_base() {
        assert_eq!(stamp(0), "2023-03-05T15:00:00.000Z");
        assert_eq!(stamp(1_500), "2023-03-05T15:00:01.500Z");
    }

    #[test]
    fn race_session_is_time_ordered() {
        let fragments = race_session(3);
        let times: Vec<_> = fragments.iter().map(|f| f.timestamp.clone()).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }
}
