//! Field-level decoding helpers shared by the category parsers.
//!
//! The feed encodes most numbers and times as strings. These helpers return
//! `Err(String)` with a short reason so the caller can turn it into a
//! fragment-local parse error and keep the previous field value.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::read::DeflateDecoder;
use serde_json::Value;
use std::io::Read;
use std::time::Duration;

use crate::types::{Category, Gap};
use crate::{Result, TimingError};

/// Parse an ISO-8601 UTC timestamp as used throughout the feed.
///
/// Accepts RFC 3339 with any fractional precision and a missing `Z`, which
/// the feed uses interchangeably.
pub fn parse_utc(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid UTC timestamp '{raw}': {e}"))
}

/// Parse a `H:MM:SS` countdown.
pub fn parse_clock(raw: &str) -> std::result::Result<Duration, String> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(format!("expected H:MM:SS, got '{raw}'"));
    };

    let number = |part: &str| {
        part.parse::<u64>().map_err(|_| format!("expected H:MM:SS, got '{raw}'"))
    };
    let (hours, minutes, seconds) = (number(hours)?, number(minutes)?, number(seconds)?);
    if minutes >= 60 || seconds >= 60 {
        return Err(format!("clock component out of range in '{raw}'"));
    }

    hours
        .checked_mul(3600)
        .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
        .map(Duration::from_secs)
        .ok_or_else(|| format!("clock '{raw}' out of range"))
}

/// Parse a lap or sector time: `1:23.456`, `23.456`, `1:02:03.456`, `+0.321`.
pub fn parse_lap_time(raw: &str) -> std::result::Result<Duration, String> {
    let trimmed = raw.trim().trim_start_matches('+');
    if trimmed.is_empty() {
        return Err("empty time".to_string());
    }
    let invalid = || format!("invalid time '{raw}'");

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return Err(format!("too many ':' in time '{raw}'"));
    }
    let (&seconds, whole) = parts.split_last().ok_or_else(invalid)?;
    let (secs, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));

    let mut total_secs = 0u64;
    for part in whole.iter().copied().chain(std::iter::once(secs)) {
        let value = part.parse::<u64>().map_err(|_| invalid())?;
        total_secs = total_secs.checked_mul(60).and_then(|t| t.checked_add(value)).ok_or_else(invalid)?;
    }

    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let nanos = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse::<u32>().map_err(|_| invalid())?
    };

    Ok(Duration::new(total_secs, nanos))
}

/// Parse a gap string: `+1.234`, `1:02.345`, `1L`, `+2 LAPS`, `LAP 12`, or empty.
pub fn parse_gap(raw: &str) -> std::result::Result<Gap, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with("LAP ") {
        // The leader shows the current lap instead of a gap
        return Ok(Gap::None);
    }

    let upper = trimmed.trim_start_matches('+').to_ascii_uppercase();
    if let Some(laps) = upper.strip_suffix('L').or_else(|| upper.strip_suffix(" LAPS")).or_else(|| upper.strip_suffix(" LAP")) {
        return laps
            .trim()
            .parse::<u32>()
            .map(Gap::Laps)
            .map_err(|_| format!("invalid lap gap '{raw}'"));
    }

    parse_lap_time(trimmed).map(Gap::Time)
}

/// Entries of a delta collection.
///
/// Key frames send arrays, deltas send objects keyed by decimal index.
/// Non-numeric keys (such as `_kf`) are skipped.
pub fn indexed(value: &Value) -> Vec<(usize, &Value)> {
    match value {
        Value::Array(items) => items.iter().enumerate().collect(),
        Value::Object(map) => {
            let mut entries: Vec<(usize, &Value)> = map
                .iter()
                .filter_map(|(key, entry)| key.parse::<usize>().ok().map(|index| (index, entry)))
                .collect();
            entries.sort_by_key(|(index, _)| *index);
            entries
        }
        _ => Vec::new(),
    }
}

/// Read an unsigned number that may arrive as a JSON number or a numeric string.
pub fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => {
            number.as_u64().or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
        }
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Read a float that may arrive as a JSON number or a numeric string.
pub fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Read a boolean that may arrive as a JSON bool, `0`/`1`, or `"true"`.
pub fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_u64().map(|v| v != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Decode a fragment payload into JSON.
///
/// Plain categories carry JSON directly. Compressed (`.z`) categories carry
/// base64 raw-deflate JSON, sometimes wrapped in a JSON string literal.
pub fn decode_payload(category: Category, payload: &[u8]) -> Result<Value> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| TimingError::decode_error(category, format!("payload is not UTF-8: {e}")))?
        .trim();

    if text.starts_with('{') || text.starts_with('[') {
        return serde_json::from_str(text).map_err(|e| TimingError::decode_error(category, e));
    }

    let encoded = match text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        Some(inner) => inner,
        None => text,
    };
    let compressed = STANDARD
        .decode(encoded)
        .map_err(|e| TimingError::decode_error(category, format!("invalid base64: {e}")))?;

    let mut inflated = Vec::with_capacity(compressed.len() * 4);
    DeflateDecoder::new(compressed.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| TimingError::decode_error(category, format!("invalid deflate stream: {e}")))?;

    serde_json::from_slice(&inflated).map_err(|e| TimingError::decode_error(category, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn parses_feed_timestamps() {
        let with_zone = parse_utc("2023-03-05T15:02:07.123Z").unwrap();
        let seven_digits = parse_utc("2023-03-05T15:02:07.1230000Z").unwrap();
        let without_zone = parse_utc("2023-03-05T15:02:07.123").unwrap();
        assert_eq!(with_zone, seven_digits);
        assert_eq!(with_zone, without_zone);
        assert!(parse_utc("yesterday").is_err());
    }

    #[test]
    fn parses_countdown_clock() {
        assert_eq!(parse_clock("1:00:00").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_clock("0:17:42").unwrap(), Duration::from_secs(17 * 60 + 42));
        assert!(parse_clock("17:42").is_err());
        assert!(parse_clock("1:75:00").is_err());
        assert!(parse_clock("one:00:00").is_err());
    }

    #[test]
    fn parses_lap_and_sector_times() {
        assert_eq!(parse_lap_time("1:23.456").unwrap(), Duration::from_millis(83_456));
        assert_eq!(parse_lap_time("21.500").unwrap(), Duration::from_millis(21_500));
        assert_eq!(parse_lap_time("+0.321").unwrap(), Duration::from_millis(321));
        assert!(parse_lap_time("").is_err());
        assert!(parse_lap_time("1:2:3:4").is_err());
        assert!(parse_lap_time("fast").is_err());
    }

    #[test]
    fn parses_gaps() {
        assert_eq!(parse_gap("").unwrap(), Gap::None);
        assert_eq!(parse_gap("LAP 34").unwrap(), Gap::None);
        assert_eq!(parse_gap("+1.234").unwrap(), Gap::Time(Duration::from_millis(1234)));
        assert_eq!(parse_gap("1L").unwrap(), Gap::Laps(1));
        assert_eq!(parse_gap("+2 LAPS").unwrap(), Gap::Laps(2));
        assert!(parse_gap("+x.y").is_err());
    }

    #[test]
    fn indexed_accepts_arrays_and_keyed_objects() {
        let array = json!([{"a": 1}, {"a": 2}]);
        assert_eq!(indexed(&array).iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1]);

        let keyed = json!({"10": {}, "2": {}, "_kf": true});
        assert_eq!(indexed(&keyed).iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![2, 10]);
    }

    #[test]
    fn decodes_plain_and_compressed_payloads() {
        let plain = decode_payload(Category::LapCount, br#"{"CurrentLap":3}"#).unwrap();
        assert_eq!(plain["CurrentLap"], 3);

        let compressed = crate::test_utils::compress_payload(&json!({"Entries": []}));
        let inflated = decode_payload(Category::CarData, &compressed).unwrap();
        assert!(inflated["Entries"].is_array());

        let quoted = format!("\"{}\"", String::from_utf8(compressed).unwrap());
        assert!(decode_payload(Category::CarData, quoted.as_bytes()).is_ok());

        assert!(decode_payload(Category::CarData, b"!!not base64!!").is_err());
    }

    proptest! {
        #[test]
        fn lap_times_parse_exactly(minutes in 0u64..5, millis in 0u64..60_000) {
            let text = format!("{}:{:02}.{:03}", minutes, millis / 1000, millis % 1000);
            let parsed = parse_lap_time(&text).unwrap();
            prop_assert_eq!(parsed, Duration::from_millis(minutes * 60_000 + millis));
        }

        #[test]
        fn clock_strings_never_panic(raw in ".*") {
            let _ = parse_clock(&raw);
            let _ = parse_gap(&raw);
            let _ = parse_utc(&raw);
        }
    }
}
