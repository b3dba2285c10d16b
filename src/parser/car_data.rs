use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{ParseContext, Parser, values};
use crate::types::{Location, Message, Telemetry};

/// Coordinates this close to the origin mean "no fix"
const ZERO_POSITION_TOLERANCE: f64 = 0.000001;

/// DRS channel values that mean the flap is open
const DRS_OPEN: [u64; 3] = [10, 12, 14];

impl Parser {
    /// `CarData.z`: `{"Entries": [{"Utc": ..., "Cars": {"44": {"Channels": {"0": rpm, ...}}}}]}`.
    pub(super) fn car_data(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let Some(entries) = value.get("Entries") else {
            cx.field_error("Entries", "missing");
            return;
        };

        for (_, entry) in values::indexed(entries) {
            let timestamp = sample_time(entry.get("Utc"), "Utc", cx);
            let Some(cars) = entry.get("Cars").and_then(Value::as_object) else {
                continue;
            };

            for (key, car) in cars {
                let Ok(number) = key.parse::<u32>() else {
                    cx.field_error("Cars", format!("'{key}' is not a car number"));
                    continue;
                };
                if !self.telemetry.allows(number) {
                    continue;
                }
                let Some(channels) = car.get("Channels") else {
                    continue;
                };
                let channel = |id: &str| channels.get(id).and_then(values::lenient_f64).unwrap_or(0.0);

                cx.emit(Message::Telemetry(Telemetry {
                    timestamp,
                    driver_number: number,
                    rpm: channel("0").clamp(0.0, u16::MAX as f64) as u16,
                    speed: channel("2") as f32,
                    gear: channel("3").clamp(0.0, u8::MAX as f64) as u8,
                    throttle: channel("4") as f32,
                    brake: channel("5") as f32,
                    drs: channels.get("45").and_then(values::lenient_u64).is_some_and(|v| DRS_OPEN.contains(&v)),
                }));
            }
        }
    }

    /// `Position.z`: `{"Position": [{"Timestamp": ..., "Entries": {"44": {"X": .., "Y": .., "Z": ..}}}]}`.
    ///
    /// Samples at the origin are dropped; cars without a fix report (0, 0).
    /// The telemetry filter does not apply: the track map shows every car.
    pub(super) fn position(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let Some(samples) = value.get("Position") else {
            cx.field_error("Position", "missing");
            return;
        };

        for (_, sample) in values::indexed(samples) {
            let timestamp = sample_time(sample.get("Timestamp"), "Timestamp", cx);
            let Some(entries) = sample.get("Entries").and_then(Value::as_object) else {
                continue;
            };

            for (key, entry) in entries {
                let Ok(number) = key.parse::<u32>() else {
                    cx.field_error("Entries", format!("'{key}' is not a car number"));
                    continue;
                };
                let axis = |name: &str| entry.get(name).and_then(values::lenient_f64).unwrap_or(0.0);
                let (x, y, z) = (axis("X"), axis("Y"), axis("Z"));

                if x.abs() < ZERO_POSITION_TOLERANCE && y.abs() < ZERO_POSITION_TOLERANCE {
                    continue;
                }

                cx.emit(Message::Location(Location { timestamp, driver_number: number, x, y, z }));
            }
        }
    }
}

/// Sample time, falling back to the fragment time when unusable.
fn sample_time(raw: Option<&Value>, field: &str, cx: &mut ParseContext<'_>) -> DateTime<Utc> {
    match raw.and_then(Value::as_str).map(values::parse_utc) {
        Some(Ok(timestamp)) => timestamp,
        Some(Err(reason)) => {
            cx.field_error(field, reason);
            cx.timestamp
        }
        None => cx.timestamp,
    }
}
