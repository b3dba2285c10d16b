use serde_json::Value;

use super::{ParseContext, Parser, values};
use crate::types::{Color, DriverInfo, Drivers, Message};

impl Parser {
    /// `DriverList`: `{"44": {"RacingNumber": "44", "Line": 3, "FullName": ...}}`.
    ///
    /// The roster only grows. Entries for known numbers (position updates,
    /// repeated key frames) are ignored, and a fragment that adds nobody
    /// emits nothing.
    pub(super) fn driver_list(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let Some(entries) = value.as_object() else {
            cx.field_error("DriverList", "expected an object keyed by car number");
            return;
        };

        let mut added = Vec::new();
        for (key, entry) in entries {
            if key == "_kf" {
                continue;
            }
            let Ok(number) = key.parse::<u32>() else {
                cx.field_error("RacingNumber", format!("'{key}' is not a car number"));
                continue;
            };
            if self.state.drivers.contains_key(&number) || !entry.is_object() {
                continue;
            }

            let text = |field: &str| entry.get(field).and_then(Value::as_str).unwrap_or_default().to_string();

            let hex = text("TeamColour");
            let color = if hex.is_empty() {
                Color::WHITE
            } else {
                Color::from_hex(&hex).unwrap_or_else(|error| {
                    cx.report(error);
                    Color::WHITE
                })
            };

            let info = DriverInfo {
                number,
                start_position: entry
                    .get("Line")
                    .and_then(values::lenient_u64)
                    .and_then(|line| cx.narrow("Line", line))
                    .unwrap_or(0),
                name: text("FullName"),
                short_name: text("Tla"),
                team: text("TeamName"),
                hex_color: if hex.is_empty() { String::new() } else { format!("#{hex}") },
                color,
            };

            if self.state.add_driver(info.clone()) {
                added.push(info);
            }
        }

        if added.is_empty() {
            return;
        }
        added.sort_by_key(|driver| driver.number);
        cx.emit(Message::Drivers(Drivers { timestamp: cx.timestamp, drivers: added }));
    }
}
