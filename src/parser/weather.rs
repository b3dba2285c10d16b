use serde_json::Value;

use super::{ParseContext, Parser, values};
use crate::types::{Message, Radio};

impl Parser {
    /// `WeatherData`: every reading arrives as a numeric string.
    pub(super) fn weather(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let weather = &mut self.state.weather;
        let fields: [(&str, &mut f64); 6] = [
            ("AirTemp", &mut weather.air_temp),
            ("Humidity", &mut weather.humidity),
            ("Pressure", &mut weather.pressure),
            ("TrackTemp", &mut weather.track_temp),
            ("WindDirection", &mut weather.wind_direction),
            ("WindSpeed", &mut weather.wind_speed),
        ];
        for (field, slot) in fields {
            let Some(raw) = value.get(field) else {
                continue;
            };
            match values::lenient_f64(raw) {
                Some(reading) => *slot = reading,
                None => cx.field_error(field, format!("expected a number, got {raw}")),
            }
        }

        if let Some(raw) = value.get("Rainfall") {
            match values::lenient_bool(raw) {
                Some(rain) => weather.rainfall = rain,
                None => cx.field_error("Rainfall", format!("expected 0 or 1, got {raw}")),
            }
        }

        weather.timestamp = cx.timestamp;
        cx.emit(Message::Weather(weather.clone()));
    }

    /// `TeamRadio`: `{"Captures": [{"Utc": ..., "RacingNumber": "44", "Path": ...}]}`.
    pub(super) fn team_radio(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let Some(captures) = value.get("Captures") else {
            return;
        };

        for (_, capture) in values::indexed(captures) {
            let Some(number) = capture.get("RacingNumber").and_then(values::lenient_u64) else {
                cx.field_error("RacingNumber", "missing or not a car number");
                continue;
            };
            let Some(number) = cx.narrow("RacingNumber", number) else {
                continue;
            };
            let utc = match capture.get("Utc").and_then(Value::as_str).map(values::parse_utc) {
                Some(Ok(utc)) => utc,
                Some(Err(reason)) => {
                    cx.field_error("Utc", reason);
                    cx.timestamp
                }
                None => cx.timestamp,
            };

            cx.emit(Message::Radio(Radio {
                timestamp: cx.timestamp,
                utc,
                driver_number: number,
                driver_name: self.state.driver_name(number),
                path: capture.get("Path").and_then(Value::as_str).unwrap_or_default().to_string(),
            }));
        }
    }
}
