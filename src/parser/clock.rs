use serde_json::Value;

use super::{ParseContext, Parser, values};
use crate::types::{EventTime, Message};

impl Parser {
    /// `Heartbeat`: `{"Utc": "..."}`, the feed's authoritative wall clock.
    pub(super) fn heartbeat(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        match value.get("Utc").and_then(Value::as_str).map(values::parse_utc) {
            Some(Ok(now)) => self.state.event.now = Some(now),
            Some(Err(reason)) => cx.field_error("Utc", reason),
            None => cx.field_error("Utc", "missing"),
        }
        self.state.event.heartbeat = true;

        self.emit_event(cx);
        self.emit_event_time(cx);
    }

    /// `ExtrapolatedClock`: `{"Utc": "...", "Remaining": "0:59:58", "Extrapolating": true}`.
    ///
    /// While extrapolating, `Utc` marks the moment the clock (re)started.
    pub(super) fn extrapolated_clock(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        if let Some(remaining) = value.get("Remaining").and_then(Value::as_str) {
            match values::parse_clock(remaining) {
                Ok(remaining) => self.state.event.remaining_time = remaining,
                Err(reason) => cx.field_error("Remaining", reason),
            }
        }

        if let Some(extrapolating) = value.get("Extrapolating").and_then(values::lenient_bool) {
            self.state.event.clock_stopped = !extrapolating;

            if extrapolating {
                match value.get("Utc").and_then(Value::as_str).map(values::parse_utc) {
                    Some(Ok(start)) => {
                        self.state.event.session_start_time = Some(start);
                        self.publish_session_start(start);
                    }
                    Some(Err(reason)) => cx.field_error("Utc", reason),
                    None => {}
                }
            }
        }

        self.emit_event(cx);
        self.emit_event_time(cx);
    }

    /// `LapCount`: `{"CurrentLap": 12, "TotalLaps": 57}`.
    pub(super) fn lap_count(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let mut read = |field: &str, slot: &mut u32| {
            if let Some(raw) = value.get(field) {
                match values::lenient_u64(raw) {
                    Some(lap) => {
                        if let Some(lap) = cx.narrow(field, lap) {
                            *slot = lap;
                        }
                    }
                    None => cx.field_error(field, format!("expected a lap number, got {raw}")),
                }
            }
        };

        let event = &mut self.state.event;
        read("CurrentLap", &mut event.current_lap);
        read("TotalLaps", &mut event.total_laps);

        self.emit_event(cx);
    }

    fn emit_event_time(&self, cx: &mut ParseContext<'_>) {
        let event = &self.state.event;
        cx.emit(Message::EventTime(EventTime {
            timestamp: cx.timestamp,
            now: event.now,
            remaining: event.remaining_time,
            clock_stopped: event.clock_stopped,
        }));
    }
}
