use serde_json::Value;
use tracing::debug;

use super::{ParseContext, Parser, values};
use crate::types::{EventType, FlagState, Message, SessionStatus, TrackState};

impl Parser {
    /// `SessionInfo`: meeting details plus the session name that determines
    /// the event type.
    pub(super) fn session_info(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        if let Some(meeting) = value.get("Meeting") {
            let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);
            let info = &mut self.state.event.meeting;

            if let Some(name) = text(meeting.get("Name")) {
                self.state.event.name = name.clone();
                info.name = name;
            }
            if let Some(official) = text(meeting.get("OfficialName")) {
                info.official_name = official;
            }
            if let Some(location) = text(meeting.get("Location")) {
                info.location = location;
            }
            if let Some(country) = text(meeting.pointer("/Country/Name")) {
                info.country = country;
            }
            if let Some(circuit) = text(meeting.pointer("/Circuit/ShortName")) {
                info.circuit = circuit;
            }
        }

        if let Some(offset) = value.get("GmtOffset").and_then(Value::as_str) {
            match parse_gmt_offset(offset) {
                Ok(secs) => self.state.event.meeting.gmt_offset_secs = Some(secs),
                Err(reason) => cx.field_error("GmtOffset", reason),
            }
        }

        if let Some(name) = value.get("Name").and_then(Value::as_str) {
            match event_type_for_session(name) {
                Some(event_type) => self.change_event_type(event_type, cx),
                None => cx.unknown("session name", name),
            }
        }

        self.state.event.heartbeat = true;
        self.emit_event(cx);
    }

    /// `SessionStatus`: `{"Status": "Started"}`.
    pub(super) fn session_status(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let Some(raw) = value.get("Status").and_then(Value::as_str) else {
            cx.field_error("Status", "missing");
            return;
        };

        let status = match raw {
            "Inactive" => SessionStatus::Inactive,
            "Started" => SessionStatus::Started,
            "Aborted" => SessionStatus::Aborted,
            "Finished" => SessionStatus::Finished,
            "Finalised" => SessionStatus::Finalised,
            "Ends" | "Ended" => SessionStatus::Ended,
            other => {
                cx.unknown("session status", other);
                return;
            }
        };

        if status == SessionStatus::Started {
            self.publish_session_start(cx.timestamp);
        }

        self.state.event.status = status;
        self.emit_event(cx);
    }

    /// `TrackStatus`: `{"Status": "4", "Message": "SCDeployed"}`.
    pub(super) fn track_status(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let Some(raw) = value.get("Status") else {
            cx.field_error("Status", "missing");
            return;
        };

        let code = values::lenient_u64(raw);
        let event = &mut self.state.event;
        match code {
            Some(1) => {
                event.track_status = FlagState::Green;
                event.safety_car = TrackState::Clear;
            }
            Some(2) => event.track_status = FlagState::Yellow,
            Some(4) => {
                event.track_status = FlagState::Yellow;
                event.safety_car = TrackState::SafetyCar;
            }
            Some(5) => event.track_status = FlagState::Red,
            Some(6) => {
                event.track_status = FlagState::Yellow;
                event.safety_car = TrackState::VirtualSafetyCar;
            }
            Some(7) => event.safety_car = TrackState::VirtualSafetyCarEnding,
            _ => {
                cx.unknown("track status", raw.to_string());
                return;
            }
        }

        // A "SCEnding" message while the safety car is out means it comes in this lap
        if value.get("Message").and_then(Value::as_str) == Some("SCEnding")
            && event.safety_car == TrackState::SafetyCar
        {
            event.safety_car = TrackState::SafetyCarEnding;
        }

        self.emit_event(cx);
    }

    /// Switch the event type, clearing per-stage results on a real change.
    ///
    /// The first type a session learns is not a change. Every driver line is
    /// re-emitted after a reset so consumers drop stale times.
    pub(super) fn change_event_type(&mut self, next: EventType, cx: &mut ParseContext<'_>) {
        let previous = self.state.event.event_type.replace(next);
        let Some(previous) = previous else {
            debug!(event_type = %next, "Session type known");
            return;
        };
        if previous == next {
            return;
        }

        debug!(from = %previous, to = %next, "Session type changed, resetting results");
        for timing in self.state.timing.values_mut() {
            timing.reset_session_results();
            timing.timestamp = cx.timestamp;
            cx.emit(Message::Timing(timing.clone()));
        }
    }
}

fn event_type_for_session(name: &str) -> Option<EventType> {
    let event_type = match name {
        "Race" => EventType::Race,
        "Qualifying" | "Sprint Qualifying" | "Sprint Shootout" => EventType::Qualifying0,
        "Sprint" => EventType::Sprint,
        "Practice 1" => EventType::Practice1,
        "Practice 2" => EventType::Practice2,
        "Practice 3" => EventType::Practice3,
        other if other.starts_with("Day ") => EventType::PreSeason,
        _ => return None,
    };
    Some(event_type)
}

/// `"01:00:00"` or `"-05:00:00"` to signed seconds.
fn parse_gmt_offset(raw: &str) -> Result<i32, String> {
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.trim_start_matches('+')),
    };
    let secs = values::parse_clock(unsigned)?.as_secs();
    i32::try_from(secs).map(|secs| sign * secs).map_err(|_| format!("offset '{raw}' out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_session_names() {
        assert_eq!(event_type_for_session("Race"), Some(EventType::Race));
        assert_eq!(event_type_for_session("Sprint Shootout"), Some(EventType::Qualifying0));
        assert_eq!(event_type_for_session("Practice 2"), Some(EventType::Practice2));
        assert_eq!(event_type_for_session("Day 3"), Some(EventType::PreSeason));
        assert_eq!(event_type_for_session("Warm Up"), None);
    }

    #[test]
    fn parses_signed_gmt_offsets() {
        assert_eq!(parse_gmt_offset("01:00:00"), Ok(3600));
        assert_eq!(parse_gmt_offset("-05:00:00"), Ok(-18_000));
        assert!(parse_gmt_offset("soon").is_err());
    }
}
