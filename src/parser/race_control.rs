use serde_json::Value;

use super::{ParseContext, Parser, values};
use crate::types::{DrsState, FlagState, Message, RaceControlMessage};

impl Parser {
    /// `RaceControlMessages`: `{"Messages": [...]}` or `{"Messages": {"17": {...}}}`.
    ///
    /// Every message is forwarded. Flag, DRS and pit-exit messages also
    /// update the event snapshot, which is emitted once after the batch.
    pub(super) fn race_control(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let Some(messages) = value.get("Messages") else {
            return;
        };

        let mut event_changed = false;
        for (_, entry) in values::indexed(messages) {
            let text = |field: &str| entry.get(field).and_then(Value::as_str).map(str::to_string);

            let utc = match text("Utc").map(|raw| values::parse_utc(&raw)) {
                Some(Ok(utc)) => utc,
                Some(Err(reason)) => {
                    cx.field_error("Utc", reason);
                    cx.timestamp
                }
                None => cx.timestamp,
            };

            let flag = match text("Flag") {
                Some(raw) => flag_state(&raw).unwrap_or_else(|| {
                    cx.unknown("flag", raw);
                    FlagState::None
                }),
                None => FlagState::None,
            };

            let message = RaceControlMessage {
                timestamp: cx.timestamp,
                utc,
                lap: entry.get("Lap").and_then(values::lenient_u64).and_then(|lap| cx.narrow("Lap", lap)),
                category: text("Category").unwrap_or_default(),
                message: text("Message").unwrap_or_default(),
                flag,
                scope: text("Scope"),
                sector: entry.get("Sector").and_then(values::lenient_u64).and_then(|s| cx.narrow("Sector", s)),
                driver_number: entry
                    .get("RacingNumber")
                    .and_then(values::lenient_u64)
                    .and_then(|n| cx.narrow("RacingNumber", n)),
            };

            event_changed |= self.apply_race_control(&message, entry, cx);
            cx.emit(Message::RaceControl(message));
        }

        if event_changed {
            self.emit_event(cx);
        }
    }

    fn apply_race_control(&mut self, message: &RaceControlMessage, entry: &Value, cx: &mut ParseContext<'_>) -> bool {
        let event = &mut self.state.event;

        match message.category.as_str() {
            "Flag" => match (message.scope.as_deref(), message.sector) {
                (Some("Sector"), Some(sector)) if sector >= 1 => {
                    let Some(slot) = event.segment_flags.get_mut(sector as usize - 1) else {
                        cx.field_error("Sector", format!("sector {sector} out of range"));
                        return false;
                    };
                    *slot = match message.flag {
                        FlagState::Yellow | FlagState::DoubleYellow | FlagState::Red => message.flag,
                        _ => FlagState::None,
                    };
                    true
                }
                (Some("Track"), _) => {
                    match message.flag {
                        FlagState::Green => {
                            event.segment_flags.iter_mut().for_each(|flag| *flag = FlagState::None);
                            event.track_status = FlagState::Green;
                        }
                        FlagState::Red | FlagState::Chequered | FlagState::Yellow => {
                            event.track_status = message.flag;
                        }
                        _ => return false,
                    }
                    true
                }
                _ => false,
            },
            "Drs" => match entry.get("Status").and_then(Value::as_str) {
                Some("ENABLED") => {
                    event.drs_enabled = DrsState::Enabled;
                    true
                }
                Some("DISABLED") => {
                    event.drs_enabled = DrsState::Disabled;
                    true
                }
                Some(other) => {
                    cx.unknown("DRS status", other);
                    false
                }
                None => false,
            },
            _ => match message.message.as_str() {
                "PIT EXIT OPEN" => {
                    event.pit_exit_open = true;
                    true
                }
                "PIT EXIT CLOSED" => {
                    event.pit_exit_open = false;
                    true
                }
                _ => false,
            },
        }
    }
}

fn flag_state(raw: &str) -> Option<FlagState> {
    let flag = match raw {
        "GREEN" | "CLEAR" => FlagState::Green,
        "YELLOW" => FlagState::Yellow,
        "DOUBLE YELLOW" => FlagState::DoubleYellow,
        "RED" => FlagState::Red,
        "CHEQUERED" => FlagState::Chequered,
        "BLUE" => FlagState::Blue,
        "BLACK AND WHITE" => FlagState::BlackAndWhite,
        _ => return None,
    };
    Some(flag)
}
