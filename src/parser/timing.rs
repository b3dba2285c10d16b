use serde_json::Value;
use std::time::Duration;

use super::{ParseContext, Parser, values};
use crate::types::{
    CarLocation, EventType, FlagState, Gap, MAX_SEGMENTS, Message, PitStop, SegmentType, Timing,
    TireType,
};

impl Parser {
    /// `TimingData`: per-car lines keyed by number, plus `SessionPart` during
    /// qualifying.
    pub(super) fn timing_data(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        if let Some(part) = value.get("SessionPart").and_then(values::lenient_u64) {
            let qualifying = self.state.event.event_type.is_none_or(EventType::is_qualifying);
            match EventType::qualifying_stage(part) {
                Some(stage) if qualifying => self.change_event_type(stage, cx),
                Some(_) => {}
                None => cx.unknown("qualifying part", part.to_string()),
            }
        }

        let Some(lines) = value.get("Lines").and_then(Value::as_object) else {
            return;
        };

        let mut event_changed = false;
        let mut fastest_lap_holder = None;

        for (key, line) in lines {
            let Ok(number) = key.parse::<u32>() else {
                cx.field_error("Lines", format!("'{key}' is not a car number"));
                continue;
            };
            let Some(mut timing) = self.state.timing.get(&number).cloned() else {
                cx.field_error("Lines", format!("car {number} is not in the roster"));
                continue;
            };

            event_changed |= self.apply_timing_line(&mut timing, line, cx);
            if timing.last_lap_overall_fastest && line.pointer("/LastLapTime/OverallFastest").is_some() {
                timing.overall_fastest_lap = true;
                fastest_lap_holder = Some(number);
            }

            timing.timestamp = cx.timestamp;
            cx.emit(Message::Timing(timing.clone()));
            self.state.timing.insert(number, timing);
        }

        // Only one car holds the overall fastest lap
        if let Some(holder) = fastest_lap_holder {
            for (number, timing) in self.state.timing.iter_mut() {
                if *number != holder && timing.overall_fastest_lap {
                    timing.overall_fastest_lap = false;
                    timing.timestamp = cx.timestamp;
                    cx.emit(Message::Timing(timing.clone()));
                }
            }
        }

        if event_changed {
            self.emit_event(cx);
        }
    }

    /// Apply one car's delta. Returns whether the sector layout changed.
    fn apply_timing_line(&mut self, timing: &mut Timing, line: &Value, cx: &mut ParseContext<'_>) -> bool {
        let mut layout_changed = false;

        if let Some(raw) = line.get("Position") {
            match values::lenient_u64(raw) {
                Some(position) => {
                    if let Some(position) = cx.narrow("Position", position) {
                        timing.position = position;
                    }
                }
                None => cx.field_error("Position", format!("expected a position, got {raw}")),
            }
        }

        set_gap(cx, "GapToLeader", line.get("GapToLeader"), &mut timing.gap_to_leader);
        set_gap(
            cx,
            "IntervalToPositionAhead",
            line.pointer("/IntervalToPositionAhead/Value"),
            &mut timing.time_diff_to_position_ahead,
        );
        set_gap(cx, "TimeDiffToFastest", line.get("TimeDiffToFastest"), &mut timing.time_diff_to_fastest);
        set_gap(
            cx,
            "TimeDiffToPositionAhead",
            line.get("TimeDiffToPositionAhead"),
            &mut timing.time_diff_to_position_ahead,
        );

        if let Some(sectors) = line.get("Sectors") {
            // Key frames carry the full sector list and reveal the segment layout
            let full = sectors.is_array();
            for (index, sector) in values::indexed(sectors) {
                if index > 2 {
                    cx.field_error("Sectors", format!("sector index {index} out of range"));
                    continue;
                }
                layout_changed |= self.apply_sector(timing, index, sector, full, cx);
            }
        }

        if let Some(trap) = line.pointer("/Speeds/ST") {
            if let Some(speed) = trap.get("Value").and_then(values::lenient_u64).and_then(|v| cx.narrow("Speeds", v)) {
                timing.speed_trap = speed;
            }
            if let Some(flag) = trap.get("PersonalFastest").and_then(values::lenient_bool) {
                timing.speed_trap_personal_fastest = flag;
            }
            if let Some(flag) = trap.get("OverallFastest").and_then(values::lenient_bool) {
                timing.speed_trap_overall_fastest = flag;
            }
        }

        if let Some(best) = line.pointer("/BestLapTime/Value").and_then(Value::as_str) {
            set_time(cx, "BestLapTime", best, &mut timing.fastest_lap);
        }

        if let Some(last) = line.get("LastLapTime") {
            if let Some(text) = last.get("Value").and_then(Value::as_str) {
                set_time(cx, "LastLapTime", text, &mut timing.last_lap);
            }
            if let Some(flag) = last.get("PersonalFastest").and_then(values::lenient_bool) {
                timing.last_lap_personal_fastest = flag;
            }
            if let Some(flag) = last.get("OverallFastest").and_then(values::lenient_bool) {
                timing.last_lap_overall_fastest = flag;
            }
        }

        if let Some(raw) = line.get("NumberOfLaps") {
            match values::lenient_u64(raw).map(|laps| cx.narrow("NumberOfLaps", laps)) {
                Some(None) => {}
                Some(Some(laps)) => {
                    if laps > timing.lap {
                        timing.laps_on_tire += laps - timing.lap;
                        if self.state.event.track_status == FlagState::Chequered {
                            timing.chequered_flag = true;
                        }
                        if timing.location == CarLocation::OutLap {
                            timing.location = CarLocation::OnTrack;
                        }
                    }
                    timing.lap = laps;
                }
                None => cx.field_error("NumberOfLaps", format!("expected a lap count, got {raw}")),
            }
        }

        if let Some(stops) =
            line.get("NumberOfPitStops").and_then(values::lenient_u64).and_then(|n| cx.narrow("NumberOfPitStops", n))
        {
            timing.pitstops = stops;
        }

        if line.get("InPit").and_then(values::lenient_bool) == Some(true)
            && timing.location != CarLocation::Pitlane
        {
            timing.location = CarLocation::Pitlane;
            timing.pit_stop_times.push(PitStop {
                lap: timing.lap,
                pitlane_entry: cx.timestamp,
                pitlane_exit: None,
                pitlane_time: Duration::ZERO,
            });
        }

        match line.get("PitOut").and_then(values::lenient_bool) {
            Some(true) => {
                timing.location = CarLocation::PitOut;
                if let Some(stop) = timing.pit_stop_times.last_mut().filter(|s| s.pitlane_exit.is_none()) {
                    stop.pitlane_exit = Some(cx.timestamp);
                    stop.pitlane_time = (cx.timestamp - stop.pitlane_entry).to_std().unwrap_or_default();
                }
            }
            Some(false) if timing.location == CarLocation::PitOut => timing.location = CarLocation::OutLap,
            _ => {}
        }

        if line.get("Retired").and_then(values::lenient_bool) == Some(true) {
            timing.location = CarLocation::OutOfRace;
        }
        if line.get("Stopped").and_then(values::lenient_bool) == Some(true) {
            timing.location = CarLocation::Stopped;
        }
        if let Some(out) = line.get("KnockedOut").and_then(values::lenient_bool) {
            timing.knocked_out_of_qualifying = out;
        }

        layout_changed
    }

    /// Apply one sector delta. Returns whether the event segment layout changed.
    fn apply_sector(
        &mut self,
        timing: &mut Timing,
        sector: usize,
        delta: &Value,
        full: bool,
        cx: &mut ParseContext<'_>,
    ) -> bool {
        let (time, personal, overall) = match sector {
            0 => (&mut timing.sector1, &mut timing.sector1_personal_fastest, &mut timing.sector1_overall_fastest),
            1 => (&mut timing.sector2, &mut timing.sector2_personal_fastest, &mut timing.sector2_overall_fastest),
            _ => (&mut timing.sector3, &mut timing.sector3_personal_fastest, &mut timing.sector3_overall_fastest),
        };

        if let Some(text) = delta.get("Value").and_then(Value::as_str) {
            if text.is_empty() {
                *time = Duration::ZERO;
            } else {
                set_time(cx, "Sectors", text, time);
            }
        }
        if let Some(flag) = delta.get("PersonalFastest").and_then(values::lenient_bool) {
            *personal = flag;
        }
        if let Some(flag) = delta.get("OverallFastest").and_then(values::lenient_bool) {
            *overall = flag;
        }

        let mut layout_changed = false;
        let Some(segments) = delta.get("Segments") else {
            return false;
        };

        let event = &mut self.state.event;
        if full && segments.is_array() {
            let count = values::indexed(segments).len();
            let slot = match sector {
                0 => &mut event.sector1_segments,
                1 => &mut event.sector2_segments,
                _ => &mut event.sector3_segments,
            };
            if *slot != count {
                *slot = count;
                event.total_segments = event.sector1_segments + event.sector2_segments + event.sector3_segments;
                layout_changed = true;
            }
        }

        let offset = event.segment_offset(sector);
        for (index, segment) in values::indexed(segments) {
            let slot = offset + index;
            if slot >= MAX_SEGMENTS {
                cx.field_error("Segments", format!("segment {slot} exceeds {MAX_SEGMENTS} slots"));
                continue;
            }
            let Some(code) = segment.get("Status").and_then(values::lenient_u64) else {
                continue;
            };
            match segment_type(code) {
                Some(status) => {
                    timing.segments[slot] = status;
                    if status != SegmentType::None {
                        timing.previous_segment_index = slot;
                    }
                }
                None => cx.unknown("segment status", code.to_string()),
            }
        }

        if timing.location == CarLocation::NoLocation {
            timing.location = CarLocation::OnTrack;
        }

        layout_changed
    }

    /// `TimingAppData`: tyre stints and grid position.
    pub(super) fn timing_app_data(&mut self, value: &Value, cx: &mut ParseContext<'_>) {
        let Some(lines) = value.get("Lines").and_then(Value::as_object) else {
            return;
        };

        for (key, line) in lines {
            let Ok(number) = key.parse::<u32>() else {
                cx.field_error("Lines", format!("'{key}' is not a car number"));
                continue;
            };
            let Some(mut timing) = self.state.timing.get(&number).cloned() else {
                cx.field_error("Lines", format!("car {number} is not in the roster"));
                continue;
            };

            if let Some(stints) = line.get("Stints") {
                let current = self.state.stints.entry(number).or_insert(0);
                for (index, stint) in values::indexed(stints) {
                    if index < *current {
                        continue;
                    }
                    if index > *current {
                        *current = index;
                        timing.laps_on_tire = 0;
                        timing.pitstops = timing.pitstops.max(u32::try_from(index).unwrap_or(u32::MAX));
                    }

                    if let Some(compound) = stint.get("Compound").and_then(Value::as_str) {
                        match tire_type(compound) {
                            Some(tire) => timing.tire = tire,
                            None => cx.unknown("tyre compound", compound),
                        }
                    }
                    if let Some(laps) =
                        stint.get("TotalLaps").and_then(values::lenient_u64).and_then(|n| cx.narrow("TotalLaps", n))
                    {
                        timing.laps_on_tire = laps;
                    }
                }
            }

            timing.timestamp = cx.timestamp;
            cx.emit(Message::Timing(timing.clone()));
            self.state.timing.insert(number, timing);
        }
    }
}

fn set_gap(cx: &mut ParseContext<'_>, field: &str, raw: Option<&Value>, slot: &mut Gap) {
    let Some(text) = raw.and_then(Value::as_str) else {
        return;
    };
    match values::parse_gap(text) {
        Ok(gap) => *slot = gap,
        Err(reason) => cx.field_error(field, reason),
    }
}

fn set_time(cx: &mut ParseContext<'_>, field: &str, text: &str, slot: &mut Duration) {
    if text.is_empty() {
        return;
    }
    match values::parse_lap_time(text) {
        Ok(time) => *slot = time,
        Err(reason) => cx.field_error(field, reason),
    }
}

fn segment_type(code: u64) -> Option<SegmentType> {
    let segment = match code {
        0 => SegmentType::None,
        2048 => SegmentType::Yellow,
        2049 => SegmentType::Green,
        2050 => SegmentType::Invalid,
        2051 => SegmentType::Purple,
        2052 => SegmentType::Red,
        2064 => SegmentType::Pitlane,
        _ => return None,
    };
    Some(segment)
}

fn tire_type(compound: &str) -> Option<TireType> {
    let tire = match compound {
        "SOFT" => TireType::Soft,
        "MEDIUM" => TireType::Medium,
        "HARD" => TireType::Hard,
        "INTERMEDIATE" => TireType::Intermediate,
        "WET" => TireType::Wet,
        "TEST_UNKNOWN" | "TEST" => TireType::Test,
        "HYPERSOFT" => TireType::HyperSoft,
        "ULTRASOFT" => TireType::UltraSoft,
        "SUPERSOFT" => TireType::SuperSoft,
        "UNKNOWN" => TireType::Unknown,
        _ => return None,
    };
    Some(tire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_segment_codes() {
        assert_eq!(segment_type(2051), Some(SegmentType::Purple));
        assert_eq!(segment_type(2064), Some(SegmentType::Pitlane));
        assert_eq!(segment_type(0), Some(SegmentType::None));
        assert_eq!(segment_type(9999), None);
    }

    #[test]
    fn maps_compounds() {
        assert_eq!(tire_type("INTERMEDIATE"), Some(TireType::Intermediate));
        assert_eq!(tire_type("TEST_UNKNOWN"), Some(TireType::Test));
        assert_eq!(tire_type("C5"), None);
    }
}
