//! Core types for live-timing data representation.
//!
//! ## Architecture
//!
//! - [`RawFragment`] is one named, timestamped delta slice from the feed
//! - [`Category`] names the slice; [`DataSource`] selects what to decode
//! - [`Message`] is the parser's typed output, one variant per output queue
//! - [`Event`] and [`Timing`] are the cumulative snapshots the parser emits
//!
//! ## Usage Example
//!
//! ```rust
//! use paddock::types::{Category, DataSource, RawFragment};
//!
//! let fragment = RawFragment::from_wire(
//!     "LapCount",
//!     br#"{"CurrentLap":12,"TotalLaps":57}"#.to_vec(),
//!     "2023-03-05T15:30:00.000Z",
//! );
//! assert_eq!(fragment.category, Category::LapCount);
//! assert!(DataSource::EVENT.wants(fragment.category));
//! ```

mod category;
mod driver;
mod event;
mod flow;
mod fragment;
mod message;
mod timing;

pub use category::{Category, DataSource};
pub use driver::{Color, DriverInfo, Drivers};
pub use event::{
    DrsState, Event, EventType, FlagState, MAX_SEGMENTS, MeetingInfo, SessionStatus, SessionType,
    TrackState,
};
pub use flow::FlowMode;
pub use fragment::RawFragment;
pub use message::{
    EventTime, Location, Message, MessageKind, RaceControlMessage, Radio, Telemetry, Weather,
};
pub use timing::{CarLocation, Gap, PitStop, SegmentType, Timing, TireType};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn session_reset_keeps_identity() {
        let mut timing = Timing {
            number: 44,
            name: "Lewis HAMILTON".to_string(),
            team: "Mercedes".to_string(),
            color: Color::from_hex("6CD3BF").unwrap(),
            position: 3,
            sector1: Duration::from_millis(21_500),
            overall_fastest_lap: true,
            fastest_lap: Duration::from_millis(91_234),
            location: CarLocation::OnTrack,
            ..Timing::default()
        };
        timing.segments[4] = SegmentType::Purple;

        timing.reset_session_results();

        assert_eq!(timing.sector1, Duration::ZERO);
        assert!(!timing.overall_fastest_lap);
        assert_eq!(timing.fastest_lap, Duration::ZERO);
        assert_eq!(timing.segments[4], SegmentType::None);
        assert_eq!(timing.location, CarLocation::NoLocation);
        assert_eq!(timing.name, "Lewis HAMILTON");
        assert_eq!(timing.team, "Mercedes");
        assert_eq!(timing.color, Color::from_hex("6CD3BF").unwrap());
        assert_eq!(timing.position, 3);
    }

    #[test]
    fn message_kinds_map_to_distinct_sources() {
        let mut seen = DataSource::empty();
        for kind in MessageKind::ALL {
            assert!(!seen.intersects(kind.source()), "{kind} shares a source flag");
            seen |= kind.source();
        }
        assert_eq!(seen, DataSource::all());
    }

    #[test]
    fn segment_offsets_follow_sector_counts() {
        let event = Event {
            sector1_segments: 7,
            sector2_segments: 9,
            sector3_segments: 8,
            ..Event::default()
        };
        assert_eq!(event.segment_offset(0), 0);
        assert_eq!(event.segment_offset(1), 7);
        assert_eq!(event.segment_offset(2), 16);
    }
}
