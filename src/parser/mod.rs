//! Stateful delta parser.
//!
//! The feed sends each category as a sparse JSON delta over the previous
//! state of that category. [`Parser`] folds every [`RawFragment`] into its
//! [`SessionState`] and returns the typed [`Message`]s the fragment changed,
//! together with any fragment-local errors.
//!
//! The parser never stops on bad data: a malformed field is reported and the
//! field keeps its previous value, an unparseable payload is reported and the
//! fragment produces nothing.
//!
//! ```rust
//! use paddock::parser::Parser;
//! use paddock::types::{DataSource, Message, RawFragment};
//!
//! let mut parser = Parser::new(DataSource::all());
//! let parsed = parser.parse(&RawFragment::from_wire(
//!     "LapCount",
//!     br#"{"CurrentLap":3,"TotalLaps":57}"#.to_vec(),
//!     "2023-03-05T15:10:00.000Z",
//! ));
//!
//! assert!(parsed.errors.is_empty());
//! match &parsed.messages[0] {
//!     Message::Event(event) => assert_eq!((event.current_lap, event.total_laps), (3, 57)),
//!     other => panic!("unexpected message {other:?}"),
//! }
//! ```

mod car_data;
mod clock;
mod driver_list;
mod filter;
mod race_control;
mod session;
mod state;
mod timing;
mod values;
mod weather;

pub use filter::TelemetryFilter;
pub use values::{decode_payload, parse_clock, parse_gap, parse_lap_time, parse_utc};

pub(crate) use state::SessionState;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::TimingError;
use crate::types::{Category, DataSource, Message, RawFragment};

/// Output of one [`Parser::parse`] call.
#[derive(Debug, Default)]
pub struct Parsed {
    /// Messages in the order the fragment produced them
    pub messages: Vec<Message>,
    /// Fragment-local problems; decoding continued past each of them
    pub errors: Vec<TimingError>,
}

impl Parsed {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.errors.is_empty()
    }
}

/// Per-fragment working set handed to the category decoders.
pub(crate) struct ParseContext<'a> {
    pub category: Category,
    pub raw_timestamp: &'a str,
    /// Fragment time, or the previous fragment's time if this one was malformed
    pub timestamp: DateTime<Utc>,
    pub out: Parsed,
}

impl<'a> ParseContext<'a> {
    fn new(fragment: &'a RawFragment, timestamp: DateTime<Utc>) -> Self {
        Self {
            category: fragment.category,
            raw_timestamp: &fragment.timestamp,
            timestamp,
            out: Parsed::default(),
        }
    }

    pub fn emit(&mut self, message: Message) {
        self.out.messages.push(message);
    }

    /// Report a malformed field; the caller keeps the previous value.
    pub fn field_error(&mut self, field: &str, details: impl ToString) {
        let error = TimingError::parse_error(self.category, self.raw_timestamp, field, details);
        debug!(%error, "Fragment field rejected");
        self.out.errors.push(error);
    }

    /// Narrow a feed number to `u32`, reporting values that do not fit.
    pub fn narrow(&mut self, field: &str, number: u64) -> Option<u32> {
        match u32::try_from(number) {
            Ok(number) => Some(number),
            Err(_) => {
                self.field_error(field, format!("{number} is out of range"));
                None
            }
        }
    }

    /// Report an enumeration value we have no mapping for.
    pub fn unknown(&mut self, kind: &'static str, value: impl Into<String>) {
        let error = TimingError::unknown_variant(kind, value);
        debug!(%error, category = %self.category, "Unmapped feed value");
        self.out.errors.push(error);
    }

    pub fn report(&mut self, error: TimingError) {
        self.out.errors.push(error);
    }
}

/// Folds raw fragments into session state and typed messages.
///
/// One parser exists per session and runs on a single task; the state is
/// never shared. The only cross-task inputs are the telemetry filter and the
/// session-start watch channel it publishes to.
#[derive(Debug)]
pub struct Parser {
    requested: DataSource,
    state: SessionState,
    telemetry: TelemetryFilter,
    session_start: watch::Sender<Option<DateTime<Utc>>>,
    fragments: u64,
}

impl Parser {
    /// Create a parser that emits only the `requested` message categories.
    pub fn new(requested: DataSource) -> Self {
        let (session_start, _) = watch::channel(None);
        Self {
            requested,
            state: SessionState::default(),
            telemetry: TelemetryFilter::new(),
            session_start,
            fragments: 0,
        }
    }

    /// Share a telemetry filter with a session handle.
    pub fn with_telemetry_filter(mut self, filter: TelemetryFilter) -> Self {
        self.telemetry = filter;
        self
    }

    pub fn requested(&self) -> DataSource {
        self.requested
    }

    pub fn telemetry_filter(&self) -> &TelemetryFilter {
        &self.telemetry
    }

    /// Watch the session start time as soon as the feed reveals it.
    pub fn session_start_updates(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.session_start.subscribe()
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.state.session_start
    }

    /// Latest session-wide snapshot.
    pub fn event(&self) -> &crate::types::Event {
        &self.state.event
    }

    /// Number of fragments decoded so far.
    pub fn fragments_parsed(&self) -> u64 {
        self.fragments
    }

    /// Decode one fragment.
    ///
    /// Unknown and unrequested categories produce an empty result without
    /// touching the payload.
    pub fn parse(&mut self, fragment: &RawFragment) -> Parsed {
        if !self.requested.wants(fragment.category) {
            trace!(category = %fragment.category, "Skipping unrequested fragment");
            return Parsed::default();
        }
        self.fragments += 1;

        let timestamp = match values::parse_utc(&fragment.timestamp) {
            Ok(timestamp) => {
                self.state.last_timestamp = timestamp;
                timestamp
            }
            Err(reason) => {
                let mut cx = ParseContext::new(fragment, self.state.last_timestamp);
                cx.field_error("timestamp", reason);
                return self.decode(fragment, cx);
            }
        };

        self.decode(fragment, ParseContext::new(fragment, timestamp))
    }

    fn decode(&mut self, fragment: &RawFragment, mut cx: ParseContext<'_>) -> Parsed {
        let value = match values::decode_payload(fragment.category, &fragment.payload) {
            Ok(value) => value,
            Err(error) => {
                debug!(%error, "Dropping undecodable fragment");
                cx.report(error);
                return cx.out;
            }
        };

        trace!(category = %fragment.category, timestamp = %cx.timestamp, "Decoding fragment");

        match fragment.category {
            Category::Heartbeat => self.heartbeat(&value, &mut cx),
            Category::ExtrapolatedClock => self.extrapolated_clock(&value, &mut cx),
            Category::LapCount => self.lap_count(&value, &mut cx),
            Category::DriverList => self.driver_list(&value, &mut cx),
            Category::SessionInfo => self.session_info(&value, &mut cx),
            Category::SessionStatus => self.session_status(&value, &mut cx),
            Category::TrackStatus => self.track_status(&value, &mut cx),
            Category::TimingData => self.timing_data(&value, &mut cx),
            Category::TimingAppData => self.timing_app_data(&value, &mut cx),
            Category::RaceControlMessages => self.race_control(&value, &mut cx),
            Category::WeatherData => self.weather(&value, &mut cx),
            Category::TeamRadio => self.team_radio(&value, &mut cx),
            Category::CarData => self.car_data(&value, &mut cx),
            Category::Position => self.position(&value, &mut cx),
            Category::Unknown => {}
        }

        let requested = self.requested;
        cx.out.messages.retain(|message| requested.contains(message.kind().source()));
        cx.out
    }

    /// Stamp and emit the current event snapshot.
    pub(crate) fn emit_event(&mut self, cx: &mut ParseContext<'_>) {
        self.state.event.timestamp = cx.timestamp;
        cx.emit(Message::Event(self.state.event.clone()));
    }

    /// Record the session start once; later sightings are ignored.
    pub(crate) fn publish_session_start(&mut self, start: DateTime<Utc>) {
        if self.state.session_start.is_some() {
            return;
        }
        debug!(%start, "Session start time known");
        self.state.session_start = Some(start);
        self.session_start.send_replace(Some(start));
    }
}
