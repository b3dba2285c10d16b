//! Bounded per-category output queues.
//!
//! Each message kind gets its own tokio `mpsc` channel so consumers can
//! drain categories independently. Sends block when a queue is full; there
//! is no drop policy, so a consumer that stops draining one category
//! eventually stalls the whole pipeline. [`QueueProbe`] exposes queue depths
//! so that condition can be observed.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{
    Drivers, Event, EventTime, Location, Message, MessageKind, RaceControlMessage, Radio,
    Telemetry, Timing, Weather,
};
use crate::{Result, TimingError};

/// Capacity of each output queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueCapacities {
    pub drivers: usize,
    pub timing: usize,
    pub event: usize,
    pub event_time: usize,
    pub race_control: usize,
    pub weather: usize,
    pub radio: usize,
    pub telemetry: usize,
    pub location: usize,
}

impl Default for QueueCapacities {
    fn default() -> Self {
        Self {
            drivers: 100,
            timing: 10_000,
            event: 1_000,
            event_time: 10,
            race_control: 100,
            weather: 100,
            radio: 100,
            telemetry: 1_000,
            location: 1_000,
        }
    }
}

impl QueueCapacities {
    pub fn for_kind(&self, kind: MessageKind) -> usize {
        match kind {
            MessageKind::Drivers => self.drivers,
            MessageKind::Timing => self.timing,
            MessageKind::Event => self.event,
            MessageKind::EventTime => self.event_time,
            MessageKind::RaceControl => self.race_control,
            MessageKind::Weather => self.weather,
            MessageKind::Radio => self.radio,
            MessageKind::Telemetry => self.telemetry,
            MessageKind::Location => self.location,
        }
    }

    /// tokio channels reject a zero capacity.
    pub fn validate(&self) -> Result<()> {
        match MessageKind::ALL.into_iter().find(|kind| self.for_kind(*kind) == 0) {
            Some(kind) => Err(TimingError::config_error(format!("queue '{kind}' needs a capacity of at least 1"))),
            None => Ok(()),
        }
    }
}

/// Consumer side: one receiver per message category.
///
/// A receiver yields `None` once the session has closed and the queue is
/// drained.
#[derive(Debug)]
pub struct MessageQueues {
    pub drivers: mpsc::Receiver<Drivers>,
    pub timing: mpsc::Receiver<Timing>,
    pub event: mpsc::Receiver<Event>,
    pub event_time: mpsc::Receiver<EventTime>,
    pub race_control: mpsc::Receiver<RaceControlMessage>,
    pub weather: mpsc::Receiver<Weather>,
    pub radio: mpsc::Receiver<Radio>,
    pub telemetry: mpsc::Receiver<Telemetry>,
    pub location: mpsc::Receiver<Location>,
}

/// Producer side, owned by the scheduler task.
///
/// Dropping it closes every queue.
#[derive(Debug)]
pub struct OutputQueues {
    drivers: mpsc::Sender<Drivers>,
    timing: mpsc::Sender<Timing>,
    event: mpsc::Sender<Event>,
    event_time: mpsc::Sender<EventTime>,
    race_control: mpsc::Sender<RaceControlMessage>,
    weather: mpsc::Sender<Weather>,
    radio: mpsc::Sender<Radio>,
    telemetry: mpsc::Sender<Telemetry>,
    location: mpsc::Sender<Location>,
}

/// Create the nine queues.
pub fn channel(capacities: &QueueCapacities) -> Result<(OutputQueues, MessageQueues)> {
    capacities.validate()?;

    let (drivers_tx, drivers) = mpsc::channel(capacities.drivers);
    let (timing_tx, timing) = mpsc::channel(capacities.timing);
    let (event_tx, event) = mpsc::channel(capacities.event);
    let (event_time_tx, event_time) = mpsc::channel(capacities.event_time);
    let (race_control_tx, race_control) = mpsc::channel(capacities.race_control);
    let (weather_tx, weather) = mpsc::channel(capacities.weather);
    let (radio_tx, radio) = mpsc::channel(capacities.radio);
    let (telemetry_tx, telemetry) = mpsc::channel(capacities.telemetry);
    let (location_tx, location) = mpsc::channel(capacities.location);

    let output = OutputQueues {
        drivers: drivers_tx,
        timing: timing_tx,
        event: event_tx,
        event_time: event_time_tx,
        race_control: race_control_tx,
        weather: weather_tx,
        radio: radio_tx,
        telemetry: telemetry_tx,
        location: location_tx,
    };
    let queues =
        MessageQueues { drivers, timing, event, event_time, race_control, weather, radio, telemetry, location };
    Ok((output, queues))
}

impl OutputQueues {
    /// Send one message to its category queue, waiting while the queue is full.
    ///
    /// Fails only when the consumer dropped that queue's receiver.
    pub async fn send(&self, message: Message) -> Result<()> {
        let kind = message.kind();
        let sent = match message {
            Message::Drivers(m) => self.drivers.send(m).await.is_ok(),
            Message::Timing(m) => self.timing.send(m).await.is_ok(),
            Message::Event(m) => self.event.send(m).await.is_ok(),
            Message::EventTime(m) => self.event_time.send(m).await.is_ok(),
            Message::RaceControl(m) => self.race_control.send(m).await.is_ok(),
            Message::Weather(m) => self.weather.send(m).await.is_ok(),
            Message::Radio(m) => self.radio.send(m).await.is_ok(),
            Message::Telemetry(m) => self.telemetry.send(m).await.is_ok(),
            Message::Location(m) => self.location.send(m).await.is_ok(),
        };

        if sent { Ok(()) } else { Err(TimingError::QueueClosed { queue: kind.queue_name() }) }
    }

    /// Depth observer that does not keep the queues open.
    pub fn probe(&self) -> QueueProbe {
        QueueProbe {
            drivers: Slot::new(&self.drivers),
            timing: Slot::new(&self.timing),
            event: Slot::new(&self.event),
            event_time: Slot::new(&self.event_time),
            race_control: Slot::new(&self.race_control),
            weather: Slot::new(&self.weather),
            radio: Slot::new(&self.radio),
            telemetry: Slot::new(&self.telemetry),
            location: Slot::new(&self.location),
        }
    }
}

/// Messages waiting in each queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub drivers: usize,
    pub timing: usize,
    pub event: usize,
    pub event_time: usize,
    pub race_control: usize,
    pub weather: usize,
    pub radio: usize,
    pub telemetry: usize,
    pub location: usize,
}

impl QueueDepths {
    pub fn total(&self) -> usize {
        self.drivers
            + self.timing
            + self.event
            + self.event_time
            + self.race_control
            + self.weather
            + self.radio
            + self.telemetry
            + self.location
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    sender: mpsc::WeakSender<T>,
    max: usize,
}

impl<T> Slot<T> {
    fn new(sender: &mpsc::Sender<T>) -> Self {
        Self { sender: sender.downgrade(), max: sender.max_capacity() }
    }

    fn depth(&self) -> usize {
        self.sender.upgrade().map(|sender| self.max - sender.capacity()).unwrap_or(0)
    }
}

/// Weak handle onto the producer side for depth reporting.
///
/// Reports zero for queues whose producer has gone away.
#[derive(Debug, Clone)]
pub struct QueueProbe {
    drivers: Slot<Drivers>,
    timing: Slot<Timing>,
    event: Slot<Event>,
    event_time: Slot<EventTime>,
    race_control: Slot<RaceControlMessage>,
    weather: Slot<Weather>,
    radio: Slot<Radio>,
    telemetry: Slot<Telemetry>,
    location: Slot<Location>,
}

impl QueueProbe {
    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            drivers: self.drivers.depth(),
            timing: self.timing.depth(),
            event: self.event.depth(),
            event_time: self.event_time.depth(),
            race_control: self.race_control.depth(),
            weather: self.weather.depth(),
            radio: self.radio.depth(),
            telemetry: self.telemetry.depth(),
            location: self.location.depth(),
        }
    }
}
