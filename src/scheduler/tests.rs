use super::*;
use crate::queues::{self, MessageQueues, QueueCapacities, QueueProbe};
use crate::test_utils::at;
use crate::types::{Event, EventType, Weather};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const TOLERANCE: Duration = Duration::from_millis(50);

struct Harness {
    input: mpsc::Sender<Message>,
    queues: MessageQueues,
    handle: PlaybackHandle,
    cancel: CancellationToken,
    probe: QueueProbe,
    task: JoinHandle<SchedulerReport>,
}

fn spawn_with(flow: FlowMode, speed: f64, paused: bool, capacities: QueueCapacities) -> Harness {
    let (input, messages) = mpsc::channel(64);
    let (output, queues) = queues::channel(&capacities).unwrap();
    let probe = output.probe();
    let handle = PlaybackHandle::new(speed, paused);
    let cancel = CancellationToken::new();
    let config = SchedulerConfig { flow, buffer_capacity: 64, stall_warning: Duration::from_secs(1) };

    let scheduler = Scheduler::new(config, messages, output, handle.clone(), cancel.clone());
    let task = tokio::spawn(scheduler.run());
    Harness { input, queues, handle, cancel, probe, task }
}

fn spawn(flow: FlowMode, paused: bool) -> Harness {
    spawn_with(flow, 1.0, paused, QueueCapacities::default())
}

fn weather(millis: i64) -> Message {
    Message::Weather(Weather { timestamp: at(millis), ..Weather::default() })
}

fn lap(millis: i64, lap: u32, event_type: EventType) -> Message {
    Message::Event(Event { timestamp: at(millis), event_type: Some(event_type), current_lap: lap, ..Event::default() })
}

fn assert_near(actual: Duration, expected: Duration) {
    let diff = if actual > expected { actual - expected } else { expected - actual };
    assert!(diff <= TOLERANCE, "expected ~{expected:?}, got {actual:?}");
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn realtime_releases_reproduce_timestamp_gaps() {
    let mut h = spawn(FlowMode::Realtime, false);
    h.input.send(weather(0)).await.unwrap();
    h.input.send(weather(1_000)).await.unwrap();

    h.queues.weather.recv().await.unwrap();
    let first = Instant::now();
    h.queues.weather.recv().await.unwrap();

    assert_near(first.elapsed(), Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn realtime_gaps_scale_with_speed() {
    let mut h = spawn_with(FlowMode::Realtime, 2.0, false, QueueCapacities::default());
    h.input.send(weather(0)).await.unwrap();
    h.input.send(weather(1_000)).await.unwrap();

    h.queues.weather.recv().await.unwrap();
    let first = Instant::now();
    h.queues.weather.recv().await.unwrap();

    assert_near(first.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn straight_through_forwards_without_delay() {
    let mut h = spawn(FlowMode::StraightThrough, false);
    let start = Instant::now();
    h.input.send(weather(0)).await.unwrap();
    h.input.send(weather(3_600_000)).await.unwrap();

    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(0));
    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(3_600_000));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_emission_not_ingestion() {
    let mut h = spawn(FlowMode::Realtime, false);
    h.input.send(weather(0)).await.unwrap();
    h.queues.weather.recv().await.unwrap();

    h.handle.pause();
    for millis in [1_000, 2_000, 3_000] {
        tokio::time::timeout(Duration::from_secs(1), h.input.send(weather(millis)))
            .await
            .expect("input accepted while paused")
            .unwrap();
    }
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.queues.weather.try_recv().is_err(), "nothing released while paused");

    h.handle.resume();
    let resumed = Instant::now();
    for millis in [1_000, 2_000, 3_000] {
        assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(millis));
    }
    assert_near(resumed.elapsed(), Duration::from_millis(3_000));
}

#[tokio::test(start_paused = true)]
async fn skip_to_start_releases_exactly_up_to_target() {
    let mut h = spawn(FlowMode::Realtime, true);
    for second in 0..=10 {
        h.input.send(weather(second * 1_000)).await.unwrap();
    }

    h.handle.jump_to(at(5_000));
    settle().await;

    let mut released = Vec::new();
    while let Ok(weather) = h.queues.weather.try_recv() {
        released.push(weather.timestamp);
    }
    assert_eq!(released, (0..=5).map(|s| at(s * 1_000)).collect::<Vec<_>>());

    // Still paused after the burst
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(h.queues.weather.try_recv().is_err());
    assert_eq!(h.handle.virtual_time(), Some(at(5_000)));
    assert!(h.handle.is_paused());
}

#[tokio::test(start_paused = true)]
async fn skip_to_start_covers_late_arrivals() {
    let mut h = spawn(FlowMode::Realtime, true);
    h.handle.jump_to(at(2_000));
    settle().await;

    for millis in [0, 1_000, 2_000, 2_001] {
        h.input.send(weather(millis)).await.unwrap();
    }
    settle().await;

    let mut released = Vec::new();
    while let Ok(weather) = h.queues.weather.try_recv() {
        released.push(weather.timestamp);
    }
    assert_eq!(released, vec![at(0), at(1_000), at(2_000)]);
}

#[tokio::test(start_paused = true)]
async fn skip_releases_earlier_messages_behind_a_later_one() {
    let mut h = spawn(FlowMode::Realtime, true);
    for message in [weather(0), weather(6_000), lap(3_000, 1, EventType::Race)] {
        h.input.send(message).await.unwrap();
    }
    settle().await;

    h.handle.jump_to(at(5_000));
    settle().await;

    assert_eq!(h.queues.weather.try_recv().unwrap().timestamp, at(0));
    assert_eq!(h.queues.event.try_recv().unwrap().timestamp, at(3_000));
    assert!(h.queues.weather.try_recv().is_err(), "6s weather stays buffered");

    h.handle.resume();
    let resumed = Instant::now();
    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(6_000));
    assert_near(resumed.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn increment_time_before_any_data_is_ignored() {
    let mut h = spawn(FlowMode::Realtime, true);
    h.handle.increment_time(Duration::from_secs(10));
    settle().await;
    assert_eq!(h.handle.virtual_time(), None);

    for millis in [0, 1_000] {
        h.input.send(weather(millis)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(h.queues.weather.try_recv().is_err(), "earlier skip does not release later data");
}

#[tokio::test(start_paused = true)]
async fn increment_time_anchors_an_unstarted_clock_at_the_first_message() {
    let mut h = spawn(FlowMode::Realtime, true);
    for millis in [0, 1_000, 2_000] {
        h.input.send(weather(millis)).await.unwrap();
    }
    settle().await;

    h.handle.increment_time(Duration::from_millis(1_500));
    settle().await;

    assert_eq!(h.queues.weather.try_recv().unwrap().timestamp, at(0));
    assert_eq!(h.queues.weather.try_recv().unwrap().timestamp, at(1_000));
    assert!(h.queues.weather.try_recv().is_err());
    assert_eq!(h.handle.virtual_time(), Some(at(1_500)));
}

#[tokio::test(start_paused = true)]
async fn increment_time_while_straight_through_and_paused() {
    let mut h = spawn(FlowMode::StraightThrough, true);
    for millis in [0, 1_000, 5_000] {
        h.input.send(weather(millis)).await.unwrap();
    }
    settle().await;

    h.handle.increment_time(Duration::from_secs(2));
    settle().await;
    assert_eq!(h.queues.weather.try_recv().unwrap().timestamp, at(0));
    assert_eq!(h.queues.weather.try_recv().unwrap().timestamp, at(1_000));
    assert!(h.queues.weather.try_recv().is_err());

    let start = Instant::now();
    h.handle.resume();
    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(5_000));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn increment_time_releases_a_catch_up_burst() {
    let mut h = spawn(FlowMode::Realtime, false);
    for millis in [0, 1_000, 2_000, 30_000] {
        h.input.send(weather(millis)).await.unwrap();
    }
    h.queues.weather.recv().await.unwrap();
    let start = Instant::now();

    h.handle.increment_time(Duration::from_secs(10));
    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(1_000));
    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(2_000));
    assert_eq!(start.elapsed(), Duration::ZERO);

    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(30_000));
    assert_near(start.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn increment_lap_skips_to_next_lap_transition() {
    let mut h = spawn(FlowMode::Realtime, false);
    for message in [
        lap(0, 1, EventType::Race),
        weather(500),
        weather(1_500),
        lap(90_000, 2, EventType::Race),
        weather(90_500),
    ] {
        h.input.send(message).await.unwrap();
    }
    assert_eq!(h.queues.event.recv().await.unwrap().current_lap, 1);
    let start = Instant::now();

    h.handle.increment_lap();
    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(500));
    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(1_500));
    assert_eq!(h.queues.event.recv().await.unwrap().current_lap, 2);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(h.handle.virtual_time(), Some(at(90_000)));

    assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(90_500));
    assert_near(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn increment_lap_is_ignored_outside_races() {
    let mut h = spawn(FlowMode::Realtime, false);
    h.input.send(lap(0, 0, EventType::Practice2)).await.unwrap();
    h.input.send(weather(5_000)).await.unwrap();
    h.queues.event.recv().await.unwrap();
    let start = Instant::now();

    h.handle.increment_lap();
    h.queues.weather.recv().await.unwrap();
    assert_near(start.elapsed(), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn full_queue_blocks_without_dropping() {
    let capacities = QueueCapacities { weather: 1, ..QueueCapacities::default() };
    let mut h = spawn_with(FlowMode::StraightThrough, 1.0, false, capacities);
    for millis in [0, 1, 2] {
        h.input.send(weather(millis)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.probe.depths().weather, 1);

    for millis in [0, 1, 2] {
        assert_eq!(h.queues.weather.recv().await.unwrap().timestamp, at(millis));
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_interrupts_a_blocked_send() {
    let capacities = QueueCapacities { weather: 1, ..QueueCapacities::default() };
    let mut h = spawn_with(FlowMode::StraightThrough, 1.0, false, capacities);
    h.input.send(weather(0)).await.unwrap();
    h.input.send(weather(1)).await.unwrap();
    settle().await;

    h.cancel.cancel();
    let report = h.task.await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.released, 1);

    assert!(h.queues.weather.recv().await.is_some());
    assert!(h.queues.weather.recv().await.is_none(), "queues close with the scheduler");
}

#[tokio::test(start_paused = true)]
async fn closes_queues_after_draining_input() {
    let mut h = spawn(FlowMode::Realtime, false);
    for millis in [0, 250, 500] {
        h.input.send(weather(millis)).await.unwrap();
    }
    drop(h.input);

    let mut count = 0;
    while h.queues.weather.recv().await.is_some() {
        count += 1;
    }
    assert_eq!(count, 3);
    assert!(h.queues.timing.recv().await.is_none());

    let report = h.task.await.unwrap();
    assert_eq!(report, SchedulerReport { released: 3, discarded: 0, cancelled: false });
}

#[tokio::test(start_paused = true)]
async fn dropped_consumer_queue_does_not_stall_others() {
    let mut h = spawn(FlowMode::StraightThrough, false);
    // Swap in a dead receiver so the real weather queue loses its consumer
    let (_, closed) = mpsc::channel::<Weather>(1);
    drop(std::mem::replace(&mut h.queues.weather, closed));

    h.input.send(weather(0)).await.unwrap();
    h.input.send(lap(1, 1, EventType::Race)).await.unwrap();
    assert_eq!(h.queues.event.recv().await.unwrap().current_lap, 1);

    drop(h.input);
    let report = h.task.await.unwrap();
    assert_eq!(report.discarded, 1);
    assert_eq!(report.released, 1);
}
