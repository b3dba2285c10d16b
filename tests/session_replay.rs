//! End-to-end session tests: source → parser → scheduler → queues

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone, Utc};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use futures::StreamExt;
use paddock::types::{DataSource, FlowMode, RawFragment, SessionType};
use paddock::{ChannelSource, RaceEvent, SessionConfig, SourceKind, ThrottleExt, TimingError, TimingSession};
use serde_json::{Value, json};
use std::io::Write;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 5, 15, 0, 0).unwrap()
}

fn at(millis: i64) -> DateTime<Utc> {
    base() + chrono::Duration::milliseconds(millis)
}

fn fragment(name: &str, payload: Value, millis: i64) -> RawFragment {
    let stamp = at(millis).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    RawFragment::from_wire(name, serde_json::to_vec(&payload).unwrap(), stamp)
}

fn compressed(name: &str, payload: Value, millis: i64) -> RawFragment {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&serde_json::to_vec(&payload).unwrap()).unwrap();
    let encoded = STANDARD.encode(encoder.finish().unwrap());
    let stamp = at(millis).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    RawFragment::from_wire(name, encoded.into_bytes(), stamp)
}

fn weather(millis: i64, air_temp: f64) -> RawFragment {
    fragment("WeatherData", json!({"AirTemp": air_temp.to_string(), "Rainfall": "0"}), millis)
}

fn roster(millis: i64) -> RawFragment {
    fragment(
        "DriverList",
        json!({
            "1": {"RacingNumber": "1", "Line": 1, "FullName": "Max VERSTAPPEN", "Tla": "VER",
                  "TeamName": "Red Bull Racing", "TeamColour": "3671C6"},
            "44": {"RacingNumber": "44", "Line": 2, "FullName": "Lewis HAMILTON", "Tla": "HAM",
                   "TeamName": "Mercedes", "TeamColour": "6CD3BF"},
        }),
        millis,
    )
}

fn bahrain(session_type: SessionType) -> RaceEvent {
    RaceEvent {
        name: "Bahrain Grand Prix".to_string(),
        country: "Bahrain".to_string(),
        race_time: at(0),
        event_time: at(0),
        session_type,
        timezone: "Asia/Bahrain".to_string(),
        track: "Sakhir".to_string(),
        track_year: 2004,
        time_lost_in_pitlane: Duration::from_secs(23),
        url_name: "Bahrain".to_string(),
    }
}

fn write_archive(path: &std::path::Path, fragments: &[RawFragment]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    for fragment in fragments {
        file.write_all(fragment.category.wire_name().as_bytes())?;
        file.write_all(b"\n")?;
        file.write_all(&fragment.payload)?;
        file.write_all(b"\n")?;
        writeln!(file, "{}", fragment.timestamp)?;
    }
    Ok(())
}

#[tokio::test]
async fn debug_replay_delivers_every_category() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bahrain-race.txt");
    write_archive(
        &path,
        &[
            fragment("SessionInfo", json!({"Meeting": {"Name": "Bahrain Grand Prix"}, "Type": "Race", "Name": "Race"}), 0),
            roster(0),
            fragment("LapCount", json!({"CurrentLap": 1, "TotalLaps": 57}), 500),
            weather(600, 27.5),
            fragment("TimingData", json!({"Lines": {"44": {"Position": "3"}}}), 700),
            fragment("SomethingNew", json!({"Ignored": true}), 800),
        ],
    )?;

    let config = SessionConfig::default().with_flow(FlowMode::StraightThrough);
    let mut session = TimingSession::debug_replay(&path, config).await?;
    assert_eq!(session.kind(), SourceKind::DebugReplay);
    assert_eq!(session.metadata().name, "bahrain-race");
    let mut queues = session.take_queues().expect("queues available");
    assert!(session.take_queues().is_none());

    let drivers = queues.drivers.recv().await.expect("roster delivered");
    assert_eq!(drivers.drivers.len(), 2);

    let weather = queues.weather.recv().await.expect("weather delivered");
    assert_eq!(weather.air_temp, 27.5);
    assert_eq!(weather.timestamp, at(600));

    let mut timing = Vec::new();
    while let Some(line) = queues.timing.recv().await {
        timing.push(line);
    }
    assert!(timing.iter().any(|line| line.number == 44 && line.position == 3));

    let mut laps = Vec::new();
    while let Some(event) = queues.event.recv().await {
        laps.push(event.current_lap);
    }
    assert_eq!(laps.last(), Some(&1));

    let report = session.close().await.expect("first close reports");
    assert_eq!(report.fragments_read, 6);
    assert!(session.close().await.is_none());
    Ok(())
}

#[tokio::test]
async fn truncated_capture_ends_the_feed_promptly() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("cut-short.txt");
    write_archive(&path, &[weather(0, 20.0), weather(100, 21.0)])?;
    let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
    file.write_all(b"WeatherData\n{\"AirTemp\":\"22\"}\n")?;
    drop(file);

    let started = std::time::Instant::now();
    let config = SessionConfig::default().with_flow(FlowMode::StraightThrough);
    let mut session = TimingSession::debug_replay(&path, config).await?;
    let mut queues = session.take_queues().expect("queues available");

    let mut temps = Vec::new();
    while let Some(weather) = queues.weather.recv().await {
        temps.push(weather.air_temp);
    }
    assert_eq!(temps, vec![20.0, 21.0]);
    assert!(started.elapsed() < Duration::from_secs(2), "feed ended after {:?}", started.elapsed());

    let report = session.close().await.expect("report");
    assert_eq!(report.fragments_read, 2);
    Ok(())
}

#[tokio::test]
async fn missing_capture_fails_to_start() {
    let dir = tempfile::tempdir().unwrap();
    let result = TimingSession::debug_replay(dir.path().join("nope.txt"), SessionConfig::default()).await;
    assert!(matches!(result, Err(TimingError::File { .. })));
}

#[tokio::test(start_paused = true)]
async fn skip_to_session_start_releases_up_to_start() -> Result<()> {
    let (feed, source) = ChannelSource::channel(32);
    let config = SessionConfig::default().paused();
    let mut session = TimingSession::replay(source, &bahrain(SessionType::Race), config).await?;
    let mut queues = session.take_queues().expect("queues available");
    let mut starts = session.session_start_updates();

    for fragment in [
        weather(0, 20.0),
        weather(5_000, 21.0),
        fragment("SessionStatus", json!({"Status": "Started"}), 10_000),
        weather(10_000, 22.0),
        weather(15_000, 23.0),
    ] {
        feed.send(fragment).await?;
    }

    assert_eq!(starts.next().await, Some(at(10_000)));
    assert_eq!(session.session_start(), Some(at(10_000)));
    assert_eq!(session.skip_to_session_start(), Some(at(10_000)));

    for expected in [0, 5_000, 10_000] {
        assert_eq!(queues.weather.recv().await.map(|w| w.timestamp), Some(at(expected)));
    }
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(queues.weather.try_recv().is_err(), "nothing after the start is released while paused");
    assert!(session.is_paused());
    assert_eq!(session.virtual_time(), Some(at(10_000)));

    session.resume();
    assert_eq!(queues.weather.recv().await.map(|w| w.timestamp), Some(at(15_000)));

    session.close().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn pause_holds_releases_until_resumed() -> Result<()> {
    let (feed, source) = ChannelSource::channel(32);
    let mut session = TimingSession::replay(source, &bahrain(SessionType::Practice1), SessionConfig::default()).await?;
    let mut queues = session.take_queues().expect("queues available");

    feed.send(weather(0, 20.0)).await?;
    assert!(queues.weather.recv().await.is_some());

    assert!(session.toggle_pause());
    feed.send(weather(1_000, 21.0)).await?;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(queues.weather.try_recv().is_err());

    assert!(!session.toggle_pause());
    assert_eq!(queues.weather.recv().await.map(|w| w.air_temp), Some(21.0));

    // Lap skips make no sense in practice and are dropped before the scheduler
    session.increment_lap();
    session.close().await;
    Ok(())
}

#[tokio::test]
async fn telemetry_filter_limits_cars() -> Result<()> {
    let (feed, source) = ChannelSource::channel(32);
    let config = SessionConfig::default()
        .with_flow(FlowMode::StraightThrough)
        .with_data_sources(DataSource::TELEMETRY | DataSource::DRIVERS);
    let mut session = TimingSession::replay(source, &bahrain(SessionType::Race), config).await?;
    let mut queues = session.take_queues().expect("queues available");
    session.select_telemetry_sources(&[44]);

    let stamp = at(1_000).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    feed.send(roster(0)).await?;
    feed.send(compressed(
        "CarData.z",
        json!({"Entries": [{"Utc": stamp, "Cars": {
            "1": {"Channels": {"0": 11000, "2": 290, "3": 8, "4": 100, "5": 0, "45": 12}},
            "44": {"Channels": {"0": 10800, "2": 288, "3": 8, "4": 99, "5": 0, "45": 8}},
        }}]}),
        1_000,
    ))
    .await?;
    drop(feed);

    let mut cars = Vec::new();
    while let Some(sample) = queues.telemetry.recv().await {
        cars.push(sample.driver_number);
    }
    assert_eq!(cars, vec![44]);
    assert!(queues.weather.recv().await.is_none(), "unrequested queues just close");

    session.clear_telemetry_filter();
    session.close().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn throttled_telemetry_keeps_each_cars_latest_sample() -> Result<()> {
    let (feed, source) = ChannelSource::channel(32);
    let config = SessionConfig::default()
        .with_flow(FlowMode::StraightThrough)
        .with_data_sources(DataSource::TELEMETRY | DataSource::DRIVERS);
    let mut session = TimingSession::replay(source, &bahrain(SessionType::Race), config).await?;
    let queues = session.take_queues().expect("queues available");

    let entries: Vec<Value> = (0..3)
        .map(|i| {
            let stamp = at(1_000 + i * 100).format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
            json!({"Utc": stamp, "Cars": {
                "1": {"Channels": {"0": 11_000 + i, "2": 290, "3": 8}},
                "44": {"Channels": {"0": 10_000 + i, "2": 288, "3": 8}},
            }})
        })
        .collect();
    feed.send(roster(0)).await?;
    feed.send(compressed("CarData.z", json!({ "Entries": entries }), 1_000)).await?;
    drop(feed);

    let samples: Vec<_> = ReceiverStream::new(queues.telemetry)
        .throttle_by(Duration::from_secs(1), |sample| sample.driver_number)
        .collect()
        .await;

    assert!(!samples.is_empty() && samples.len() <= 6);
    for (car, rpm) in [(1, 11_002), (44, 10_002)] {
        let latest = samples.iter().rev().find(|sample| sample.driver_number == car).expect("car present");
        assert_eq!(latest.rpm, rpm);
    }

    session.close().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn full_queue_backpressures_without_loss() -> Result<()> {
    let (feed, source) = ChannelSource::channel(32);
    let mut config = SessionConfig::default().with_flow(FlowMode::StraightThrough);
    config.queues.weather = 2;
    let mut session = TimingSession::replay(source, &bahrain(SessionType::Race), config).await?;
    let mut queues = session.take_queues().expect("queues available");

    for (i, millis) in (0..5).map(|i| (i, i * 100)) {
        feed.send(weather(millis, 20.0 + f64::from(i as i32))).await?;
    }
    drop(feed);

    while session.queue_depths().weather < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(session.queue_depths().total(), 2);

    let mut temps = Vec::new();
    while let Some(weather) = queues.weather.recv().await {
        temps.push(weather.air_temp);
    }
    assert_eq!(temps, vec![20.0, 21.0, 22.0, 23.0, 24.0]);

    let report = session.close().await.expect("report");
    assert_eq!(report.scheduler.released, 5);
    Ok(())
}

#[tokio::test]
async fn archived_live_capture_replays_identically() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let archive = dir.path().join("captures").join("live.txt");

    let (feed, transport) = ChannelSource::channel(32);
    let mut live = TimingSession::archived_live(transport, &bahrain(SessionType::Race), &archive, SessionConfig::default()).await?;
    assert_eq!(live.kind(), SourceKind::ArchivedLive);
    assert_eq!(live.metadata().track, "Sakhir");
    let mut live_queues = live.take_queues().expect("queues available");

    for (millis, temp) in [(0, 25.0), (50, 25.5), (100, 26.0)] {
        feed.send(weather(millis, temp)).await?;
    }
    drop(feed);

    let mut live_temps = Vec::new();
    while let Some(weather) = live_queues.weather.recv().await {
        live_temps.push(weather.air_temp);
    }
    live.close().await;

    let config = SessionConfig::default().with_flow(FlowMode::StraightThrough);
    let mut replay = TimingSession::debug_replay(&archive, config).await?;
    let mut replay_queues = replay.take_queues().expect("queues available");
    let mut replay_temps = Vec::new();
    while let Some(weather) = replay_queues.weather.recv().await {
        replay_temps.push(weather.air_temp);
    }
    replay.close().await;

    assert_eq!(live_temps, vec![25.0, 25.5, 26.0]);
    assert_eq!(replay_temps, live_temps);
    Ok(())
}

#[tokio::test]
async fn close_ends_every_queue() -> Result<()> {
    let (feed, source) = ChannelSource::channel(4);
    let mut session = TimingSession::live(source, &bahrain(SessionType::Race), SessionConfig::default()).await?;
    let mut queues = session.take_queues().expect("queues available");
    assert!(!session.is_finished());

    session.close().await.expect("report");
    assert!(session.is_finished());
    assert!(queues.timing.recv().await.is_none());
    assert!(queues.telemetry.recv().await.is_none());
    assert!(feed.is_closed(), "reader dropped the transport");
    Ok(())
}
