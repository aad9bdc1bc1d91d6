use std::time::Duration;

use pretty_assertions::assert_eq;
use tracker_core::{StreamEventKind, StreamSignal};
use tracker_engine::{JobEventStream, StreamError, StreamSettings, WireEvent};

mod common;

use common::{Connection, RecordingSink, ScriptedSource};

fn kinds(signals: &[StreamSignal]) -> Vec<String> {
    signals
        .iter()
        .map(|signal| match signal {
            StreamSignal::Connected => "connected".to_string(),
            StreamSignal::Event(event) => format!("event:{:?}", event.kind),
            StreamSignal::Disconnected { attempt, .. } => format!("disconnected:{attempt}"),
            StreamSignal::Exhausted => "exhausted".to_string(),
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn stops_reading_after_the_terminal_event() {
    common::init_logging();
    let source = ScriptedSource::new(vec![Connection::Hangs(vec![
        Ok(WireEvent::new("job_started")),
        Ok(WireEvent::new("progress").with("progress_percent", 40)),
        Ok(WireEvent::new("job_completed")),
        Ok(WireEvent::new("progress").with("progress_percent", 10)),
    ])]);
    let stream = JobEventStream::new(source.clone(), StreamSettings::default());
    let sink = RecordingSink::new();

    let subscription = stream.connect("job-1".into(), sink.clone());
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(
        kinds(&sink.signals()),
        vec![
            "connected",
            "event:JobStarted",
            "event:Progress",
            "event:JobCompleted",
        ]
    );
    assert_eq!(source.opens(), 1);
    assert!(subscription.is_finished());
}

#[tokio::test(start_paused = true)]
async fn malformed_events_are_skipped() {
    common::init_logging();
    let source = ScriptedSource::new(vec![Connection::Hangs(vec![
        Err(StreamError::Decode("garbage".into())),
        Ok(WireEvent::new("job_failed").with("error", "Menu URL 404")),
    ])]);
    let stream = JobEventStream::new(source.clone(), StreamSettings::default());
    let sink = RecordingSink::new();

    let _subscription = stream.connect("job-1".into(), sink.clone());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let signals = sink.signals();
    assert_eq!(kinds(&signals), vec!["connected", "event:JobFailed"]);
    match &signals[1] {
        StreamSignal::Event(event) => {
            assert_eq!(event.kind, StreamEventKind::JobFailed);
            assert_eq!(event.error_message.as_deref(), Some("Menu URL 404"));
        }
        other => panic!("unexpected signal {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_the_reconnect_budget() {
    common::init_logging();
    let source = ScriptedSource::refusing();
    let stream = JobEventStream::new(source.clone(), StreamSettings::default());
    let sink = RecordingSink::new();
    let started = tokio::time::Instant::now();

    let subscription = stream.connect("job-1".into(), sink.clone());
    subscription.join().await;

    assert_eq!(
        kinds(&sink.signals()),
        vec!["disconnected:1", "disconnected:2", "disconnected:3", "exhausted"]
    );
    assert_eq!(source.opens(), 4);
    // 500ms + 1s + 2s of backoff.
    assert_eq!(started.elapsed(), Duration::from_millis(3500));
}

#[tokio::test(start_paused = true)]
async fn a_productive_connection_earns_a_fresh_budget() {
    common::init_logging();
    let source = ScriptedSource::new(vec![
        Connection::Closes(vec![Ok(WireEvent::new("job_started"))]),
        Connection::Closes(vec![]),
        Connection::Closes(vec![Ok(WireEvent::new("progress").with("progress_percent", 30))]),
    ]);
    let stream = JobEventStream::new(source.clone(), StreamSettings::default());
    let sink = RecordingSink::new();

    stream.connect("job-1".into(), sink.clone()).join().await;

    assert_eq!(
        kinds(&sink.signals()),
        vec![
            "connected",
            "event:JobStarted",
            "disconnected:1",
            "connected",
            "disconnected:2",
            "connected",
            "event:Progress",
            "disconnected:1",
            "disconnected:2",
            "disconnected:3",
            "exhausted",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn read_errors_count_as_disconnects() {
    let source = ScriptedSource::new(vec![Connection::Hangs(vec![
        Ok(WireEvent::new("job_started")),
        Err(StreamError::Read("connection reset".into())),
    ])]);
    let stream = JobEventStream::new(
        source.clone(),
        StreamSettings {
            max_reconnect_attempts: 1,
            ..StreamSettings::default()
        },
    );
    let sink = RecordingSink::new();

    stream.connect("job-1".into(), sink.clone()).join().await;

    let signals = sink.signals();
    match &signals[2] {
        StreamSignal::Disconnected { attempt, reason } => {
            assert_eq!(*attempt, 1);
            assert!(reason.contains("connection reset"), "{reason}");
        }
        other => panic!("unexpected signal {other:?}"),
    }
    assert_eq!(signals.last(), Some(&StreamSignal::Exhausted));
}

#[tokio::test(start_paused = true)]
async fn cancelling_silences_the_stream() {
    let source = ScriptedSource::refusing();
    let stream = JobEventStream::new(source.clone(), StreamSettings::default());
    let sink = RecordingSink::new();

    let subscription = stream.connect("job-1".into(), sink.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;
    subscription.cancel();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(kinds(&sink.signals()), vec!["disconnected:1"]);
    assert_eq!(source.opens(), 1);
}
