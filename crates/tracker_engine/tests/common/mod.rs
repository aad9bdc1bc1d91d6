#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use futures_util::StreamExt;
use tracker_core::{
    JobDescriptor, Milestone, MilestoneTable, PollEvent, StatusUpdate, StreamSignal,
    TrackerView, Transport,
};
use tracker_engine::{
    EventSource, EventStream, FailureKind, FetchError, PollSink, StatusFetcher, StreamError,
    StreamSink, WireEvent,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tracker_logging::initialize_for_tests);
}

pub fn network_error() -> FetchError {
    FetchError {
        kind: FailureKind::Network,
        message: "connection refused".to_string(),
    }
}

pub fn running(percent: u8) -> Result<StatusUpdate, FetchError> {
    Ok(StatusUpdate::new("running").with_percent(percent))
}

pub fn completed() -> Result<StatusUpdate, FetchError> {
    Ok(StatusUpdate::new("completed").with_percent(100))
}

pub fn descriptor(transport: Transport) -> JobDescriptor {
    let milestones = MilestoneTable::new(
        [0, 25, 50, 75, 100]
            .into_iter()
            .map(|t| Milestone::new(t, format!("milestone {t}")))
            .collect(),
    )
    .expect("valid table");
    JobDescriptor::new("job-1", milestones)
        .with_transport(transport)
        .with_poll_interval(Duration::from_millis(500))
}

/// Answers polls from a script; once the script runs dry the last answer
/// repeats.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<StatusUpdate, FetchError>>>,
    last: Mutex<Option<Result<StatusUpdate, FetchError>>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Result<StatusUpdate, FetchError>>) -> Arc<Self> {
        Self::delayed(script, Duration::ZERO)
    }

    pub fn delayed(script: Vec<Result<StatusUpdate, FetchError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    /// Replaces whatever comes next.
    pub fn set_next(&self, response: Result<StatusUpdate, FetchError>) {
        self.script.lock().unwrap().clear();
        *self.last.lock().unwrap() = Some(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch_status(&self, _job_id: &str) -> Result<StatusUpdate, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last.clone().unwrap_or_else(|| Err(network_error())),
        }
    }
}

pub enum Connection {
    /// Delivers the items, then the server closes the body.
    Closes(Vec<Result<WireEvent, StreamError>>),
    /// Delivers the items, then stays open.
    Hangs(Vec<Result<WireEvent, StreamError>>),
}

/// One scripted connection per `open`; refuses once the script runs dry.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Connection>>,
    opens: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Connection>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            opens: AtomicUsize::new(0),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EventSource for ScriptedSource {
    async fn open(&self, _job_id: &str) -> Result<EventStream, StreamError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Connection::Closes(items)) => Ok(Box::pin(futures_util::stream::iter(items))),
            Some(Connection::Hangs(items)) => Ok(Box::pin(
                futures_util::stream::iter(items).chain(futures_util::stream::pending()),
            )),
            None => Err(StreamError::Connect("connection refused".to_string())),
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    polls: Mutex<Vec<PollEvent>>,
    signals: Mutex<Vec<StreamSignal>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn polls(&self) -> Vec<PollEvent> {
        self.polls.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<StreamSignal> {
        self.signals.lock().unwrap().clone()
    }
}

impl PollSink for RecordingSink {
    fn emit(&self, event: PollEvent) {
        self.polls.lock().unwrap().push(event);
    }
}

impl StreamSink for RecordingSink {
    fn emit(&self, signal: StreamSignal) {
        self.signals.lock().unwrap().push(signal);
    }
}

/// Collects every published view with the (mock) time it arrived.
#[derive(Clone, Default)]
pub struct ViewLog {
    views: Arc<Mutex<Vec<(tokio::time::Instant, TrackerView)>>>,
}

impl ViewLog {
    pub fn callback(&self) -> impl FnMut(&TrackerView) + Send + 'static {
        let views = self.views.clone();
        move |view: &TrackerView| {
            views
                .lock()
                .unwrap()
                .push((tokio::time::Instant::now(), view.clone()));
        }
    }

    pub fn views(&self) -> Vec<TrackerView> {
        self.views
            .lock()
            .unwrap()
            .iter()
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn timed(&self) -> Vec<(tokio::time::Instant, TrackerView)> {
        self.views.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.views.lock().unwrap().len()
    }
}

/// Counts hand-offs and remembers when they happened.
#[derive(Clone, Default)]
pub struct FinishLog {
    calls: Arc<Mutex<Vec<(tokio::time::Instant, String)>>>,
}

impl FinishLog {
    pub fn callback(&self) -> impl FnMut(&str) + Send + 'static {
        let calls = self.calls.clone();
        move |job_id: &str| {
            calls
                .lock()
                .unwrap()
                .push((tokio::time::Instant::now(), job_id.to_string()));
        }
    }

    pub fn calls(&self) -> Vec<(tokio::time::Instant, String)> {
        self.calls.lock().unwrap().clone()
    }
}
