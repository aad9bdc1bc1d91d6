use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracker_core::{update, JobDescriptor, Msg, TrackerConfig, TrackerState, TrackerView};
use tracker_logging::tracker_debug;

use crate::effects::EffectRunner;
use crate::{
    EventSource, FetchError, FetchSettings, JobEventStream, JobStatusPoller, PollSettings,
    ReqwestStatusFetcher, SseEventSource, StatusFetcher, StreamError, StreamSettings,
};

/// Everything a tracker talks to. Passed in explicitly so that two trackers
/// never share hidden state.
#[derive(Clone)]
pub struct TrackerDeps {
    pub fetcher: Arc<dyn StatusFetcher>,
    pub events: Arc<dyn EventSource>,
    pub config: TrackerConfig,
    pub poll: PollSettings,
    pub stream: StreamSettings,
}

impl TrackerDeps {
    pub fn new(fetcher: Arc<dyn StatusFetcher>, events: Arc<dyn EventSource>) -> Self {
        Self {
            fetcher,
            events,
            config: TrackerConfig::default(),
            poll: PollSettings::default(),
            stream: StreamSettings::default(),
        }
    }

    /// HTTP status polling plus SSE against one job service.
    pub fn http(settings: FetchSettings) -> Result<Self, HttpSetupError> {
        let fetcher = ReqwestStatusFetcher::new(settings.clone())?;
        let events = SseEventSource::new(settings)?;
        Ok(Self::new(Arc::new(fetcher), Arc::new(events)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpSetupError {
    #[error("status client: {0}")]
    Status(#[from] FetchError),
    #[error("event stream client: {0}")]
    Stream(#[from] StreamError),
}

type ViewCallback = Arc<Mutex<dyn FnMut(&TrackerView) + Send>>;
type FinishedCallback = Arc<Mutex<dyn FnMut(&str) + Send>>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, ViewCallback)>,
}

/// Shared between the handle and the driver task.
///
/// Callbacks run with no registry lock held, so they may subscribe or
/// unsubscribe (themselves included) while being called.
#[derive(Default)]
struct Hooks {
    latest: Mutex<TrackerView>,
    subscribers: Mutex<Subscribers>,
    finished: Mutex<Vec<FinishedCallback>>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Hooks {
    fn publish(&self, view: TrackerView) {
        *lock(&self.latest) = view.clone();
        let callbacks: Vec<ViewCallback> = lock(&self.subscribers)
            .entries
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            (*lock(&*callback))(&view);
        }
    }

    fn notify_finished(&self, job_id: &str) {
        let callbacks: Vec<FinishedCallback> = lock(&self.finished).clone();
        for callback in callbacks {
            (*lock(&*callback))(job_id);
        }
    }

    fn unsubscribe(&self, id: u64) {
        lock(&self.subscribers)
            .entries
            .retain(|(entry, _)| *entry != id);
    }
}

/// Stops view delivery when dropped or when [`ViewSubscription::unsubscribe`]
/// is called.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct ViewSubscription {
    id: u64,
    hooks: Weak<Hooks>,
}

impl ViewSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for ViewSubscription {
    fn drop(&mut self) {
        if let Some(hooks) = self.hooks.upgrade() {
            hooks.unsubscribe(self.id);
        }
    }
}

/// Follows one remote job at a time and publishes a [`TrackerView`] after
/// every accepted change.
///
/// Control methods return immediately; the work happens on a driver task that
/// applies messages one by one, in arrival order. Must be created inside a
/// tokio runtime. Dropping the tracker stops every task it started.
pub struct JobTracker {
    msg_tx: UnboundedSender<Msg>,
    hooks: Arc<Hooks>,
    shutdown: CancellationToken,
}

impl JobTracker {
    pub fn new(deps: TrackerDeps) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let hooks = Arc::new(Hooks::default());
        let shutdown = CancellationToken::new();

        let runner = EffectRunner::new(
            JobStatusPoller::new(deps.fetcher, deps.poll),
            JobEventStream::new(deps.events, deps.stream),
            msg_tx.clone(),
        );
        tokio::spawn(drive(
            TrackerState::new(deps.config),
            msg_rx,
            runner,
            hooks.clone(),
            shutdown.clone(),
        ));

        Self {
            msg_tx,
            hooks,
            shutdown,
        }
    }

    /// Ignored while a job is running or its success window is open.
    pub fn start(&self, descriptor: JobDescriptor) {
        self.send(Msg::Start(Box::new(descriptor)));
    }

    pub fn cancel(&self) {
        self.send(Msg::Cancel);
    }

    pub fn retry(&self) {
        self.send(Msg::Retry);
    }

    pub fn dismiss(&self) {
        self.send(Msg::Dismiss);
    }

    /// Delivers the latest view right away, then every change.
    pub fn subscribe<F>(&self, callback: F) -> ViewSubscription
    where
        F: FnMut(&TrackerView) + Send + 'static,
    {
        let callback: ViewCallback = Arc::new(Mutex::new(callback));
        // Held through the replay so a concurrent publish waits its turn and
        // the replayed view is never newer than the next delivery.
        let mut replay = lock(&*callback);
        let id = {
            let mut subscribers = lock(&self.hooks.subscribers);
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.entries.push((id, callback.clone()));
            id
        };
        let subscription = ViewSubscription {
            id,
            hooks: Arc::downgrade(&self.hooks),
        };
        (*replay)(&self.view());
        drop(replay);
        subscription
    }

    /// Called once per successful job, after the success window.
    pub fn on_finished<F>(&self, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        lock(&self.hooks.finished).push(Arc::new(Mutex::new(callback)));
    }

    pub fn view(&self) -> TrackerView {
        lock(&self.hooks.latest).clone()
    }

    fn send(&self, msg: Msg) {
        if self.msg_tx.send(msg).is_err() {
            tracker_debug!("tracker driver has stopped; message dropped");
        }
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn drive(
    mut state: TrackerState,
    mut msg_rx: UnboundedReceiver<Msg>,
    mut runner: EffectRunner,
    hooks: Arc<Hooks>,
    shutdown: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            msg = msg_rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let (next, effects) = update(state, msg);
        state = next;
        let finished = runner.run(effects);
        if state.consume_dirty() {
            hooks.publish(state.view());
        }
        for job_id in finished {
            hooks.notify_finished(&job_id);
        }
    }
    runner.shutdown();
}
