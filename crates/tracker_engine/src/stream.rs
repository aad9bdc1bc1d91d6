use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tracker_core::{JobId, StreamEvent, StreamEventKind, StreamSignal};
use tracker_logging::{tracker_debug, tracker_warn};

use crate::fetch::FetchSettings;
use crate::sse::SseDecoder;
use crate::types::clamp_percent;
use crate::{StreamError, Subscription, WireEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub max_reconnect_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl StreamSettings {
    /// Delay before reconnect `attempt` (1-based): doubles each time, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<WireEvent, StreamError>> + Send>>;

/// Opens the push channel for one job.
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    async fn open(&self, job_id: &str) -> Result<EventStream, StreamError>;
}

/// Server-sent events over HTTP.
#[derive(Debug, Clone)]
pub struct SseEventSource {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl SseEventSource {
    pub fn new(settings: FetchSettings) -> Result<Self, StreamError> {
        // No overall timeout: the body stays open for the whole job.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| StreamError::Connect(err.to_string()))?;
        Ok(Self { settings, client })
    }
}

#[async_trait::async_trait]
impl EventSource for SseEventSource {
    async fn open(&self, job_id: &str) -> Result<EventStream, StreamError> {
        let url = self
            .settings
            .events_url(job_id)
            .map_err(|err| StreamError::Connect(err.to_string()))?;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| StreamError::Connect(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::HttpStatus(status.as_u16()));
        }

        Ok(Box::pin(decode_sse(response.bytes_stream())))
    }
}

/// Turns a raw SSE body into parsed wire events.
pub fn decode_sse<S, E>(bytes: S) -> impl Stream<Item = Result<WireEvent, StreamError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = (
        Box::pin(bytes),
        SseDecoder::new(),
        VecDeque::new(),
        false,
    );
    futures_util::stream::unfold(state, |(mut inner, mut decoder, mut pending, mut done)| async move {
        loop {
            if let Some(item) = pending.pop_front() {
                return Some((item, (inner, decoder, pending, done)));
            }
            if done {
                return None;
            }
            match inner.next().await {
                Some(Ok(chunk)) => {
                    pending.extend(decoder.push(&chunk).into_iter().map(|p| parse_payload(&p)));
                }
                Some(Err(err)) => {
                    done = true;
                    pending.push_back(Err(StreamError::Read(err.to_string())));
                }
                None => {
                    done = true;
                    pending.extend(decoder.finish().map(|p| parse_payload(&p)));
                }
            }
        }
    })
}

fn parse_payload(payload: &str) -> Result<WireEvent, StreamError> {
    serde_json::from_str(payload)
        .map_err(|err| StreamError::Decode(format!("{err} (data: {payload})")))
}

/// Translates a wire event into a typed event with a readable step label.
pub fn describe_event(wire: &WireEvent) -> StreamEvent {
    let kind = StreamEventKind::from_wire(&wire.kind);
    let percent = wire
        .number(&["progress_percent", "progress"])
        .map(clamp_percent);
    let message = wire.text(&["message", "detail"]);

    let label = match &kind {
        StreamEventKind::JobStarted => Some("Job started".to_string()),
        StreamEventKind::PhaseStarted => Some(match wire.text(&["phase", "name"]) {
            Some(phase) => format!("Started {phase}"),
            None => "Phase started".to_string(),
        }),
        StreamEventKind::ItemProcessed => {
            let item = wire.text(&["item_name", "item", "name"]);
            let position = match (wire.text(&["index", "current"]), wire.text(&["total"])) {
                (Some(index), Some(total)) => Some(format!("{index}/{total}")),
                _ => None,
            };
            Some(match (item, position) {
                (Some(item), Some(position)) => format!("Processed {item} ({position})"),
                (Some(item), None) => format!("Processed {item}"),
                (None, Some(position)) => format!("Processed item {position}"),
                (None, None) => "Processed an item".to_string(),
            })
        }
        StreamEventKind::PhaseCompleted => Some(match wire.text(&["phase", "name"]) {
            Some(phase) => format!("Finished {phase}"),
            None => "Phase finished".to_string(),
        }),
        StreamEventKind::JobCompleted => Some("Complete".to_string()),
        StreamEventKind::JobFailed => None,
        StreamEventKind::Progress | StreamEventKind::Other(_) => message,
    };
    let error_message = match kind {
        StreamEventKind::JobFailed => wire.text(&["error", "message", "error_message"]),
        _ => None,
    };

    StreamEvent {
        kind,
        progress_percent: percent,
        label,
        error_message,
    }
}

pub trait StreamSink: Send + Sync {
    fn emit(&self, signal: StreamSignal);
}

/// Follows the push channel of one job, reconnecting with backoff.
pub struct JobEventStream {
    source: Arc<dyn EventSource>,
    settings: StreamSettings,
}

impl JobEventStream {
    pub fn new(source: Arc<dyn EventSource>, settings: StreamSettings) -> Self {
        Self { source, settings }
    }

    /// Runs until a terminal event, until reconnects are exhausted, or until
    /// the subscription is cancelled. Events after the terminal one are never
    /// read.
    pub fn connect(&self, job_id: JobId, sink: Arc<dyn StreamSink>) -> Subscription {
        let source = self.source.clone();
        let settings = self.settings;
        Subscription::spawn(move |token| async move {
            let mut attempt = 0u32;
            loop {
                let opened = tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    opened = source.open(&job_id) => opened,
                };

                let reason = match opened {
                    Ok(mut events) => {
                        if token.is_cancelled() {
                            return;
                        }
                        sink.emit(StreamSignal::Connected);
                        let mut received = false;
                        let reason = loop {
                            let next = tokio::select! {
                                biased;
                                _ = token.cancelled() => return,
                                next = events.next() => next,
                            };
                            match next {
                                Some(Ok(wire)) => {
                                    received = true;
                                    let event = describe_event(&wire);
                                    let terminal = event.kind.is_terminal();
                                    sink.emit(StreamSignal::Event(event));
                                    if terminal {
                                        tracker_debug!("event stream for job {} finished", job_id);
                                        return;
                                    }
                                }
                                Some(Err(StreamError::Decode(detail))) => {
                                    tracker_warn!("skipping malformed stream event: {}", detail);
                                }
                                Some(Err(err)) => break err.to_string(),
                                None => break "stream closed by server".to_string(),
                            }
                        };
                        // Only a connection that delivered something earns a
                        // fresh reconnect budget.
                        if received {
                            attempt = 0;
                        }
                        reason
                    }
                    Err(err) => err.to_string(),
                };

                attempt += 1;
                if attempt > settings.max_reconnect_attempts {
                    tracker_warn!(
                        "event stream for job {} gave up after {} reconnects: {}",
                        job_id,
                        settings.max_reconnect_attempts,
                        reason
                    );
                    sink.emit(StreamSignal::Exhausted);
                    return;
                }
                sink.emit(StreamSignal::Disconnected { attempt, reason });

                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(settings.backoff(attempt)) => {}
                }
            }
        })
    }
}
