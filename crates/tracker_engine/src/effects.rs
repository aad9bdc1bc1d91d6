use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracker_core::{Effect, Generation, JobId, Msg, PollEvent, StreamSignal};
use tracker_logging::{tracker_debug, tracker_trace};

use crate::subscription::{after, every};
use crate::{JobEventStream, JobStatusPoller, PollSink, StreamSink, Subscription};

/// Routes transport output back into the tracker, tagged with its generation.
struct GenerationSink {
    generation: Generation,
    tx: UnboundedSender<Msg>,
}

impl PollSink for GenerationSink {
    fn emit(&self, event: PollEvent) {
        let _ = self.tx.send(Msg::Poll {
            generation: self.generation,
            event,
        });
    }
}

impl StreamSink for GenerationSink {
    fn emit(&self, signal: StreamSignal) {
        let _ = self.tx.send(Msg::Stream {
            generation: self.generation,
            signal,
        });
    }
}

/// Executes core effects. Owns every background task of the current run.
pub(crate) struct EffectRunner {
    poller: JobStatusPoller,
    stream: JobEventStream,
    msg_tx: UnboundedSender<Msg>,
    active_poll: Option<Subscription>,
    active_stream: Option<Subscription>,
    active_timer: Option<Subscription>,
    hand_off: Option<Subscription>,
}

impl EffectRunner {
    pub(crate) fn new(
        poller: JobStatusPoller,
        stream: JobEventStream,
        msg_tx: UnboundedSender<Msg>,
    ) -> Self {
        Self {
            poller,
            stream,
            msg_tx,
            active_poll: None,
            active_stream: None,
            active_timer: None,
            hand_off: None,
        }
    }

    /// Runs `effects` in order and returns the jobs whose hand-off is due.
    pub(crate) fn run(&mut self, effects: Vec<Effect>) -> Vec<JobId> {
        let mut finished = Vec::new();
        for effect in effects {
            tracker_trace!("effect {:?}", effect);
            match effect {
                Effect::StartPoller {
                    generation,
                    job_id,
                    interval,
                    status_mapping,
                } => {
                    let sink = self.sink(generation);
                    self.active_poll =
                        Some(self.poller.start(job_id, interval, status_mapping, sink));
                }
                Effect::ConnectStream { generation, job_id } => {
                    let sink = self.sink(generation);
                    self.active_stream = Some(self.stream.connect(job_id, sink));
                }
                Effect::StartTimer { generation } => {
                    let tx = self.msg_tx.clone();
                    self.active_timer = Some(every(Duration::from_secs(1), move || {
                        let _ = tx.send(Msg::Tick { generation });
                    }));
                }
                Effect::StopTransports { generation } => {
                    tracker_debug!("stopping transports of generation {}", generation);
                    self.stop_transports();
                }
                Effect::ScheduleHandOff { generation, after: delay } => {
                    let tx = self.msg_tx.clone();
                    self.hand_off = Some(after(delay, move || {
                        let _ = tx.send(Msg::HandOffElapsed { generation });
                    }));
                }
                Effect::CancelHandOff => {
                    if let Some(hand_off) = self.hand_off.take() {
                        hand_off.cancel();
                    }
                }
                Effect::NotifyFinished { job_id } => finished.push(job_id),
            }
        }
        finished
    }

    pub(crate) fn shutdown(&mut self) {
        self.stop_transports();
        if let Some(hand_off) = self.hand_off.take() {
            hand_off.cancel();
        }
    }

    fn stop_transports(&mut self) {
        for subscription in [
            self.active_poll.take(),
            self.active_stream.take(),
            self.active_timer.take(),
        ]
        .into_iter()
        .flatten()
        {
            subscription.cancel();
        }
    }

    fn sink(&self, generation: Generation) -> Arc<GenerationSink> {
        Arc::new(GenerationSink {
            generation,
            tx: self.msg_tx.clone(),
        })
    }
}
