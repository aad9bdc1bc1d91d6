use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracker_core::{JobDescriptor, JobId, PollEvent, StatusMapping};
use tracker_logging::{tracker_debug, tracker_trace};

use crate::{StatusFetcher, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Failed polls in a row before polling gives up for good.
    pub max_consecutive_failures: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
        }
    }
}

pub trait PollSink: Send + Sync {
    fn emit(&self, event: PollEvent);
}

/// Periodically pulls job status until it turns terminal.
pub struct JobStatusPoller {
    fetcher: Arc<dyn StatusFetcher>,
    settings: PollSettings,
}

impl JobStatusPoller {
    pub fn new(fetcher: Arc<dyn StatusFetcher>, settings: PollSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Polls immediately, then every `interval`. Stops after a terminal
    /// status, after the failure cap, or when the subscription is cancelled.
    ///
    /// `interval` is raised to [`JobDescriptor::MIN_POLL_INTERVAL`] since the
    /// descriptor's field can be set directly.
    pub fn start(
        &self,
        job_id: JobId,
        interval: Duration,
        mapping: StatusMapping,
        sink: Arc<dyn PollSink>,
    ) -> Subscription {
        let fetcher = self.fetcher.clone();
        let cap = self.settings.max_consecutive_failures.max(1);
        let interval = interval.max(JobDescriptor::MIN_POLL_INTERVAL);
        Subscription::spawn(move |token| async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut failures = 0u32;

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tracker_trace!("polling status of job {}", job_id);
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    result = fetcher.fetch_status(&job_id) => result,
                };
                if token.is_cancelled() {
                    break;
                }

                match result {
                    Ok(update) => {
                        failures = 0;
                        let terminal = mapping.is_terminal(&update.status);
                        sink.emit(PollEvent::Status(update));
                        if terminal {
                            tracker_debug!("job {} reached a terminal status, poller done", job_id);
                            break;
                        }
                    }
                    Err(err) => {
                        failures += 1;
                        if failures >= cap {
                            sink.emit(PollEvent::Fatal(format!(
                                "{failures} consecutive status polls failed, last: {err}"
                            )));
                            break;
                        }
                        sink.emit(PollEvent::TransientError(err.to_string()));
                    }
                }
            }
        })
    }
}
