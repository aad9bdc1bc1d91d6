use std::time::Duration;

use crate::{Generation, JobId, StatusMapping};

/// Side effects requested by [`crate::update`]; the engine executes them and
/// feeds results back as messages tagged with `generation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartPoller {
        generation: Generation,
        job_id: JobId,
        interval: Duration,
        status_mapping: StatusMapping,
    },
    ConnectStream {
        generation: Generation,
        job_id: JobId,
    },
    StartTimer {
        generation: Generation,
    },
    /// Stop poller, stream and timer.
    StopTransports {
        generation: Generation,
    },
    ScheduleHandOff {
        generation: Generation,
        after: Duration,
    },
    CancelHandOff,
    NotifyFinished {
        job_id: JobId,
    },
}
