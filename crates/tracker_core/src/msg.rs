use crate::{Generation, JobDescriptor, StatusUpdate, StreamEvent};

/// What the status poller reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Status(StatusUpdate),
    /// A single failed poll; the next tick retries.
    TransientError(String),
    /// Consecutive-failure cap reached; the poller has stopped.
    Fatal(String),
}

/// What the event stream reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    Connected,
    Event(StreamEvent),
    /// Connection dropped; a reconnect attempt is scheduled.
    Disconnected { attempt: u32, reason: String },
    /// Reconnects used up. The job itself is not failed by this.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User started tracking a job.
    Start(Box<JobDescriptor>),
    /// User stopped tracking.
    Cancel,
    /// User asked to run the failed job again.
    Retry,
    /// User abandoned a failed job.
    Dismiss,
    /// Poller output for the given generation.
    Poll {
        generation: Generation,
        event: PollEvent,
    },
    /// Event stream output for the given generation.
    Stream {
        generation: Generation,
        signal: StreamSignal,
    },
    /// One second of wall clock passed.
    Tick { generation: Generation },
    /// The success window scheduled for `generation` closed.
    HandOffElapsed { generation: Generation },
}
