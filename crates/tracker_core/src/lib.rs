//! Tracker core: pure state machine for observing one remote job.
//!
//! Nothing here performs I/O or keeps time. Poll responses, stream events and
//! clock ticks arrive as [`Msg`]s; timers and network work leave as
//! [`Effect`]s.
mod coordinator;
mod descriptor;
mod effect;
mod milestone;
mod msg;
mod reconcile;
mod snapshot;
mod state;
mod timer;
mod update;
mod view_model;

pub use coordinator::{CompletionCoordinator, CoordinatorAction, HandOffState};
pub use descriptor::{JobDescriptor, JobId, JobKind, StatusClass, StatusMapping, Transport};
pub use effect::Effect;
pub use milestone::{Milestone, MilestoneError, MilestoneTable};
pub use msg::{Msg, PollEvent, StreamSignal};
pub use reconcile::{
    reconcile, ProgressUpdate, Reconciliation, RejectReason, StatusUpdate, StreamEvent,
    StreamEventKind, Verdict,
};
pub use snapshot::{
    FailureKind, JobFailure, JobSnapshot, Phase, CANCELLED_MESSAGE, CONNECTIVITY_MESSAGE,
    GENERIC_FAILURE_MESSAGE,
};
pub use state::{Generation, TrackerConfig, TrackerState, TrackerStatus};
pub use timer::ElapsedTimer;
pub use update::update;
pub use view_model::{AvailableActions, TrackerView};
