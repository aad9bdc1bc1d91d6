use serde::Serialize;

use crate::{HandOffState, JobSnapshot, Milestone, Phase, TrackerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AvailableActions {
    pub cancel: bool,
    pub retry: bool,
    pub dismiss: bool,
}

/// What subscribers receive on every accepted change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TrackerView {
    pub status: TrackerStatus,
    pub snapshot: Option<JobSnapshot>,
    /// Derived from the snapshot's percentage and the job's milestone table.
    pub milestone: Option<Milestone>,
    pub is_long_running: bool,
    pub hand_off: HandOffState,
    pub actions: AvailableActions,
}

impl TrackerView {
    pub fn phase(&self) -> Option<Phase> {
        self.snapshot.as_ref().map(|s| s.phase)
    }

    pub fn progress_percent(&self) -> u8 {
        self.snapshot.as_ref().map_or(0, |s| s.progress_percent)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.snapshot.as_ref().and_then(JobSnapshot::error_message)
    }

    pub fn is_celebrating(&self) -> bool {
        self.hand_off == HandOffState::Celebrating
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == TrackerStatus::Cancelled
    }
}
