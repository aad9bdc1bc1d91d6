use std::time::Duration;

use serde::Serialize;

use crate::coordinator::CompletionCoordinator;
use crate::view_model::{AvailableActions, TrackerView};
use crate::{ElapsedTimer, JobDescriptor, JobSnapshot};

/// Tags every transport run; messages from an older run are dropped.
pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    #[default]
    Idle,
    Starting,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TrackerStatus {
    pub fn is_active(self) -> bool {
        matches!(self, TrackerStatus::Starting | TrackerStatus::Processing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TrackerStatus::Completed | TrackerStatus::Failed | TrackerStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Processing time after which the view flags the job as slow.
    pub long_running_after: Duration,
    /// How long the success state shows before hand-off.
    pub hand_off_window: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            long_running_after: Duration::from_secs(30),
            hand_off_window: CompletionCoordinator::DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerState {
    config: TrackerConfig,
    pub(crate) status: TrackerStatus,
    pub(crate) descriptor: Option<JobDescriptor>,
    pub(crate) snapshot: Option<JobSnapshot>,
    pub(crate) timer: ElapsedTimer,
    pub(crate) coordinator: CompletionCoordinator,
    pub(crate) generation: Generation,
    dirty: bool,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl TrackerState {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            status: TrackerStatus::Idle,
            descriptor: None,
            snapshot: None,
            timer: ElapsedTimer::new(),
            coordinator: CompletionCoordinator::new(config.hand_off_window),
            generation: 0,
            dirty: false,
        }
    }

    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn view(&self) -> TrackerView {
        let milestone = match (&self.snapshot, &self.descriptor) {
            (Some(snapshot), Some(descriptor)) => {
                Some(snapshot.milestone(&descriptor.milestones).clone())
            }
            _ => None,
        };
        let is_long_running = self
            .snapshot
            .as_ref()
            .is_some_and(|s| s.is_long_running(self.config.long_running_after));
        let awaiting_decision =
            matches!(self.status, TrackerStatus::Failed | TrackerStatus::Cancelled);

        TrackerView {
            status: self.status,
            snapshot: self.snapshot.clone(),
            milestone,
            is_long_running,
            hand_off: self.coordinator.state(),
            actions: AvailableActions {
                cancel: self.status.is_active() || self.coordinator.is_celebrating(),
                retry: awaiting_decision,
                dismiss: awaiting_decision,
            },
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
