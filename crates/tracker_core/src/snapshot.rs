use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::{JobId, Milestone, MilestoneTable};

/// Message shown when polling gives up after repeated transport failures.
pub const CONNECTIVITY_MESSAGE: &str =
    "Lost contact with the server while tracking this job. Check your connection and retry.";
/// Reason reported when the user stops tracking a job.
pub const CANCELLED_MESSAGE: &str = "cancelled";
/// Used when the backend reports failure without a message.
pub const GENERIC_FAILURE_MESSAGE: &str = "The job failed.";

/// Lifecycle phase of a tracked job, ordered by how far along it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Starting,
    Processing,
    Completed,
    Error,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Error)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::Starting => "starting",
            Phase::Processing => "processing",
            Phase::Completed => "completed",
            Phase::Error => "error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend reported the job as failed.
    Remote,
    /// Polling exceeded its consecutive-failure cap.
    Connectivity,
    /// The user stopped tracking.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn remote(message: Option<String>) -> Self {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
        Self {
            kind: FailureKind::Remote,
            message,
        }
    }

    pub fn connectivity() -> Self {
        Self {
            kind: FailureKind::Connectivity,
            message: CONNECTIVITY_MESSAGE.to_string(),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: CANCELLED_MESSAGE.to_string(),
        }
    }
}

/// The single authoritative view of one tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub phase: Phase,
    pub progress_percent: u8,
    pub current_step_label: Option<String>,
    pub elapsed_seconds: u64,
    /// Present only when `phase` is `Error`.
    pub failure: Option<JobFailure>,
    pub connection_healthy: bool,
}

impl JobSnapshot {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            job_id: job_id.into(),
            phase: Phase::Starting,
            progress_percent: 0,
            current_step_label: None,
            elapsed_seconds: 0,
            failure: None,
            connection_healthy: true,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.failure,
            Some(JobFailure {
                kind: FailureKind::Cancelled,
                ..
            })
        )
    }

    pub fn milestone<'a>(&self, table: &'a MilestoneTable) -> &'a Milestone {
        table.resolve(i64::from(self.progress_percent))
    }

    /// True once the job has been processing for longer than `threshold`.
    pub fn is_long_running(&self, threshold: Duration) -> bool {
        self.phase == Phase::Processing && self.elapsed_seconds > threshold.as_secs()
    }
}
