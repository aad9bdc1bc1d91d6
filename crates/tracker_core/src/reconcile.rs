//! Merges poll responses and stream events into the next [`JobSnapshot`].
//!
//! `reconcile` is a pure reducer. Phase and percentage only move forward;
//! step labels follow whichever channel spoke last, unless the update that
//! carried them was a phase regression. A reported failure beats a success.

use serde::Serialize;

use crate::{JobFailure, JobSnapshot, Phase, StatusClass, StatusMapping};

/// One pull from the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusUpdate {
    pub status: String,
    pub progress_percent: Option<u8>,
    pub step_label: Option<String>,
    pub error_message: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.progress_percent = Some(percent);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.step_label = Some(label.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventKind {
    JobStarted,
    PhaseStarted,
    ItemProcessed,
    PhaseCompleted,
    Progress,
    JobCompleted,
    JobFailed,
    Other(String),
}

impl StreamEventKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "job_started" => StreamEventKind::JobStarted,
            "phase_started" => StreamEventKind::PhaseStarted,
            "item_processed" => StreamEventKind::ItemProcessed,
            "phase_completed" => StreamEventKind::PhaseCompleted,
            "progress" => StreamEventKind::Progress,
            "job_completed" => StreamEventKind::JobCompleted,
            "job_failed" => StreamEventKind::JobFailed,
            other => StreamEventKind::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEventKind::JobCompleted | StreamEventKind::JobFailed)
    }
}

/// A pushed lifecycle event, already translated into display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub kind: StreamEventKind,
    pub progress_percent: Option<u8>,
    pub label: Option<String>,
    pub error_message: Option<String>,
}

impl StreamEvent {
    pub fn new(kind: StreamEventKind) -> Self {
        Self {
            kind,
            progress_percent: None,
            label: None,
            error_message: None,
        }
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.progress_percent = Some(percent);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Anything that can move a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    Status(StatusUpdate),
    Stream(StreamEvent),
    /// Polling gave up; the job can no longer be observed.
    TransportFatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    AlreadyTerminal(Phase),
    PhaseRegression { from: Phase, to: Phase },
    PercentRegression { from: u8, to: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Applied,
    /// Phase and percentage were stale, the label was still surfaced.
    LabelOnly,
    Rejected(RejectReason),
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub snapshot: JobSnapshot,
    pub verdict: Verdict,
}

struct Tentative {
    phase: Option<Phase>,
    percent: Option<u8>,
    label: Option<String>,
    failure: Option<JobFailure>,
}

fn tentative(update: &ProgressUpdate, mapping: &StatusMapping) -> Tentative {
    match update {
        ProgressUpdate::Status(status) => {
            let class = mapping.classify(&status.status);
            let phase = match class {
                StatusClass::Starting => Phase::Starting,
                StatusClass::Processing => Phase::Processing,
                StatusClass::Completed => Phase::Completed,
                StatusClass::Failed => Phase::Error,
            };
            let percent = match class {
                StatusClass::Completed => Some(100),
                _ => status
                    .progress_percent
                    .or_else(|| mapping.progress_hint(&status.status)),
            };
            let failure = (class == StatusClass::Failed)
                .then(|| JobFailure::remote(status.error_message.clone()));
            Tentative {
                phase: Some(phase),
                percent,
                label: non_empty(status.step_label.as_deref()),
                failure,
            }
        }
        ProgressUpdate::Stream(event) => {
            let phase = match &event.kind {
                StreamEventKind::JobCompleted => Some(Phase::Completed),
                StreamEventKind::JobFailed => Some(Phase::Error),
                StreamEventKind::Other(_) => None,
                _ => Some(Phase::Processing),
            };
            let percent = match &event.kind {
                StreamEventKind::JobCompleted => Some(100),
                StreamEventKind::Other(_) => None,
                _ => event.progress_percent,
            };
            let failure = (event.kind == StreamEventKind::JobFailed)
                .then(|| JobFailure::remote(event.error_message.clone()));
            Tentative {
                phase,
                percent,
                label: non_empty(event.label.as_deref()),
                failure,
            }
        }
        ProgressUpdate::TransportFatal => Tentative {
            phase: Some(Phase::Error),
            percent: None,
            label: None,
            failure: Some(JobFailure::connectivity()),
        },
    }
}

fn non_empty(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToOwned::to_owned)
}

/// Applies `update` to `current` and reports what happened.
pub fn reconcile(
    current: &JobSnapshot,
    update: &ProgressUpdate,
    mapping: &StatusMapping,
) -> Reconciliation {
    let tentative = tentative(update, mapping);
    let mut next = current.clone();

    let verdict = match (current.phase, tentative.phase) {
        (Phase::Error, _) => Verdict::Rejected(RejectReason::AlreadyTerminal(Phase::Error)),
        (Phase::Completed, Some(Phase::Error)) => {
            apply_terminal(&mut next, Phase::Error, tentative);
            Verdict::Applied
        }
        (Phase::Completed, _) => {
            Verdict::Rejected(RejectReason::AlreadyTerminal(Phase::Completed))
        }
        (_, Some(phase)) if phase.is_terminal() => {
            apply_terminal(&mut next, phase, tentative);
            Verdict::Applied
        }
        (from, Some(to)) if to < from => {
            Verdict::Rejected(RejectReason::PhaseRegression { from, to })
        }
        (_, Some(to)) => {
            let percent = tentative
                .percent
                .map_or(current.progress_percent, |p| p.min(100));
            if percent < current.progress_percent {
                match tentative.label {
                    Some(label) => {
                        next.current_step_label = Some(label);
                        Verdict::LabelOnly
                    }
                    None => Verdict::Rejected(RejectReason::PercentRegression {
                        from: current.progress_percent,
                        to: percent,
                    }),
                }
            } else {
                next.phase = to;
                next.progress_percent = percent;
                if tentative.label.is_some() {
                    next.current_step_label = tentative.label;
                }
                Verdict::Applied
            }
        }
        (_, None) => match tentative.label {
            Some(label) => {
                next.current_step_label = Some(label);
                Verdict::LabelOnly
            }
            None => Verdict::Unchanged,
        },
    };

    let verdict = match verdict {
        Verdict::Applied | Verdict::LabelOnly if next == *current => Verdict::Unchanged,
        other => other,
    };

    Reconciliation {
        snapshot: next,
        verdict,
    }
}

fn apply_terminal(next: &mut JobSnapshot, phase: Phase, tentative: Tentative) {
    next.phase = phase;
    if phase == Phase::Completed {
        next.progress_percent = 100;
        next.failure = None;
    } else {
        next.failure = tentative.failure.or_else(|| Some(JobFailure::remote(None)));
    }
    if tentative.label.is_some() {
        next.current_step_label = tentative.label;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processing(percent: u8) -> JobSnapshot {
        JobSnapshot {
            phase: Phase::Processing,
            progress_percent: percent,
            ..JobSnapshot::new("job")
        }
    }

    #[test]
    fn percent_regression_without_label_is_rejected() {
        let current = processing(60);
        let update = ProgressUpdate::Status(StatusUpdate::new("running").with_percent(40));
        let result = reconcile(&current, &update, &StatusMapping::default());
        assert_eq!(
            result.verdict,
            Verdict::Rejected(RejectReason::PercentRegression { from: 60, to: 40 })
        );
        assert_eq!(result.snapshot, current);
    }

    #[test]
    fn stale_percent_still_surfaces_label() {
        let current = processing(60);
        let update = ProgressUpdate::Status(
            StatusUpdate::new("running")
                .with_percent(40)
                .with_label("Parsing menu 3"),
        );
        let result = reconcile(&current, &update, &StatusMapping::default());
        assert_eq!(result.verdict, Verdict::LabelOnly);
        assert_eq!(result.snapshot.progress_percent, 60);
        assert_eq!(
            result.snapshot.current_step_label.as_deref(),
            Some("Parsing menu 3")
        );
    }

    #[test]
    fn phase_regression_drops_label() {
        let current = processing(10);
        let update = ProgressUpdate::Status(StatusUpdate::new("queued").with_label("Waiting"));
        let result = reconcile(&current, &update, &StatusMapping::default());
        assert_eq!(
            result.verdict,
            Verdict::Rejected(RejectReason::PhaseRegression {
                from: Phase::Processing,
                to: Phase::Starting
            })
        );
        assert_eq!(result.snapshot.current_step_label, None);
    }

    #[test]
    fn missing_percent_uses_status_hint() {
        let mapping = StatusMapping::default().with_hint("analyzing", 70);
        let update = ProgressUpdate::Status(StatusUpdate::new("analyzing"));
        let result = reconcile(&processing(20), &update, &mapping);
        assert_eq!(result.snapshot.progress_percent, 70);
    }

    #[test]
    fn failure_beats_prior_completion() {
        let completed = JobSnapshot {
            phase: Phase::Completed,
            progress_percent: 100,
            ..JobSnapshot::new("job")
        };
        let failed = ProgressUpdate::Stream(
            StreamEvent::new(StreamEventKind::JobFailed).with_error("Menu unreadable"),
        );
        let result = reconcile(&completed, &failed, &StatusMapping::default());
        assert_eq!(result.verdict, Verdict::Applied);
        assert_eq!(result.snapshot.phase, Phase::Error);
        assert_eq!(result.snapshot.error_message(), Some("Menu unreadable"));
    }

    #[test]
    fn completion_never_masks_failure() {
        let failed = JobSnapshot {
            phase: Phase::Error,
            failure: Some(JobFailure::remote(Some("boom".into()))),
            ..processing(40)
        };
        let update = ProgressUpdate::Status(StatusUpdate::new("completed"));
        let result = reconcile(&failed, &update, &StatusMapping::default());
        assert_eq!(
            result.verdict,
            Verdict::Rejected(RejectReason::AlreadyTerminal(Phase::Error))
        );
    }

    #[test]
    fn terminal_wins_regardless_of_percent() {
        let update = ProgressUpdate::Status(StatusUpdate::new("failed").with_percent(5));
        let result = reconcile(&processing(80), &update, &StatusMapping::default());
        assert_eq!(result.snapshot.phase, Phase::Error);
        assert_eq!(result.snapshot.progress_percent, 80);
        assert_eq!(result.snapshot.error_message(), Some("The job failed."));
    }

    #[test]
    fn unknown_stream_event_without_text_is_unchanged() {
        let update = ProgressUpdate::Stream(StreamEvent::new(StreamEventKind::Other(
            "heartbeat".into(),
        )));
        let result = reconcile(&processing(10), &update, &StatusMapping::default());
        assert_eq!(result.verdict, Verdict::Unchanged);
    }

    #[test]
    fn fatal_transport_sets_connectivity_failure() {
        let result = reconcile(
            &processing(30),
            &ProgressUpdate::TransportFatal,
            &StatusMapping::default(),
        );
        assert_eq!(result.snapshot.phase, Phase::Error);
        assert_eq!(
            result.snapshot.failure.map(|f| f.kind),
            Some(crate::FailureKind::Connectivity)
        );
    }
}
