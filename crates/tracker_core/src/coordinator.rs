use std::time::Duration;

use serde::Serialize;

use crate::{JobSnapshot, Phase};

/// Where the success/failure hand-off currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandOffState {
    #[default]
    Watching,
    /// Success banner is showing; `Finish` follows when the window closes.
    Celebrating,
    Finished,
    /// Job errored; waits for retry or dismiss.
    AwaitingDecision,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorAction {
    ScheduleHandOff(Duration),
    CancelHandOff,
    Finish,
}

/// Sequences the hand-off after a job reaches a terminal phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCoordinator {
    window: Duration,
    state: HandOffState,
    finish_sent: bool,
}

impl CompletionCoordinator {
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(2500);

    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: HandOffState::Watching,
            finish_sent: false,
        }
    }

    pub fn state(&self) -> HandOffState {
        self.state
    }

    pub fn is_celebrating(&self) -> bool {
        self.state == HandOffState::Celebrating
    }

    pub fn on_snapshot(&mut self, snapshot: &JobSnapshot) -> Vec<CoordinatorAction> {
        match (snapshot.phase, self.state) {
            (Phase::Completed, HandOffState::Watching) => {
                self.state = HandOffState::Celebrating;
                vec![CoordinatorAction::ScheduleHandOff(self.window)]
            }
            (Phase::Error, HandOffState::Celebrating) => {
                self.state = HandOffState::AwaitingDecision;
                vec![CoordinatorAction::CancelHandOff]
            }
            (Phase::Error, HandOffState::Watching) => {
                self.state = HandOffState::AwaitingDecision;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// The celebratory window ran out.
    pub fn window_elapsed(&mut self) -> Option<CoordinatorAction> {
        if self.state != HandOffState::Celebrating {
            return None;
        }
        self.state = HandOffState::Finished;
        self.finish()
    }

    /// Skips the rest of the window but still hands off.
    pub fn cancel(&mut self) -> Vec<CoordinatorAction> {
        if self.state != HandOffState::Celebrating {
            return Vec::new();
        }
        self.state = HandOffState::Finished;
        let mut actions = vec![CoordinatorAction::CancelHandOff];
        actions.extend(self.finish());
        actions
    }

    /// Arms the coordinator for a fresh run of a job.
    pub fn reset(&mut self) {
        self.state = HandOffState::Watching;
        self.finish_sent = false;
    }

    pub fn dismiss(&mut self) {
        if self.state == HandOffState::AwaitingDecision {
            self.state = HandOffState::Watching;
        }
    }

    fn finish(&mut self) -> Option<CoordinatorAction> {
        if self.finish_sent {
            return None;
        }
        self.finish_sent = true;
        Some(CoordinatorAction::Finish)
    }
}

impl Default for CompletionCoordinator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(phase: Phase) -> JobSnapshot {
        JobSnapshot {
            phase,
            ..JobSnapshot::new("job")
        }
    }

    #[test]
    fn completion_schedules_then_finishes_once() {
        let mut coordinator = CompletionCoordinator::default();
        assert_eq!(
            coordinator.on_snapshot(&snapshot(Phase::Completed)),
            vec![CoordinatorAction::ScheduleHandOff(Duration::from_millis(2500))]
        );
        assert!(coordinator.on_snapshot(&snapshot(Phase::Completed)).is_empty());
        assert_eq!(coordinator.window_elapsed(), Some(CoordinatorAction::Finish));
        assert_eq!(coordinator.window_elapsed(), None);
        assert!(coordinator.cancel().is_empty());
    }

    #[test]
    fn cancel_during_window_still_finishes() {
        let mut coordinator = CompletionCoordinator::default();
        coordinator.on_snapshot(&snapshot(Phase::Completed));
        assert_eq!(
            coordinator.cancel(),
            vec![CoordinatorAction::CancelHandOff, CoordinatorAction::Finish]
        );
        assert_eq!(coordinator.state(), HandOffState::Finished);
        assert_eq!(coordinator.window_elapsed(), None);
    }

    #[test]
    fn late_failure_aborts_the_hand_off() {
        let mut coordinator = CompletionCoordinator::default();
        coordinator.on_snapshot(&snapshot(Phase::Completed));
        assert_eq!(
            coordinator.on_snapshot(&snapshot(Phase::Error)),
            vec![CoordinatorAction::CancelHandOff]
        );
        assert_eq!(coordinator.state(), HandOffState::AwaitingDecision);
        assert_eq!(coordinator.window_elapsed(), None);
    }

    #[test]
    fn failure_waits_for_a_decision() {
        let mut coordinator = CompletionCoordinator::default();
        assert!(coordinator.on_snapshot(&snapshot(Phase::Error)).is_empty());
        assert_eq!(coordinator.state(), HandOffState::AwaitingDecision);
        coordinator.dismiss();
        assert_eq!(coordinator.state(), HandOffState::Watching);
    }
}
