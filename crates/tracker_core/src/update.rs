use tracker_logging::{tracker_debug, tracker_error, tracker_info, tracker_trace, tracker_warn};

use crate::state::TrackerState;
use crate::{
    reconcile, CoordinatorAction, Effect, Generation, JobDescriptor, JobFailure, JobSnapshot,
    Msg, Phase, PollEvent, ProgressUpdate, StreamSignal, TrackerStatus, Transport, Verdict,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: TrackerState, msg: Msg) -> (TrackerState, Vec<Effect>) {
    let mut effects = Vec::new();
    match msg {
        Msg::Start(descriptor) => {
            if state.status.is_active() || state.coordinator.is_celebrating() {
                tracker_debug!(
                    "start of job {} ignored: tracker is {:?}",
                    descriptor.job_id,
                    state.status
                );
            } else {
                if state.status != TrackerStatus::Idle {
                    effects.push(Effect::StopTransports {
                        generation: state.generation,
                    });
                }
                begin(&mut state, *descriptor, &mut effects);
            }
        }
        Msg::Cancel => cancel(&mut state, &mut effects),
        Msg::Retry => match (state.status, state.descriptor.clone()) {
            (TrackerStatus::Failed | TrackerStatus::Cancelled, Some(descriptor)) => {
                tracker_info!("retrying job {}", descriptor.job_id);
                effects.push(Effect::StopTransports {
                    generation: state.generation,
                });
                begin(&mut state, descriptor, &mut effects);
            }
            (status, _) => tracker_debug!("retry ignored: tracker is {:?}", status),
        },
        Msg::Dismiss => {
            if matches!(
                state.status,
                TrackerStatus::Failed | TrackerStatus::Cancelled
            ) {
                state.generation += 1;
                state.status = TrackerStatus::Idle;
                state.snapshot = None;
                state.descriptor = None;
                state.coordinator.dismiss();
                state.mark_dirty();
            } else {
                tracker_debug!("dismiss ignored: tracker is {:?}", state.status);
            }
        }
        Msg::Poll { generation, event } => {
            if !accepts(&state, generation) {
                tracker_trace!("dropping poll event from generation {}", generation);
            } else {
                match event {
                    PollEvent::Status(status) => {
                        apply(&mut state, ProgressUpdate::Status(status), &mut effects);
                    }
                    PollEvent::TransientError(reason) => {
                        tracker_warn!("status poll failed, retrying on next tick: {}", reason);
                    }
                    PollEvent::Fatal(reason) => {
                        tracker_error!("status polling gave up: {}", reason);
                        apply(&mut state, ProgressUpdate::TransportFatal, &mut effects);
                    }
                }
            }
        }
        Msg::Stream { generation, signal } => {
            if !accepts(&state, generation) {
                tracker_trace!("dropping stream signal from generation {}", generation);
            } else {
                on_stream_signal(&mut state, signal, &mut effects);
            }
        }
        Msg::Tick { generation } => {
            if generation == state.generation && state.timer.tick() {
                let elapsed = state.timer.elapsed_seconds();
                if let Some(snapshot) = state.snapshot.as_mut() {
                    snapshot.elapsed_seconds = elapsed;
                }
                state.mark_dirty();
            }
        }
        Msg::HandOffElapsed { generation } => {
            if generation == state.generation {
                if let Some(action) = state.coordinator.window_elapsed() {
                    push_coordinator_actions(&state, vec![action], &mut effects);
                    state.mark_dirty();
                }
            }
        }
    }

    (state, effects)
}

/// Current-generation messages are applied while the job runs, and during
/// the success window so a late failure can still override it.
fn accepts(state: &TrackerState, generation: Generation) -> bool {
    generation == state.generation
        && (state.status.is_active() || state.coordinator.is_celebrating())
}

fn begin(state: &mut TrackerState, descriptor: JobDescriptor, effects: &mut Vec<Effect>) {
    state.generation += 1;
    let generation = state.generation;
    tracker_info!(
        "tracking job {} via {} (generation {})",
        descriptor.job_id,
        descriptor.transport,
        generation
    );

    if descriptor.transport.polls() {
        effects.push(Effect::StartPoller {
            generation,
            job_id: descriptor.job_id.clone(),
            interval: descriptor.poll_interval,
            status_mapping: descriptor.status_mapping.clone(),
        });
    }
    if descriptor.transport.streams() {
        effects.push(Effect::ConnectStream {
            generation,
            job_id: descriptor.job_id.clone(),
        });
    }
    effects.push(Effect::StartTimer { generation });

    state.snapshot = Some(JobSnapshot::new(descriptor.job_id.clone()));
    state.descriptor = Some(descriptor);
    state.timer.start();
    state.coordinator.reset();
    state.status = TrackerStatus::Starting;
    state.mark_dirty();
}

fn cancel(state: &mut TrackerState, effects: &mut Vec<Effect>) {
    if state.status.is_active() {
        effects.push(Effect::StopTransports {
            generation: state.generation,
        });
        // Anything still in flight for the old generation is now stale.
        state.generation += 1;
        state.timer.stop();
        state.status = TrackerStatus::Cancelled;
        if let Some(snapshot) = state.snapshot.as_mut() {
            snapshot.phase = Phase::Error;
            snapshot.failure = Some(JobFailure::cancelled());
            tracker_info!("job {} cancelled", snapshot.job_id);
            let actions = state.coordinator.on_snapshot(snapshot);
            push_coordinator_actions(state, actions, effects);
        }
        state.mark_dirty();
    } else if state.coordinator.is_celebrating() {
        let actions = state.coordinator.cancel();
        push_coordinator_actions(state, actions, effects);
        state.mark_dirty();
    } else {
        tracker_debug!("cancel ignored: tracker is {:?}", state.status);
    }
}

fn on_stream_signal(state: &mut TrackerState, signal: StreamSignal, effects: &mut Vec<Effect>) {
    match signal {
        StreamSignal::Connected => set_connection(state, true),
        StreamSignal::Event(event) => apply(state, ProgressUpdate::Stream(event), effects),
        StreamSignal::Disconnected { attempt, reason } => {
            tracker_warn!(
                "event stream dropped ({}), reconnect attempt {}",
                reason,
                attempt
            );
        }
        StreamSignal::Exhausted => {
            set_connection(state, false);
            let stream_only = state
                .descriptor
                .as_ref()
                .is_some_and(|d| d.transport == Transport::StreamOnly);
            if stream_only && state.status.is_active() {
                if let Some(descriptor) = state.descriptor.as_ref() {
                    tracker_warn!(
                        "event stream for job {} exhausted, falling back to polling",
                        descriptor.job_id
                    );
                    effects.push(Effect::StartPoller {
                        generation: state.generation,
                        job_id: descriptor.job_id.clone(),
                        interval: descriptor.poll_interval,
                        status_mapping: descriptor.status_mapping.clone(),
                    });
                }
            }
        }
    }
}

fn set_connection(state: &mut TrackerState, healthy: bool) {
    if !state.status.is_active() {
        return;
    }
    if let Some(snapshot) = state.snapshot.as_mut() {
        if snapshot.connection_healthy != healthy {
            snapshot.connection_healthy = healthy;
            state.mark_dirty();
        }
    }
}

fn apply(state: &mut TrackerState, update: ProgressUpdate, effects: &mut Vec<Effect>) {
    let (Some(descriptor), Some(current)) = (state.descriptor.as_ref(), state.snapshot.as_ref())
    else {
        return;
    };
    let result = reconcile(current, &update, &descriptor.status_mapping);
    match result.verdict {
        Verdict::Rejected(reason) => {
            tracker_debug!(
                "job {}: dropped out-of-order update {:?}: {:?}",
                current.job_id,
                update,
                reason
            );
            return;
        }
        Verdict::Unchanged => return,
        Verdict::Applied | Verdict::LabelOnly => {}
    }

    let phase = result.snapshot.phase;
    state.snapshot = Some(result.snapshot);
    state.mark_dirty();
    transition(state, phase, effects);
}

fn transition(state: &mut TrackerState, phase: Phase, effects: &mut Vec<Effect>) {
    let next = match phase {
        Phase::Starting => TrackerStatus::Starting,
        Phase::Processing => TrackerStatus::Processing,
        Phase::Completed => TrackerStatus::Completed,
        Phase::Error => TrackerStatus::Failed,
    };
    if next == state.status {
        return;
    }
    tracker_info!("tracker {:?} -> {:?}", state.status, next);
    state.status = next;

    if phase.is_terminal() {
        state.timer.stop();
        effects.push(Effect::StopTransports {
            generation: state.generation,
        });
        if let Some(snapshot) = state.snapshot.as_ref() {
            let actions = state.coordinator.on_snapshot(snapshot);
            push_coordinator_actions(state, actions, effects);
        }
    }
}

fn push_coordinator_actions(
    state: &TrackerState,
    actions: Vec<CoordinatorAction>,
    effects: &mut Vec<Effect>,
) {
    for action in actions {
        let effect = match action {
            CoordinatorAction::ScheduleHandOff(after) => Effect::ScheduleHandOff {
                generation: state.generation,
                after,
            },
            CoordinatorAction::CancelHandOff => Effect::CancelHandOff,
            CoordinatorAction::Finish => match state.snapshot.as_ref() {
                Some(snapshot) => Effect::NotifyFinished {
                    job_id: snapshot.job_id.clone(),
                },
                None => continue,
            },
        };
        effects.push(effect);
    }
}
