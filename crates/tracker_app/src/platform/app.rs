use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracker_core::{JobDescriptor, TrackerStatus};
use tracker_engine::{JobTracker, TrackerDeps};
use tracker_logging::{tracker_info, tracker_warn};

use super::config::Settings;
use super::render::Renderer;

pub const EXIT_COMPLETED: u8 = 0;
pub const EXIT_FAILED: u8 = 1;
pub const EXIT_INTERRUPTED: u8 = 130;

/// How long to wait for the cancellation to show up after Ctrl-C.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Outcome {
    Finished,
    Failed(String),
    Cancelled,
}

pub async fn run(settings: Settings, descriptor: JobDescriptor) -> anyhow::Result<u8> {
    let mut deps = TrackerDeps::http(settings.fetch.clone())
        .context("could not set up the job service client")?;
    deps.config = settings.tracker;
    deps.poll = settings.poll;
    deps.stream = settings.stream;

    let tracker = JobTracker::new(deps);
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracker_warn!("could not listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };
    Ok(follow(&tracker, descriptor, interrupt, |line| println!("{line}")).await)
}

/// Starts `descriptor` and prints progress until the job settles or
/// `interrupt` resolves. Returns the process exit code.
async fn follow<I, P>(tracker: &JobTracker, descriptor: JobDescriptor, interrupt: I, print: P) -> u8
where
    I: Future<Output = ()>,
    P: Fn(&str) + Send + 'static,
{
    let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();

    let finished_tx = outcome_tx.clone();
    tracker.on_finished(move |job_id| {
        tracker_info!("job {} handed off", job_id);
        let _ = finished_tx.send(Outcome::Finished);
    });

    let mut renderer = Renderer::new();
    let _subscription = tracker.subscribe(move |view| {
        for line in renderer.render(view) {
            print(&line);
        }
        let outcome = match view.status {
            TrackerStatus::Failed => Outcome::Failed(
                view.error_message()
                    .unwrap_or("the job failed")
                    .to_string(),
            ),
            TrackerStatus::Cancelled => Outcome::Cancelled,
            _ => return,
        };
        let _ = outcome_tx.send(outcome);
    });

    tracker_info!("following job {}", descriptor.job_id);
    tracker.start(descriptor);

    tokio::select! {
        outcome = outcomes.recv() => exit_code(outcome),
        _ = interrupt => {
            tracker_info!("interrupted, cancelling the job");
            tracker.cancel();
            wait_for_cancel(&mut outcomes).await;
            EXIT_INTERRUPTED
        }
    }
}

/// Cancelling during the success window hands off right away, so either
/// outcome ends the wait.
async fn wait_for_cancel(outcomes: &mut UnboundedReceiver<Outcome>) {
    let settled = tokio::time::timeout(CANCEL_GRACE, async {
        while let Some(outcome) = outcomes.recv().await {
            if matches!(outcome, Outcome::Cancelled | Outcome::Finished) {
                break;
            }
        }
    })
    .await;
    if settled.is_err() {
        tracker_warn!("tracker did not confirm the cancellation in time");
    }
}

fn exit_code(outcome: Option<Outcome>) -> u8 {
    match outcome {
        Some(Outcome::Finished) => EXIT_COMPLETED,
        Some(Outcome::Failed(message)) => {
            tracker_warn!("job failed: {}", message);
            EXIT_FAILED
        }
        Some(Outcome::Cancelled) => EXIT_INTERRUPTED,
        None => EXIT_FAILED,
    }
}
