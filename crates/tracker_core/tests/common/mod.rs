#![allow(dead_code)]

use std::sync::Once;
use std::time::Duration;

use tracker_core::{
    update, Effect, JobDescriptor, Milestone, MilestoneTable, Msg, PollEvent, StatusUpdate,
    StreamEvent, StreamSignal, TrackerConfig, TrackerState, Transport,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tracker_logging::initialize_for_tests);
}

pub fn quarter_milestones() -> MilestoneTable {
    MilestoneTable::new(vec![
        Milestone::new(0, "Queued"),
        Milestone::new(25, "Discovering"),
        Milestone::new(50, "Parsing"),
        Milestone::new(75, "Analyzing"),
        Milestone::new(100, "Done"),
    ])
    .expect("valid table")
}

pub fn descriptor(transport: Transport) -> JobDescriptor {
    JobDescriptor::new("job-1", quarter_milestones())
        .with_transport(transport)
        .with_poll_interval(Duration::from_millis(500))
}

pub fn started(transport: Transport) -> (TrackerState, Vec<Effect>) {
    let config = TrackerConfig {
        long_running_after: Duration::from_secs(30),
        hand_off_window: Duration::from_millis(2500),
    };
    update(
        TrackerState::new(config),
        Msg::Start(Box::new(descriptor(transport))),
    )
}

pub fn poll(state: TrackerState, status: StatusUpdate) -> (TrackerState, Vec<Effect>) {
    let generation = state.generation();
    update(
        state,
        Msg::Poll {
            generation,
            event: PollEvent::Status(status),
        },
    )
}

pub fn stream(state: TrackerState, signal: StreamSignal) -> (TrackerState, Vec<Effect>) {
    let generation = state.generation();
    update(state, Msg::Stream { generation, signal })
}

pub fn stream_event(state: TrackerState, event: StreamEvent) -> (TrackerState, Vec<Effect>) {
    stream(state, StreamSignal::Event(event))
}

pub fn tick(state: TrackerState, times: u32) -> TrackerState {
    (0..times).fold(state, |state, _| {
        let generation = state.generation();
        update(state, Msg::Tick { generation }).0
    })
}
