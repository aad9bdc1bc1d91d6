//! Tracker engine: async transports and effect execution for `tracker_core`.
mod effects;
mod fetch;
mod poller;
mod sse;
mod stream;
mod subscription;
mod tracker;
mod types;

pub use fetch::{FetchSettings, ReqwestStatusFetcher, StatusFetcher};
pub use poller::{JobStatusPoller, PollSettings, PollSink};
pub use sse::SseDecoder;
pub use stream::{
    decode_sse, describe_event, EventSource, EventStream, JobEventStream, SseEventSource,
    StreamSettings, StreamSink,
};
pub use subscription::{after, every, Subscription};
pub use tracker::{HttpSetupError, JobTracker, TrackerDeps, ViewSubscription};
pub use types::{FailureKind, FetchError, StatusResponse, StreamError, WireEvent};
