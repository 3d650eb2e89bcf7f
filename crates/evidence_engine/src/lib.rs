//! Evidence engine: backend client, progress transports and effect execution.
mod client;
mod engine;
mod monitor;
mod poller;
mod sse;
mod stream;
mod types;

pub use client::{BackendSettings, JobsApi, ReqwestJobsApi, SnapshotSource};
pub use engine::{EngineConfig, EngineHandle};
pub use monitor::{
    ChannelMonitorSink, MonitorFactory, MonitorSession, MonitorSink, ProgressMonitor, SessionId,
    SessionVerdict, TransportCapabilities, TransportPreference, STALL_WARNING_AFTER,
};
pub use poller::{ContinuePredicate, PollSettings, ProgressPoller};
pub use sse::{SseDecoder, SseEvent};
pub use stream::{ProgressStream, StreamSettings};
pub use types::{ApiError, EngineEvent, FailureKind, MonitorEvent, Transport};
