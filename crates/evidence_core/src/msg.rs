use crate::{JobId, JobRecord, ProgressSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Authoritative job list (initial load or post-completion refresh).
    JobsLoaded(Vec<JobRecord>),
    /// The job list could not be refreshed.
    RefreshFailed(String),
    /// User asked to process one document.
    StartSingle(JobId),
    /// User asked to process a selection, or every pending document when `None`.
    StartAll { selected: Option<Vec<JobId>> },
    /// User asked to pause the document currently being processed.
    Pause(JobId),
    /// User asked to cancel the document currently being processed.
    Cancel(JobId),
    /// User asked to resume a paused or partial document.
    Resume(JobId),
    /// Follow the project's progress without issuing a request.
    Watch,
    /// Backend accepted a request issued through `Effect::SendRequest`.
    RequestAccepted {
        action_id: crate::ActionId,
        message: Option<String>,
    },
    /// Backend rejected a request, or it never reached the backend.
    RequestFailed {
        action_id: crate::ActionId,
        message: String,
    },
    /// Snapshot from the active monitor, terminal ones included.
    Snapshot(ProgressSnapshot),
    /// Terminal snapshot; the monitor has stopped itself.
    MonitorCompleted(ProgressSnapshot),
    /// The monitor gave up.
    MonitorFailed(MonitorFailure),
    /// The live stream keeps failing without a fallback; monitoring continues.
    MonitorStalled { errors: u32, message: String },
    /// Render tick.
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorFailure {
    /// Consecutive poll failures reached the configured ceiling.
    MaxErrors,
    /// Monitoring exceeded its maximum duration.
    TimedOut,
}
