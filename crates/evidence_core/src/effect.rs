use crate::{JobId, Notification};

/// Correlates a backend request with its eventual outcome message.
pub type ActionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue a trigger or control request; the outcome comes back as
    /// `Msg::RequestAccepted` or `Msg::RequestFailed` with the same id.
    SendRequest { action_id: ActionId, request: JobRequest },
    /// Activate the progress monitor (stream or poller).
    StartMonitor,
    StopMonitor,
    /// Fetch the authoritative job list.
    RefreshJobs,
    Notify(Notification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Start(JobId),
    /// Project-wide batch; `None` lets the backend pick every pending document.
    StartBatch { selected: Option<Vec<JobId>> },
    Pause(JobId),
    Cancel(JobId),
    Resume(JobId),
}

impl JobRequest {
    /// Whether acceptance of this request means new work for the monitor.
    pub fn starts_work(&self) -> bool {
        matches!(
            self,
            JobRequest::Start(_) | JobRequest::StartBatch { .. } | JobRequest::Resume(_)
        )
    }
}
