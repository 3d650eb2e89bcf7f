use crate::{JobId, JobStatus, StatusCounts, UnitProgress};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchViewModel {
    pub jobs: Vec<JobRowView>,
    pub counts: Option<StatusCounts>,
    pub progress_percent: Option<f64>,
    pub current: Option<CurrentView>,
    pub monitoring: bool,
    pub pending_requests: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub id: JobId,
    pub display_name: String,
    /// Effective status, optimistic override included.
    pub status: JobStatus,
    pub optimistic: bool,
    pub units: Option<UnitProgress>,
    pub unit_percent: Option<u8>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentView {
    pub job_id: JobId,
    pub display_name: String,
    pub units: UnitProgress,
}
