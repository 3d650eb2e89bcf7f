use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one uploaded document, stable for the lifetime of its jobs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle of a single document job as reported by the backend.
///
/// Within one attempt the order is `Pending -> Queued -> Processing ->
/// Completed | Failed`. `Paused` and `Partial` are only left through an
/// explicit resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Partial,
    Paused,
    Cancelled,
}

impl JobStatus {
    /// Queued or processing: work the backend has accepted but not finished.
    pub fn is_in_flight(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Processing)
    }

    pub fn is_resumable(self) -> bool {
        matches!(self, JobStatus::Paused | JobStatus::Partial)
    }

    /// Statuses a start request may be issued from.
    pub fn is_startable(self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Partial => "partial",
            JobStatus::Paused => "paused",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fine-grained progress of the job currently being worked on (page N of M).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitProgress {
    pub current: u32,
    pub total: u32,
}

impl UnitProgress {
    /// Whole-number percentage, `None` while the total is still unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let pct = (u64::from(self.current) * 100 / u64::from(self.total)).min(100);
        Some(pct as u8)
    }
}

/// One document tracked by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(alias = "document_id")]
    pub id: JobId,
    #[serde(alias = "file_name", alias = "filename")]
    pub display_name: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(skip)]
    pub progress: Option<UnitProgress>,
    /// Optimistic status set by a user action; cleared by the next snapshot entry.
    #[serde(skip)]
    pub local_override: Option<JobStatus>,
}

impl JobRecord {
    pub fn new(id: impl Into<JobId>, display_name: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            status,
            error_message: None,
            progress: None,
            local_override: None,
        }
    }

    /// Status to display: the optimistic override if one is pending.
    pub fn effective_status(&self) -> JobStatus {
        self.local_override.unwrap_or(self.status)
    }
}

/// Aggregate counters per status; absent fields default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCounts {
    pub total: u32,
    pub pending: u32,
    pub queued: u32,
    pub processing: u32,
    pub completed: u32,
    pub failed: u32,
    pub partial: u32,
    pub paused: u32,
    pub cancelled: u32,
}

impl StatusCounts {
    /// Jobs the backend still has to do something about.
    pub fn active(&self) -> u32 {
        self.pending + self.queued + self.processing
    }
}

/// The single job the backend reports page-level detail for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentlyProcessing {
    #[serde(alias = "document_id")]
    pub job_id: JobId,
    #[serde(default, alias = "file_name", alias = "filename")]
    pub display_name: Option<String>,
    #[serde(default, alias = "current_page")]
    pub current_unit: u32,
    #[serde(default, alias = "total_pages")]
    pub total_units: u32,
}

impl CurrentlyProcessing {
    pub fn unit_progress(&self) -> UnitProgress {
        UnitProgress {
            current: self.current_unit,
            total: self.total_units,
        }
    }
}

/// Per-job entry of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    #[serde(alias = "document_id")]
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Point-in-time view of a whole batch, received wholesale from the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(flatten)]
    pub counts: StatusCounts,
    #[serde(default)]
    pub progress_percent: f64,
    #[serde(default, alias = "current_processing")]
    pub currently_processing: Option<CurrentlyProcessing>,
    #[serde(default)]
    pub documents: Vec<DocumentStatus>,
}

impl ProgressSnapshot {
    /// Nothing pending, queued or processing: the batch has nothing left to do.
    pub fn is_terminal(&self) -> bool {
        self.counts.active() == 0
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary::from(&self.counts)
    }
}

/// Completion summary shown once per monitored batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub completed: u32,
    pub failed: u32,
    pub partial: u32,
    pub cancelled: u32,
}

impl From<&StatusCounts> for BatchSummary {
    fn from(counts: &StatusCounts) -> Self {
        Self {
            completed: counts.completed,
            failed: counts.failed,
            partial: counts.partial,
            cancelled: counts.cancelled,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} completed, {} failed", self.completed, self.failed)?;
        if self.partial > 0 {
            write!(f, ", {} partial", self.partial)?;
        }
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// User-facing message produced by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub text: String,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }
}
