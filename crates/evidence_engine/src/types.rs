use std::fmt;

use evidence_core::{ActionId, JobRecord, ProgressSnapshot};
use thiserror::Error;

/// What a progress monitor reports to its sink.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    Snapshot(ProgressSnapshot),
    /// Terminal snapshot; emitted once, after which the monitor stops.
    Completed(ProgressSnapshot),
    /// Transient transport problem; the monitor keeps running.
    TransportError(String),
    /// The poller hit its consecutive-error ceiling.
    MaxErrors,
    /// The poller ran longer than its maximum duration.
    TimedOut,
}

impl MonitorEvent {
    /// Events after which the emitting monitor has stopped itself.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            MonitorEvent::Completed(_) | MonitorEvent::MaxErrors | MonitorEvent::TimedOut
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stream,
    Poll,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stream => write!(f, "stream"),
            Transport::Poll => write!(f, "poll"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Outcome of a trigger or control request; `Ok` carries the backend message.
    RequestCompleted {
        action_id: ActionId,
        result: Result<Option<String>, ApiError>,
    },
    Monitor(MonitorEvent),
    /// The live stream keeps failing and cannot fall back to polling; it keeps retrying.
    MonitorStalled { errors: u32, message: String },
    JobsRefreshed(Result<Vec<JobRecord>, ApiError>),
    /// The engine could not start and will not process commands.
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
    /// The backend answered `success: false`.
    Rejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Rejected => write!(f, "rejected"),
        }
    }
}
