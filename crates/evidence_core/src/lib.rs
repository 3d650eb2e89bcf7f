//! Evidence core: pure job-monitor state machine, reconciler and view-model helpers.
mod effect;
mod msg;
mod reconcile;
mod state;
mod types;
mod update;
mod view_model;

pub use effect::{ActionId, Effect, JobRequest};
pub use msg::{MonitorFailure, Msg};
pub use reconcile::reconcile;
pub use state::{BatchState, MonitorPhase};
pub use types::{
    BatchSummary, CurrentlyProcessing, DocumentStatus, JobId, JobRecord, JobStatus, Notification,
    ProgressSnapshot, Severity, StatusCounts, UnitProgress,
};
pub use update::update;
pub use view_model::{BatchViewModel, CurrentView, JobRowView};
