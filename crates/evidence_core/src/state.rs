use std::collections::BTreeMap;
use std::sync::Arc;

use crate::reconcile::reconcile;
use crate::view_model::{BatchViewModel, CurrentView, JobRowView};
use crate::{
    ActionId, CurrentlyProcessing, JobId, JobRecord, JobRequest, JobStatus, ProgressSnapshot,
    StatusCounts,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorPhase {
    #[default]
    Idle,
    Active,
}

/// A request in flight together with the optimistic changes it made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingAction {
    pub(crate) request: JobRequest,
    pub(crate) applied: JobStatus,
    /// Jobs that received the optimistic status, with their previous override.
    pub(crate) overrides: Vec<(JobId, Option<JobStatus>)>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchState {
    jobs: Arc<Vec<JobRecord>>,
    current: Option<CurrentlyProcessing>,
    counts: Option<StatusCounts>,
    progress_percent: Option<f64>,
    monitor: MonitorPhase,
    next_action_id: ActionId,
    pending: BTreeMap<ActionId, PendingAction>,
    dirty: bool,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: Vec<JobRecord>) -> Self {
        Self {
            jobs: Arc::new(jobs),
            ..Self::default()
        }
    }

    /// Shared job list; the pointer only changes when a record changed.
    pub fn jobs(&self) -> &Arc<Vec<JobRecord>> {
        &self.jobs
    }

    pub fn job(&self, id: &JobId) -> Option<&JobRecord> {
        self.jobs.iter().find(|job| &job.id == id)
    }

    pub fn monitor(&self) -> MonitorPhase {
        self.monitor
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// No monitor running and no request awaiting an answer.
    pub fn is_idle(&self) -> bool {
        self.monitor == MonitorPhase::Idle && self.pending.is_empty()
    }

    pub fn view(&self) -> BatchViewModel {
        let jobs = self
            .jobs
            .iter()
            .map(|job| JobRowView {
                id: job.id.clone(),
                display_name: job.display_name.clone(),
                status: job.effective_status(),
                optimistic: job.local_override.is_some(),
                units: job.progress,
                unit_percent: job.progress.and_then(|progress| progress.percent()),
                error_message: job.error_message.clone(),
            })
            .collect();

        BatchViewModel {
            jobs,
            counts: self.counts,
            progress_percent: self.progress_percent,
            current: self.current.as_ref().map(|current| CurrentView {
                job_id: current.job_id.clone(),
                display_name: current
                    .display_name
                    .clone()
                    .or_else(|| self.job(&current.job_id).map(|job| job.display_name.clone()))
                    .unwrap_or_else(|| current.job_id.to_string()),
                units: current.unit_progress(),
            }),
            monitoring: self.monitor == MonitorPhase::Active,
            pending_requests: self.pending.len(),
            dirty: self.dirty,
        }
    }

    /// Returns whether anything visible changed since the last call.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_monitor(&mut self, phase: MonitorPhase) {
        if self.monitor != phase {
            self.monitor = phase;
            self.dirty = true;
        }
    }

    pub(crate) fn replace_jobs(&mut self, jobs: Vec<JobRecord>) {
        self.jobs = Arc::new(jobs);
        self.dirty = true;
    }

    /// Applies a snapshot; returns whether any job record changed.
    pub(crate) fn apply_snapshot(&mut self, snapshot: &ProgressSnapshot) -> bool {
        let next = reconcile(&self.jobs, snapshot);
        let jobs_changed = !Arc::ptr_eq(&next, &self.jobs);
        self.jobs = next;

        let progress_percent = Some(snapshot.progress_percent);
        if jobs_changed
            || self.current != snapshot.currently_processing
            || self.counts != Some(snapshot.counts)
            || self.progress_percent != progress_percent
        {
            self.dirty = true;
        }
        self.current = snapshot.currently_processing.clone();
        self.counts = Some(snapshot.counts);
        self.progress_percent = progress_percent;
        jobs_changed
    }

    /// Sets an optimistic status on every known id in `ids`.
    pub(crate) fn set_overrides(
        &mut self,
        ids: &[JobId],
        status: JobStatus,
    ) -> Vec<(JobId, Option<JobStatus>)> {
        let mut previous = Vec::new();
        let jobs = Arc::make_mut(&mut self.jobs);
        for job in jobs.iter_mut().filter(|job| ids.contains(&job.id)) {
            previous.push((job.id.clone(), job.local_override));
            job.local_override = Some(status);
        }
        if !previous.is_empty() {
            self.dirty = true;
        }
        previous
    }

    /// Undoes an action's optimistic changes that no snapshot has superseded yet.
    pub(crate) fn rollback(&mut self, action: &PendingAction) {
        if action.overrides.is_empty() {
            return;
        }
        let jobs = Arc::make_mut(&mut self.jobs);
        for (id, previous) in &action.overrides {
            if let Some(job) = jobs.iter_mut().find(|job| &job.id == id) {
                if job.local_override == Some(action.applied) {
                    job.local_override = *previous;
                    self.dirty = true;
                }
            }
        }
    }

    /// Puts every queued or processing job back to pending after the monitor gave up.
    pub(crate) fn revert_in_flight(&mut self) -> usize {
        let mut reverted = 0;
        if self.jobs.iter().any(|job| job.effective_status().is_in_flight()) {
            let jobs = Arc::make_mut(&mut self.jobs);
            for job in jobs
                .iter_mut()
                .filter(|job| job.effective_status().is_in_flight())
            {
                job.status = JobStatus::Pending;
                job.local_override = None;
                job.progress = None;
                reverted += 1;
            }
            self.dirty = true;
        }
        if self.current.take().is_some() {
            self.dirty = true;
        }
        reverted
    }

    pub(crate) fn begin_action(
        &mut self,
        request: JobRequest,
        applied: JobStatus,
        overrides: Vec<(JobId, Option<JobStatus>)>,
    ) -> ActionId {
        self.next_action_id += 1;
        let action_id = self.next_action_id;
        self.pending.insert(
            action_id,
            PendingAction {
                request,
                applied,
                overrides,
            },
        );
        self.dirty = true;
        action_id
    }

    pub(crate) fn finish_action(&mut self, action_id: ActionId) -> Option<PendingAction> {
        let action = self.pending.remove(&action_id);
        if action.is_some() {
            self.dirty = true;
        }
        action
    }
}
