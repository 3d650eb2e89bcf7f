use crate::state::{MonitorPhase, PendingAction};
use crate::{
    BatchState, Effect, JobId, JobRequest, JobStatus, MonitorFailure, Msg, Notification,
    ProgressSnapshot,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: BatchState, msg: Msg) -> (BatchState, Vec<Effect>) {
    let effects = match msg {
        Msg::JobsLoaded(jobs) => {
            state.replace_jobs(jobs);
            Vec::new()
        }
        Msg::RefreshFailed(message) => vec![Effect::Notify(Notification::warning(format!(
            "Could not refresh documents: {message}"
        )))],
        Msg::StartSingle(job_id) => start_single(&mut state, job_id),
        Msg::StartAll { selected } => start_all(&mut state, selected),
        Msg::Pause(job_id) => send_control(&mut state, JobRequest::Pause(job_id)),
        Msg::Cancel(job_id) => send_control(&mut state, JobRequest::Cancel(job_id)),
        Msg::Resume(job_id) => resume(&mut state, job_id),
        Msg::Watch => {
            if state.monitor() == MonitorPhase::Idle {
                state.set_monitor(MonitorPhase::Active);
                vec![Effect::StartMonitor]
            } else {
                Vec::new()
            }
        }
        Msg::RequestAccepted { action_id, message } => match state.finish_action(action_id) {
            Some(action) => request_accepted(&mut state, action, message),
            None => Vec::new(),
        },
        Msg::RequestFailed { action_id, message } => match state.finish_action(action_id) {
            Some(action) => {
                state.rollback(&action);
                vec![Effect::Notify(Notification::error(failure_text(
                    &state, &action, &message,
                )))]
            }
            None => Vec::new(),
        },
        Msg::Snapshot(snapshot) => {
            state.apply_snapshot(&snapshot);
            Vec::new()
        }
        Msg::MonitorCompleted(snapshot) => monitor_completed(&mut state, &snapshot),
        Msg::MonitorFailed(failure) => monitor_failed(&mut state, failure),
        Msg::MonitorStalled { errors, message } => {
            if state.monitor() == MonitorPhase::Active {
                vec![Effect::Notify(Notification::warning(format!(
                    "Live progress failed {errors} times in a row ({message}); still retrying"
                )))]
            } else {
                Vec::new()
            }
        }
        Msg::Tick => Vec::new(),
    };

    (state, effects)
}

fn start_single(state: &mut BatchState, job_id: JobId) -> Vec<Effect> {
    if let Some(job) = state.job(&job_id) {
        let status = job.effective_status();
        if status.is_in_flight() {
            return vec![Effect::Notify(Notification::warning(format!(
                "{} is already {status}",
                job.display_name
            )))];
        }
    }

    let overrides = state.set_overrides(std::slice::from_ref(&job_id), JobStatus::Queued);
    let request = JobRequest::Start(job_id);
    let action_id = state.begin_action(request.clone(), JobStatus::Queued, overrides);
    vec![Effect::SendRequest { action_id, request }]
}

fn start_all(state: &mut BatchState, selected: Option<Vec<JobId>>) -> Vec<Effect> {
    let targets: Vec<JobId> = state
        .jobs()
        .iter()
        .filter(|job| job.effective_status().is_startable())
        .filter(|job| {
            selected
                .as_ref()
                .is_none_or(|selected| selected.contains(&job.id))
        })
        .map(|job| job.id.clone())
        .collect();

    if targets.is_empty() && selected.as_ref().is_none_or(Vec::is_empty) {
        return vec![Effect::Notify(Notification::info(
            "No documents are waiting to be processed",
        ))];
    }

    let overrides = state.set_overrides(&targets, JobStatus::Queued);
    let request = JobRequest::StartBatch { selected };
    let action_id = state.begin_action(request.clone(), JobStatus::Queued, overrides);
    vec![Effect::SendRequest { action_id, request }]
}

/// Pause and cancel are always sent; the next snapshot decides what happened.
fn send_control(state: &mut BatchState, request: JobRequest) -> Vec<Effect> {
    let action_id = state.begin_action(request.clone(), JobStatus::Pending, Vec::new());
    vec![Effect::SendRequest { action_id, request }]
}

fn resume(state: &mut BatchState, job_id: JobId) -> Vec<Effect> {
    let Some(job) = state.job(&job_id) else {
        return vec![Effect::Notify(Notification::warning(format!(
            "Cannot resume unknown document {job_id}"
        )))];
    };
    let status = job.effective_status();
    if !status.is_resumable() {
        return vec![Effect::Notify(Notification::warning(format!(
            "Cannot resume {}: it is {status}",
            job.display_name
        )))];
    }

    let overrides = state.set_overrides(std::slice::from_ref(&job_id), JobStatus::Queued);
    let request = JobRequest::Resume(job_id);
    let action_id = state.begin_action(request.clone(), JobStatus::Queued, overrides);
    vec![Effect::SendRequest { action_id, request }]
}

fn request_accepted(
    state: &mut BatchState,
    action: PendingAction,
    message: Option<String>,
) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(2);
    if action.request.starts_work() && state.monitor() == MonitorPhase::Idle {
        state.set_monitor(MonitorPhase::Active);
        effects.push(Effect::StartMonitor);
    }

    let text = message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| accepted_text(state, &action));
    effects.push(Effect::Notify(Notification::info(text)));
    effects
}

fn monitor_completed(state: &mut BatchState, snapshot: &ProgressSnapshot) -> Vec<Effect> {
    state.apply_snapshot(snapshot);
    if state.monitor() == MonitorPhase::Idle {
        return Vec::new();
    }
    state.set_monitor(MonitorPhase::Idle);
    vec![
        Effect::StopMonitor,
        Effect::RefreshJobs,
        Effect::Notify(Notification::info(snapshot.summary().to_string())),
    ]
}

fn monitor_failed(state: &mut BatchState, failure: MonitorFailure) -> Vec<Effect> {
    if state.monitor() == MonitorPhase::Idle {
        return Vec::new();
    }
    state.set_monitor(MonitorPhase::Idle);
    state.revert_in_flight();
    let text = match failure {
        MonitorFailure::MaxErrors => "Cannot reach backend; processing status is unknown",
        MonitorFailure::TimedOut => "Processing timed out, check backend",
    };
    vec![Effect::StopMonitor, Effect::Notify(Notification::error(text))]
}

fn name_of(state: &BatchState, job_id: &JobId) -> String {
    state
        .job(job_id)
        .map(|job| job.display_name.clone())
        .unwrap_or_else(|| job_id.to_string())
}

fn accepted_text(state: &BatchState, action: &PendingAction) -> String {
    match &action.request {
        JobRequest::Start(job_id) => format!("Started processing {}", name_of(state, job_id)),
        JobRequest::StartBatch { .. } => {
            format!("Started processing {} files", action.overrides.len())
        }
        JobRequest::Pause(job_id) => format!("Pause requested for {}", name_of(state, job_id)),
        JobRequest::Cancel(job_id) => format!("Cancel requested for {}", name_of(state, job_id)),
        JobRequest::Resume(job_id) => format!("Resumed {}", name_of(state, job_id)),
    }
}

fn failure_text(state: &BatchState, action: &PendingAction, message: &str) -> String {
    match &action.request {
        JobRequest::Start(job_id) => format!(
            "Failed to start processing {}: {message}",
            name_of(state, job_id)
        ),
        JobRequest::StartBatch { .. } => format!(
            "Failed to start processing for {} files: {message}",
            action.overrides.len()
        ),
        // Control failures are surfaced verbatim.
        JobRequest::Pause(_) | JobRequest::Cancel(_) | JobRequest::Resume(_) => message.to_string(),
    }
}
