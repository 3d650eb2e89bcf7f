use std::sync::Once;

use evidence_core::{
    update, ActionId, BatchState, Effect, JobId, JobRecord, JobRequest, JobStatus, Msg,
    Notification, Severity,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(evidence_logging::initialize_for_tests);
}

fn loaded(jobs: Vec<JobRecord>) -> BatchState {
    let (state, effects) = update(BatchState::new(), Msg::JobsLoaded(jobs));
    assert!(effects.is_empty());
    state
}

fn three_pending() -> BatchState {
    loaded(vec![
        JobRecord::new("f1", "passport.pdf", JobStatus::Pending),
        JobRecord::new("f2", "org-chart.pdf", JobStatus::Pending),
        JobRecord::new("f3", "payroll.pdf", JobStatus::Pending),
    ])
}

fn sent_action(effects: &[Effect]) -> (ActionId, JobRequest) {
    effects
        .iter()
        .find_map(|effect| match effect {
            Effect::SendRequest { action_id, request } => Some((*action_id, request.clone())),
            _ => None,
        })
        .expect("send request effect")
}

fn status_of(state: &BatchState, id: &str) -> JobStatus {
    state
        .job(&JobId::new(id))
        .expect("job present")
        .effective_status()
}

#[test]
fn start_single_marks_queued_and_sends_request() {
    init_logging();
    let (mut state, effects) = update(three_pending(), Msg::StartSingle(JobId::new("f2")));

    let (_, request) = sent_action(&effects);
    assert_eq!(request, JobRequest::Start(JobId::new("f2")));
    assert_eq!(status_of(&state, "f2"), JobStatus::Queued);
    assert_eq!(status_of(&state, "f1"), JobStatus::Pending);
    assert_eq!(state.pending_requests(), 1);
    assert!(state.consume_dirty());
}

#[test]
fn accepted_start_activates_monitor_once() {
    init_logging();
    let (state, effects) = update(three_pending(), Msg::StartSingle(JobId::new("f1")));
    let (first, _) = sent_action(&effects);
    let (state, effects) = update(state, Msg::StartSingle(JobId::new("f2")));
    let (second, _) = sent_action(&effects);

    let (state, effects) = update(
        state,
        Msg::RequestAccepted {
            action_id: first,
            message: None,
        },
    );
    assert!(effects.contains(&Effect::StartMonitor));
    assert!(state.view().monitoring);

    let (state, effects) = update(
        state,
        Msg::RequestAccepted {
            action_id: second,
            message: Some("OCR started".into()),
        },
    );
    assert!(!effects.contains(&Effect::StartMonitor));
    assert!(effects.contains(&Effect::Notify(Notification::info("OCR started"))));
    assert_eq!(state.pending_requests(), 0);
}

#[test]
fn failed_start_rolls_back_optimistic_status() {
    init_logging();
    let (state, effects) = update(three_pending(), Msg::StartSingle(JobId::new("f1")));
    let (action_id, _) = sent_action(&effects);
    assert_eq!(status_of(&state, "f1"), JobStatus::Queued);

    let (state, effects) = update(
        state,
        Msg::RequestFailed {
            action_id,
            message: "http status 500".into(),
        },
    );

    assert_eq!(status_of(&state, "f1"), JobStatus::Pending);
    assert!(!state.view().monitoring);
    assert!(state.is_idle());
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "Failed to start processing passport.pdf: http status 500"
        ))]
    );
}

#[test]
fn start_single_on_failed_job_restarts_cycle() {
    init_logging();
    let state = loaded(vec![JobRecord::new("f1", "passport.pdf", JobStatus::Failed)]);
    let (state, effects) = update(state, Msg::StartSingle(JobId::new("f1")));

    assert_eq!(sent_action(&effects).1, JobRequest::Start(JobId::new("f1")));
    assert_eq!(status_of(&state, "f1"), JobStatus::Queued);
}

#[test]
fn start_single_skips_job_already_in_flight() {
    init_logging();
    let state = loaded(vec![JobRecord::new("f1", "passport.pdf", JobStatus::Processing)]);
    let (state, effects) = update(state, Msg::StartSingle(JobId::new("f1")));

    assert_eq!(state.pending_requests(), 0);
    assert!(matches!(
        effects.as_slice(),
        [Effect::Notify(Notification { severity: Severity::Warning, .. })]
    ));
}

#[test]
fn start_all_queues_every_startable_job() {
    init_logging();
    let state = loaded(vec![
        JobRecord::new("f1", "passport.pdf", JobStatus::Pending),
        JobRecord::new("f2", "org-chart.pdf", JobStatus::Completed),
        JobRecord::new("f3", "payroll.pdf", JobStatus::Failed),
    ]);
    let (state, effects) = update(state, Msg::StartAll { selected: None });

    assert_eq!(sent_action(&effects).1, JobRequest::StartBatch { selected: None });
    assert_eq!(status_of(&state, "f1"), JobStatus::Queued);
    assert_eq!(status_of(&state, "f2"), JobStatus::Completed);
    assert_eq!(status_of(&state, "f3"), JobStatus::Queued);
}

#[test]
fn start_all_with_selection_only_touches_selection() {
    init_logging();
    let selected = vec![JobId::new("f3")];
    let (state, effects) = update(
        three_pending(),
        Msg::StartAll {
            selected: Some(selected.clone()),
        },
    );

    assert_eq!(
        sent_action(&effects).1,
        JobRequest::StartBatch {
            selected: Some(selected)
        }
    );
    assert_eq!(status_of(&state, "f1"), JobStatus::Pending);
    assert_eq!(status_of(&state, "f3"), JobStatus::Queued);
}

#[test]
fn start_all_with_nothing_to_do_only_notifies() {
    init_logging();
    let state = loaded(vec![JobRecord::new("f1", "passport.pdf", JobStatus::Completed)]);
    let (state, effects) = update(state, Msg::StartAll { selected: None });

    assert_eq!(state.pending_requests(), 0);
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::info(
            "No documents are waiting to be processed"
        ))]
    );
}

#[test]
fn failed_batch_start_reports_file_count_and_reverts() {
    init_logging();
    let (state, effects) = update(three_pending(), Msg::StartAll { selected: None });
    let (action_id, _) = sent_action(&effects);

    let (state, effects) = update(
        state,
        Msg::RequestFailed {
            action_id,
            message: "network error".into(),
        },
    );

    for id in ["f1", "f2", "f3"] {
        assert_eq!(status_of(&state, id), JobStatus::Pending);
    }
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "Failed to start processing for 3 files: network error"
        ))]
    );
}

#[test]
fn pause_is_sent_even_when_job_is_not_processing() {
    init_logging();
    let (state, effects) = update(three_pending(), Msg::Pause(JobId::new("f1")));

    assert_eq!(sent_action(&effects).1, JobRequest::Pause(JobId::new("f1")));
    assert_eq!(status_of(&state, "f1"), JobStatus::Pending);
}

#[test]
fn control_failure_message_is_verbatim() {
    init_logging();
    let (state, effects) = update(three_pending(), Msg::Cancel(JobId::new("f1")));
    let (action_id, _) = sent_action(&effects);

    let (_state, effects) = update(
        state,
        Msg::RequestFailed {
            action_id,
            message: "No OCR job is running for this document".into(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::error(
            "No OCR job is running for this document"
        ))]
    );
}

#[test]
fn accepted_pause_does_not_start_monitor() {
    init_logging();
    let (state, effects) = update(three_pending(), Msg::Pause(JobId::new("f1")));
    let (action_id, _) = sent_action(&effects);
    let (state, effects) = update(
        state,
        Msg::RequestAccepted {
            action_id,
            message: Some("Will pause after the current page".into()),
        },
    );

    assert!(!state.view().monitoring);
    assert_eq!(
        effects,
        vec![Effect::Notify(Notification::info(
            "Will pause after the current page"
        ))]
    );
}

#[test]
fn resume_requires_paused_or_partial() {
    init_logging();
    let (state, effects) = update(three_pending(), Msg::Resume(JobId::new("f1")));
    assert_eq!(state.pending_requests(), 0);
    assert!(matches!(
        effects.as_slice(),
        [Effect::Notify(Notification { severity: Severity::Warning, .. })]
    ));

    let state = loaded(vec![
        JobRecord::new("f1", "passport.pdf", JobStatus::Paused),
        JobRecord::new("f2", "org-chart.pdf", JobStatus::Partial),
    ]);
    let (state, effects) = update(state, Msg::Resume(JobId::new("f2")));
    let (action_id, request) = sent_action(&effects);
    assert_eq!(request, JobRequest::Resume(JobId::new("f2")));
    assert_eq!(status_of(&state, "f2"), JobStatus::Queued);

    let (state, effects) = update(
        state,
        Msg::RequestAccepted {
            action_id,
            message: None,
        },
    );
    assert!(effects.contains(&Effect::StartMonitor));
    assert!(state.view().monitoring);
}

#[test]
fn stale_outcomes_are_ignored() {
    init_logging();
    let state = three_pending();
    let (next, effects) = update(
        state.clone(),
        Msg::RequestFailed {
            action_id: 42,
            message: "late".into(),
        },
    );

    assert_eq!(next, state);
    assert!(effects.is_empty());
}
