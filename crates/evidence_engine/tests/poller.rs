use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use evidence_core::{ProgressSnapshot, StatusCounts};
use evidence_engine::{
    ApiError, FailureKind, MonitorEvent, MonitorSink, PollSettings, ProgressPoller,
    SnapshotSource,
};
use tokio::time::Instant;

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<MonitorEvent>>,
}

impl TestSink {
    fn events(&self) -> Vec<MonitorEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl MonitorSink for TestSink {
    fn emit(&self, event: MonitorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Replays scripted results; repeats `fallback` once the script runs out.
struct ScriptedSource {
    script: Mutex<VecDeque<Result<ProgressSnapshot, ApiError>>>,
    fallback: Result<ProgressSnapshot, ApiError>,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedSource {
    fn new(
        script: Vec<Result<ProgressSnapshot, ApiError>>,
        fallback: Result<ProgressSnapshot, ApiError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<ProgressSnapshot, ApiError> {
        self.calls.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

fn active() -> ProgressSnapshot {
    ProgressSnapshot {
        counts: StatusCounts {
            processing: 1,
            pending: 1,
            ..StatusCounts::default()
        },
        ..ProgressSnapshot::default()
    }
}

fn terminal() -> ProgressSnapshot {
    ProgressSnapshot {
        counts: StatusCounts {
            completed: 2,
            ..StatusCounts::default()
        },
        ..ProgressSnapshot::default()
    }
}

/// Paused-clock timers round up to the next millisecond.
fn assert_gap(earlier: Instant, later: Instant, expected: Duration) {
    let gap = later - earlier;
    assert!(
        gap >= expected && gap < expected + Duration::from_millis(10),
        "gap {gap:?}, expected {expected:?}"
    );
}

fn unreachable() -> ApiError {
    ApiError::new(FailureKind::Network, "connection refused")
}

fn settings() -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(2),
        error_interval: Duration::from_secs(5),
        max_errors: 3,
        max_duration: Duration::from_secs(60),
    }
}

#[tokio::test(start_paused = true)]
async fn stops_after_terminal_snapshot() {
    let source = ScriptedSource::new(vec![Ok(active()), Ok(active())], Ok(terminal()));
    let sink = Arc::new(TestSink::default());
    let mut poller = ProgressPoller::new(source.clone(), settings(), sink.clone());

    poller.start();
    poller.finished().await;

    let events = sink.events();
    assert_eq!(events.len(), 4);
    assert!(matches!(events[3], MonitorEvent::Completed(_)));
    assert_eq!(source.call_times().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_consecutive_errors() {
    let source = ScriptedSource::new(Vec::new(), Err(unreachable()));
    let sink = Arc::new(TestSink::default());
    let mut poller = ProgressPoller::new(source.clone(), settings(), sink.clone());

    poller.start();
    poller.finished().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(sink.events(), vec![MonitorEvent::MaxErrors]);
    let calls = source.call_times();
    assert_eq!(calls.len(), 3);
    assert_gap(calls[0], calls[1], Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn success_resets_error_count_and_interval() {
    let source = ScriptedSource::new(
        vec![
            Err(unreachable()),
            Err(unreachable()),
            Ok(active()),
            Err(unreachable()),
            Err(unreachable()),
            Ok(active()),
        ],
        Ok(terminal()),
    );
    let sink = Arc::new(TestSink::default());
    let mut poller = ProgressPoller::new(source.clone(), settings(), sink.clone());

    poller.start();
    poller.finished().await;

    assert!(!sink.events().contains(&MonitorEvent::MaxErrors));
    assert!(matches!(sink.events().last(), Some(MonitorEvent::Completed(_))));
    let calls = source.call_times();
    assert_eq!(calls.len(), 7);
    assert_gap(calls[2], calls[3], Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn times_out_once_when_work_never_finishes() {
    let source = ScriptedSource::new(Vec::new(), Ok(active()));
    let sink = Arc::new(TestSink::default());
    let settings = PollSettings {
        max_duration: Duration::from_secs(10),
        ..settings()
    };
    let mut poller = ProgressPoller::new(source.clone(), settings, sink.clone());

    poller.start();
    poller.finished().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    let events = sink.events();
    let timeouts = events
        .iter()
        .filter(|event| **event == MonitorEvent::TimedOut)
        .count();
    assert_eq!(timeouts, 1);
    assert_eq!(events.last(), Some(&MonitorEvent::TimedOut));
    assert_eq!(source.call_times().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn custom_predicate_decides_when_to_stop() {
    let source = ScriptedSource::new(Vec::new(), Ok(active()));
    let sink = Arc::new(TestSink::default());
    let mut poller = ProgressPoller::new(source.clone(), settings(), sink.clone())
        .with_continue_predicate(Arc::new(|snapshot: &ProgressSnapshot| {
            snapshot.counts.processing > 1
        }));

    poller.start();
    poller.finished().await;

    assert_eq!(source.call_times().len(), 1);
    assert!(matches!(sink.events().last(), Some(MonitorEvent::Completed(_))));
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_halts_polling() {
    let source = ScriptedSource::new(Vec::new(), Ok(active()));
    let sink = Arc::new(TestSink::default());
    let mut poller = ProgressPoller::new(source.clone(), settings(), sink.clone());

    poller.stop();
    poller.start();
    tokio::time::sleep(Duration::from_secs(3)).await;
    poller.stop();
    poller.stop();
    assert!(!poller.is_running());

    let seen = source.call_times().len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.call_times().len(), seen);
    assert!(sink.events().iter().all(|event| !event.is_final()));
}
