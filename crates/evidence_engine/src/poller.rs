use std::sync::Arc;
use std::time::Duration;

use evidence_core::ProgressSnapshot;
use evidence_logging::{evidence_debug, evidence_error, evidence_warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::SnapshotSource;
use crate::monitor::{MonitorSink, ProgressMonitor};
use crate::{MonitorEvent, Transport};

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    /// Wider interval used after a failed fetch.
    pub error_interval: Duration,
    /// Consecutive failures after which polling stops.
    pub max_errors: u32,
    /// Total time after which polling stops regardless of progress.
    pub max_duration: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            error_interval: Duration::from_secs(5),
            max_errors: 3,
            max_duration: Duration::from_secs(30 * 60),
        }
    }
}

/// Decides, from the latest snapshot, whether another poll is needed.
pub type ContinuePredicate = Arc<dyn Fn(&ProgressSnapshot) -> bool + Send + Sync>;

/// Fixed-interval snapshot polling, the fallback when no live stream is available.
///
/// Emits [`MonitorEvent::Snapshot`] per successful fetch and, once
/// `should_continue` turns false, one [`MonitorEvent::Completed`]. Ends with
/// exactly one [`MonitorEvent::MaxErrors`] or [`MonitorEvent::TimedOut`]
/// when the corresponding ceiling is reached.
///
/// `start` must be called from within a tokio runtime.
pub struct ProgressPoller {
    source: Arc<dyn SnapshotSource>,
    settings: PollSettings,
    sink: Arc<dyn MonitorSink>,
    should_continue: ContinuePredicate,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl ProgressPoller {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        settings: PollSettings,
        sink: Arc<dyn MonitorSink>,
    ) -> Self {
        Self {
            source,
            settings,
            sink,
            should_continue: Arc::new(|snapshot: &ProgressSnapshot| !snapshot.is_terminal()),
            cancel: None,
            task: None,
        }
    }

    pub fn with_continue_predicate(mut self, should_continue: ContinuePredicate) -> Self {
        self.should_continue = should_continue;
        self
    }

    /// Starts polling; no-op while already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let token = CancellationToken::new();
        let task = tokio::spawn(run_poller(
            self.source.clone(),
            self.settings.clone(),
            self.sink.clone(),
            self.should_continue.clone(),
            token.clone(),
        ));
        self.cancel = Some(token);
        self.task = Some(task);
    }

    /// Cancels the scheduled poll. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.task = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits until polling ends on its own or through `stop`.
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ProgressMonitor for ProgressPoller {
    fn start(&mut self) {
        ProgressPoller::start(self);
    }

    fn stop(&mut self) {
        ProgressPoller::stop(self);
    }

    fn is_active(&self) -> bool {
        self.is_running()
    }

    fn transport(&self) -> Transport {
        Transport::Poll
    }
}

async fn run_poller(
    source: Arc<dyn SnapshotSource>,
    settings: PollSettings,
    sink: Arc<dyn MonitorSink>,
    should_continue: ContinuePredicate,
    token: CancellationToken,
) {
    let started = Instant::now();
    let mut errors = 0u32;

    loop {
        let elapsed = started.elapsed();
        if elapsed >= settings.max_duration {
            evidence_error!("Polling timed out after {:?}", elapsed);
            sink.emit(MonitorEvent::TimedOut);
            return;
        }

        let fetched = tokio::select! {
            _ = token.cancelled() => return,
            fetched = source.fetch_snapshot() => fetched,
        };

        let delay = match fetched {
            Ok(snapshot) => {
                errors = 0;
                if !should_continue(&snapshot) {
                    sink.emit(MonitorEvent::Snapshot(snapshot.clone()));
                    sink.emit(MonitorEvent::Completed(snapshot));
                    return;
                }
                sink.emit(MonitorEvent::Snapshot(snapshot));
                settings.interval
            }
            Err(err) => {
                errors += 1;
                evidence_warn!(
                    "Progress poll failed ({}/{}): {}",
                    errors,
                    settings.max_errors,
                    err
                );
                if errors >= settings.max_errors {
                    evidence_error!("Giving up on progress polling after {} errors", errors);
                    sink.emit(MonitorEvent::MaxErrors);
                    return;
                }
                settings.error_interval
            }
        };

        // Never sleep past the deadline so the timeout fires on time.
        let remaining = settings.max_duration.saturating_sub(started.elapsed());
        let delay = delay.min(remaining);
        evidence_debug!("Next progress poll in {:?}", delay);
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
