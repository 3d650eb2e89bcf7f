use std::sync::Arc;
use std::time::Duration;

use evidence_core::ProgressSnapshot;
use evidence_logging::{evidence_debug, evidence_info, evidence_warn};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::monitor::{MonitorSink, ProgressMonitor};
use crate::sse::SseDecoder;
use crate::{MonitorEvent, Transport};

#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Delay before reconnecting; the server may override it with `retry:`.
    pub retry: Duration,
    pub connect_timeout: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            retry: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Server-sent-events subscription to a project's progress endpoint.
///
/// Every decoded snapshot is emitted as [`MonitorEvent::Snapshot`]. The
/// first terminal snapshot is followed by exactly one
/// [`MonitorEvent::Completed`], after which the connection is dropped.
/// Transport failures are reported as [`MonitorEvent::TransportError`] and
/// the stream reconnects after the retry delay; it never gives up on its own.
///
/// `connect` must be called from within a tokio runtime.
pub struct ProgressStream {
    url: Url,
    settings: StreamSettings,
    sink: Arc<dyn MonitorSink>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl ProgressStream {
    pub fn new(url: Url, settings: StreamSettings, sink: Arc<dyn MonitorSink>) -> Self {
        Self {
            url,
            settings,
            sink,
            cancel: None,
            task: None,
        }
    }

    /// Opens the connection; no-op while a connection task is alive.
    pub fn connect(&mut self) {
        if self.is_connected() {
            return;
        }
        let token = CancellationToken::new();
        let task = tokio::spawn(run_stream(
            self.url.clone(),
            self.settings.clone(),
            self.sink.clone(),
            token.clone(),
        ));
        self.cancel = Some(token);
        self.task = Some(task);
    }

    /// Closes the connection. Safe to call repeatedly or before `connect`.
    pub fn disconnect(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.task = None;
    }

    pub fn is_connected(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits for the connection task to end (terminal snapshot or `disconnect`).
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl ProgressMonitor for ProgressStream {
    fn start(&mut self) {
        self.connect();
    }

    fn stop(&mut self) {
        self.disconnect();
    }

    fn is_active(&self) -> bool {
        self.is_connected()
    }

    fn transport(&self) -> Transport {
        Transport::Stream
    }
}

enum StreamOutcome {
    Completed,
    /// Server closed the body before a terminal snapshot.
    Ended,
    Failed(String),
}

async fn run_stream(
    url: Url,
    settings: StreamSettings,
    sink: Arc<dyn MonitorSink>,
    token: CancellationToken,
) {
    let client = match reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            sink.emit(MonitorEvent::TransportError(err.to_string()));
            return;
        }
    };

    evidence_info!("Progress stream connecting to {}", url);
    let mut retry = settings.retry;
    loop {
        let outcome = tokio::select! {
            _ = token.cancelled() => return,
            outcome = read_stream(&client, &url, sink.as_ref(), &mut retry) => outcome,
        };

        match outcome {
            StreamOutcome::Completed => {
                evidence_info!("Progress stream reached a terminal snapshot");
                return;
            }
            StreamOutcome::Ended => {
                evidence_debug!("Progress stream closed by server; reconnecting in {:?}", retry);
            }
            StreamOutcome::Failed(message) => {
                evidence_warn!("Progress stream error: {}", message);
                sink.emit(MonitorEvent::TransportError(message));
            }
        }

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(retry) => {}
        }
    }
}

async fn read_stream(
    client: &reqwest::Client,
    url: &Url,
    sink: &dyn MonitorSink,
    retry: &mut Duration,
) -> StreamOutcome {
    let response = match client
        .get(url.clone())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => return StreamOutcome::Failed(err.to_string()),
    };

    let status = response.status();
    if !status.is_success() {
        return StreamOutcome::Failed(format!("http status {status}"));
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => return StreamOutcome::Failed(err.to_string()),
        };
        for event in decoder.push(&chunk) {
            if let Some(requested) = event.retry {
                *retry = requested;
            }
            if event.data.trim().is_empty() {
                continue;
            }
            let snapshot: ProgressSnapshot = match serde_json::from_str(&event.data) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    evidence_debug!(
                        "Ignoring non-snapshot event {:?}: {}",
                        event.event.as_deref().unwrap_or("message"),
                        err
                    );
                    continue;
                }
            };

            if snapshot.is_terminal() {
                sink.emit(MonitorEvent::Snapshot(snapshot.clone()));
                sink.emit(MonitorEvent::Completed(snapshot));
                return StreamOutcome::Completed;
            }
            sink.emit(MonitorEvent::Snapshot(snapshot));
        }
    }

    StreamOutcome::Ended
}
