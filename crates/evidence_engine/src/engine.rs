use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use evidence_core::{ActionId, JobRequest};
use evidence_logging::{evidence_debug, evidence_error, evidence_info};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::client::{BackendSettings, JobsApi, ReqwestJobsApi, SnapshotSource};
use crate::monitor::{
    ChannelMonitorSink, MonitorFactory, MonitorSession, SessionId, SessionVerdict,
    TransportCapabilities, TransportPreference,
};
use crate::poller::PollSettings;
use crate::stream::StreamSettings;
use crate::{EngineEvent, MonitorEvent};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: BackendSettings,
    pub project_id: String,
    pub transport: TransportPreference,
    pub stream: StreamSettings,
    pub poll: PollSettings,
    pub fallback_after_errors: u32,
}

impl EngineConfig {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            backend: BackendSettings::default(),
            project_id: project_id.into(),
            transport: TransportPreference::Auto,
            stream: StreamSettings::default(),
            poll: PollSettings::default(),
            fallback_after_errors: 3,
        }
    }
}

enum EngineCommand {
    Send { action_id: ActionId, request: JobRequest },
    StartMonitor,
    StopMonitor,
    RefreshJobs,
}

/// Runs backend IO on a dedicated thread with its own tokio runtime.
///
/// Commands are fire-and-forget; every outcome comes back as an
/// [`EngineEvent`] through [`EngineHandle::try_recv`] or
/// [`EngineHandle::recv_timeout`].
pub struct EngineHandle {
    cmd_tx: UnboundedSender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig) -> Self {
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = event_tx.send(EngineEvent::Unavailable(format!(
                        "cannot start async runtime: {err}"
                    )));
                    return;
                }
            };
            runtime.block_on(run_engine(config, cmd_rx, event_tx));
        });

        Self { cmd_tx, event_rx }
    }

    pub fn send_request(&self, action_id: ActionId, request: JobRequest) {
        let _ = self.cmd_tx.send(EngineCommand::Send { action_id, request });
    }

    pub fn start_monitor(&self) {
        let _ = self.cmd_tx.send(EngineCommand::StartMonitor);
    }

    pub fn stop_monitor(&self) {
        let _ = self.cmd_tx.send(EngineCommand::StopMonitor);
    }

    pub fn refresh_jobs(&self) {
        let _ = self.cmd_tx.send(EngineCommand::RefreshJobs);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn run_engine(
    config: EngineConfig,
    mut cmd_rx: UnboundedReceiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let api = match ReqwestJobsApi::new(&config.backend, config.project_id.clone()) {
        Ok(api) => Arc::new(api),
        Err(err) => {
            evidence_error!("Backend client unavailable: {}", err);
            let _ = event_tx.send(EngineEvent::Unavailable(err.to_string()));
            return;
        }
    };
    let stream_url = match api.stream_url() {
        Ok(url) => url,
        Err(err) => {
            let _ = event_tx.send(EngineEvent::Unavailable(err.to_string()));
            return;
        }
    };

    let source: Arc<dyn SnapshotSource> = api.clone();
    let factory = MonitorFactory::new(
        stream_url,
        source,
        config.stream.clone(),
        config.poll.clone(),
        TransportCapabilities::probe(config.transport),
        config.fallback_after_errors,
    );
    evidence_info!(
        "Engine ready for project {} at {}",
        api.project_id(),
        config.backend.base_url
    );

    let (monitor_tx, mut monitor_rx) = unbounded_channel::<(SessionId, MonitorEvent)>();
    let mut session: Option<MonitorSession> = None;
    let mut next_session: SessionId = 0;

    loop {
        tokio::select! {
            command = cmd_rx.recv() => {
                let Some(command) = command else { break };
                match command {
                    EngineCommand::Send { action_id, request } => {
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        tokio::spawn(async move {
                            let result = api.send(&request).await;
                            let _ = event_tx.send(EngineEvent::RequestCompleted { action_id, result });
                        });
                    }
                    EngineCommand::RefreshJobs => {
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        tokio::spawn(async move {
                            let result = api.list_jobs().await;
                            let _ = event_tx.send(EngineEvent::JobsRefreshed(result));
                        });
                    }
                    EngineCommand::StartMonitor => {
                        if session.is_none() {
                            next_session += 1;
                            let sink = Arc::new(ChannelMonitorSink::new(next_session, monitor_tx.clone()));
                            session = Some(MonitorSession::start(next_session, &factory, sink));
                        }
                    }
                    EngineCommand::StopMonitor => {
                        if let Some(mut finished) = session.take() {
                            finished.stop();
                            evidence_debug!(
                                "Monitor session {} stopped after {:?}",
                                finished.id(),
                                finished.elapsed()
                            );
                        }
                    }
                }
            }
            Some((session_id, event)) = monitor_rx.recv() => {
                let Some(active) = session.as_mut().filter(|active| active.id() == session_id) else {
                    evidence_debug!("Dropping event from stale monitor session {}", session_id);
                    continue;
                };
                let verdict = active.observe(&event, &factory);
                let errors = active.error_count();
                match (verdict, &event) {
                    (SessionVerdict::Finished, _) => session = None,
                    (SessionVerdict::Stalled, MonitorEvent::TransportError(message)) => {
                        let _ = event_tx.send(EngineEvent::MonitorStalled {
                            errors,
                            message: message.clone(),
                        });
                    }
                    _ => {}
                }
                if !matches!(event, MonitorEvent::TransportError(_)) {
                    let _ = event_tx.send(EngineEvent::Monitor(event));
                }
            }
        }
    }

    evidence_debug!("Engine command channel closed; shutting down");
}
