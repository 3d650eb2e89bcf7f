use std::time::Duration;

use anyhow::bail;
use evidence_core::{Effect, MonitorFailure, Msg, Notification};
use evidence_engine::{EngineEvent, EngineHandle, MonitorEvent};
use evidence_logging::{evidence_debug, evidence_info, evidence_warn};

/// Executes core effects against the engine and turns engine events back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    refreshes_in_flight: usize,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            refreshes_in_flight: 0,
        }
    }

    /// Runs IO effects; notifications are handed back for display.
    pub fn enqueue(&mut self, effects: Vec<Effect>) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for effect in effects {
            match effect {
                Effect::SendRequest { action_id, request } => {
                    evidence_info!("SendRequest action_id={} request={:?}", action_id, request);
                    self.engine.send_request(action_id, request);
                }
                Effect::StartMonitor => self.engine.start_monitor(),
                Effect::StopMonitor => self.engine.stop_monitor(),
                Effect::RefreshJobs => {
                    self.refreshes_in_flight += 1;
                    self.engine.refresh_jobs();
                }
                Effect::Notify(notification) => notifications.push(notification),
            }
        }
        notifications
    }

    /// No job-list refresh is outstanding.
    pub fn is_settled(&self) -> bool {
        self.refreshes_in_flight == 0
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.engine.recv_timeout(timeout)
    }

    /// Maps an engine event to the message the core expects.
    ///
    /// Fails only when the engine itself could not start.
    pub fn translate(&mut self, event: EngineEvent) -> anyhow::Result<Msg> {
        let msg = match event {
            EngineEvent::RequestCompleted { action_id, result } => match result {
                Ok(message) => Msg::RequestAccepted { action_id, message },
                Err(err) => {
                    evidence_warn!("Request {} failed ({}): {}", action_id, err.kind, err);
                    Msg::RequestFailed {
                        action_id,
                        message: err.to_string(),
                    }
                }
            },
            EngineEvent::Monitor(event) => map_monitor_event(event),
            EngineEvent::MonitorStalled { errors, message } => {
                Msg::MonitorStalled { errors, message }
            }
            EngineEvent::JobsRefreshed(result) => {
                self.refreshes_in_flight = self.refreshes_in_flight.saturating_sub(1);
                match result {
                    Ok(jobs) => {
                        evidence_debug!("Job list refreshed with {} documents", jobs.len());
                        Msg::JobsLoaded(jobs)
                    }
                    Err(err) => Msg::RefreshFailed(err.to_string()),
                }
            }
            EngineEvent::Unavailable(reason) => bail!("backend engine unavailable: {reason}"),
        };
        Ok(msg)
    }
}

fn map_monitor_event(event: MonitorEvent) -> Msg {
    match event {
        MonitorEvent::Snapshot(snapshot) => Msg::Snapshot(snapshot),
        MonitorEvent::Completed(snapshot) => Msg::MonitorCompleted(snapshot),
        MonitorEvent::MaxErrors => Msg::MonitorFailed(MonitorFailure::MaxErrors),
        MonitorEvent::TimedOut => Msg::MonitorFailed(MonitorFailure::TimedOut),
        // The engine keeps transport errors to itself; nothing to show.
        MonitorEvent::TransportError(_) => Msg::Tick,
    }
}
