use std::sync::Arc;
use std::time::{Duration, Instant};

use evidence_logging::{evidence_info, evidence_warn};
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::client::SnapshotSource;
use crate::poller::{PollSettings, ProgressPoller};
use crate::stream::{ProgressStream, StreamSettings};
use crate::{MonitorEvent, Transport};

/// Receives everything a monitor observes.
pub trait MonitorSink: Send + Sync {
    fn emit(&self, event: MonitorEvent);
}

/// Identifies which monitor session an event belongs to.
pub type SessionId = u64;

/// Forwards events into the engine loop, tagged with their session.
pub struct ChannelMonitorSink {
    session: SessionId,
    tx: UnboundedSender<(SessionId, MonitorEvent)>,
}

impl ChannelMonitorSink {
    pub fn new(session: SessionId, tx: UnboundedSender<(SessionId, MonitorEvent)>) -> Self {
        Self { session, tx }
    }
}

impl MonitorSink for ChannelMonitorSink {
    fn emit(&self, event: MonitorEvent) {
        let _ = self.tx.send((self.session, event));
    }
}

/// Common lifecycle of the stream and poll transports.
pub trait ProgressMonitor: Send {
    /// Begins monitoring; no-op when already active.
    fn start(&mut self);
    /// Stops monitoring; idempotent. Never affects server-side jobs.
    fn stop(&mut self);
    fn is_active(&self) -> bool;
    fn transport(&self) -> Transport;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPreference {
    /// Use the live stream whenever the runtime supports it.
    #[default]
    Auto,
    Stream,
    Poll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    pub live_stream: bool,
}

impl TransportCapabilities {
    /// Live streaming needs a streaming HTTP body, which this build always has,
    /// so only an explicit poll preference disables it.
    pub fn probe(preference: TransportPreference) -> Self {
        Self {
            live_stream: !matches!(preference, TransportPreference::Poll),
        }
    }

    pub fn select(&self) -> Transport {
        if self.live_stream {
            Transport::Stream
        } else {
            Transport::Poll
        }
    }
}

/// Builds monitors for one project; the transport is picked once by the capability probe.
#[derive(Clone)]
pub struct MonitorFactory {
    stream_url: Url,
    source: Arc<dyn SnapshotSource>,
    stream: StreamSettings,
    poll: PollSettings,
    capabilities: TransportCapabilities,
    /// Consecutive stream errors before switching to polling; zero disables the switch.
    fallback_after_errors: u32,
}

impl MonitorFactory {
    pub fn new(
        stream_url: Url,
        source: Arc<dyn SnapshotSource>,
        stream: StreamSettings,
        poll: PollSettings,
        capabilities: TransportCapabilities,
        fallback_after_errors: u32,
    ) -> Self {
        Self {
            stream_url,
            source,
            stream,
            poll,
            capabilities,
            fallback_after_errors,
        }
    }

    pub fn build(&self, transport: Transport, sink: Arc<dyn MonitorSink>) -> Box<dyn ProgressMonitor> {
        match transport {
            Transport::Stream => Box::new(ProgressStream::new(
                self.stream_url.clone(),
                self.stream.clone(),
                sink,
            )),
            Transport::Poll => Box::new(ProgressPoller::new(
                self.source.clone(),
                self.poll.clone(),
                sink,
            )),
        }
    }
}

/// Consecutive errors after which a stream that cannot fall back reports itself stalled.
pub const STALL_WARNING_AFTER: u32 = 3;

/// What the engine loop should do after a session observed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    Continue,
    /// The stream keeps failing and polling is not allowed; reported once per outage.
    Stalled,
    /// The session is over; drop it.
    Finished,
}

/// One monitoring run: active transport, consecutive error count, start time.
pub struct MonitorSession {
    id: SessionId,
    monitor: Box<dyn ProgressMonitor>,
    sink: Arc<dyn MonitorSink>,
    error_count: u32,
    stall_reported: bool,
    started_at: Instant,
}

impl MonitorSession {
    pub fn start(id: SessionId, factory: &MonitorFactory, sink: Arc<dyn MonitorSink>) -> Self {
        let transport = factory.capabilities.select();
        let mut monitor = factory.build(transport, sink.clone());
        monitor.start();
        evidence_info!("Monitor session {} started using {}", id, transport);
        Self {
            id,
            monitor,
            sink,
            error_count: 0,
            stall_reported: false,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn transport(&self) -> Transport {
        self.monitor.transport()
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn observe(&mut self, event: &MonitorEvent, factory: &MonitorFactory) -> SessionVerdict {
        match event {
            MonitorEvent::Snapshot(_) => {
                self.error_count = 0;
                self.stall_reported = false;
                SessionVerdict::Continue
            }
            MonitorEvent::TransportError(_) => {
                self.error_count += 1;
                if self.monitor.transport() != Transport::Stream {
                    return SessionVerdict::Continue;
                }
                if factory.fallback_after_errors > 0 {
                    if self.error_count >= factory.fallback_after_errors {
                        self.fall_back_to_polling(factory);
                    }
                    return SessionVerdict::Continue;
                }
                if self.error_count >= STALL_WARNING_AFTER && !self.stall_reported {
                    self.stall_reported = true;
                    evidence_warn!(
                        "Monitor session {}: stream failed {} times in a row and cannot fall back",
                        self.id,
                        self.error_count
                    );
                    return SessionVerdict::Stalled;
                }
                SessionVerdict::Continue
            }
            MonitorEvent::Completed(_) | MonitorEvent::MaxErrors | MonitorEvent::TimedOut => {
                self.stop();
                SessionVerdict::Finished
            }
        }
    }

    pub fn stop(&mut self) {
        self.monitor.stop();
    }

    fn fall_back_to_polling(&mut self, factory: &MonitorFactory) {
        evidence_warn!(
            "Monitor session {}: {} consecutive stream errors, switching to polling",
            self.id,
            self.error_count
        );
        self.monitor.stop();
        let mut poller = factory.build(Transport::Poll, self.sink.clone());
        poller.start();
        self.monitor = poller;
        self.error_count = 0;
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.monitor.stop();
    }
}
