//! Connection session: lifecycle state machine and orchestration.
//!
//! A [`LiveSession`] owns one driver task. The driver owns the event sink and
//! the inbound side of the current link, and serially consumes dial results
//! and link events. Everything the caller can touch (state, ledger, sequence
//! counter, reconnect counter, timers, outbound sender) sits in one
//! mutex-guarded [`Core`], which is never held while the sink runs.
//!
//! Every dial, unexpected closure and explicit disconnect bumps a generation
//! counter. Dial results, link events and reconnect timers carry the
//! generation they were created under and are discarded once it is stale.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use chrono::Utc;
use classlink_core::TransportError;
use classlink_core::errors::redact_token;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::backoff::{ReconnectDecision, ReconnectScheduler};
use crate::codec;
use crate::config::TransportConfig;
use crate::connector::TungsteniteConnector;
use crate::heartbeat::HeartbeatMonitor;
use crate::ledger::{OutboundMessage, PendingLedger};
use crate::link::{Connector, Link, LinkEvent};
use crate::sink::{EventSink, InboundEvent};
use crate::target::ConnectionTarget;
use crate::timer::{self, TimerHandle};

/// Type tag of the join handshake.
pub const JOIN_TYPE: &str = "join";

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Constructed, never dialed.
    #[default]
    Idle,
    /// A dial is in flight.
    Connecting,
    /// Joined; frames flow.
    Open,
    /// Waiting out a backoff delay before the next dial.
    Reconnecting,
    /// Disconnected explicitly or gave up reconnecting.
    Closed,
}

impl SessionState {
    /// Whether frames can currently be written.
    pub fn is_connected(self) -> bool {
        self == Self::Open
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Core {
    status: SessionState,
    ledger: PendingLedger,
    next_seq: u64,
    scheduler: ReconnectScheduler,
    heartbeat: HeartbeatMonitor,
    reconnect_timer: Option<TimerHandle>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    generation: u64,
    last_event: Option<InboundEvent>,
    terminated: bool,
}

impl Core {
    fn set_status(&mut self, status: SessionState) {
        if self.status != status {
            debug!(from = %self.status, to = %status, "session state changed");
            self.status = status;
        }
    }

    fn assign(&mut self, kind: impl Into<String>, payload: Value) -> OutboundMessage {
        self.next_seq += 1;
        OutboundMessage::new(self.next_seq, kind, payload)
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.cancel();
        }
    }
}

enum DriverEvent {
    Dialed {
        generation: u64,
        result: Result<Link, TransportError>,
    },
    Shutdown,
}

struct Inner {
    target: ConnectionTarget,
    endpoint: Option<String>,
    config: TransportConfig,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    core: Mutex<Core>,
    driver_tx: mpsc::UnboundedSender<DriverEvent>,
}

impl Inner {
    fn session_id(&self) -> &str {
        &self.target.session_id
    }

    fn begin_dial(&self, core: &mut Core, url: &str) {
        core.generation += 1;
        core.set_status(SessionState::Connecting);

        let generation = core.generation;
        let connector = Arc::clone(&self.connector);
        let driver_tx = self.driver_tx.clone();
        let timeout = self.config.connect_timeout;
        let url = url.to_owned();
        debug!(session_id = %self.session_id(), url = %redact_token(&url), "dialing");

        let _ = self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::ConnectTimeout {
                    url: redact_token(&url),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            };
            let _ = driver_tx.send(DriverEvent::Dialed { generation, result });
        });
    }

    /// Install a freshly opened link: join, heartbeat, replay.
    fn link_opened(self: &Arc<Self>, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut guard = self.core.lock();
        let core = &mut *guard;
        if core.generation != generation || core.status != SessionState::Connecting {
            debug!(session_id = %self.session_id(), "discarding stale connection");
            return false;
        }

        core.scheduler.reset();
        core.cancel_reconnect();
        let backlog = core.ledger.drain_in_order();
        let join = core.assign(JOIN_TYPE, self.target.join_payload());
        let join_seq = join.sequence;
        let _ = outbound.send(codec::encode(&join));
        let _ = core.ledger.record(join);
        for message in &backlog {
            let _ = outbound.send(codec::encode(message));
        }
        core.outbound = Some(outbound);
        core.set_status(SessionState::Open);

        let weak = Arc::downgrade(self);
        core.heartbeat
            .start(self.config.heartbeat_interval, move || send_ping(&weak));

        info!(
            session_id = %self.session_id(),
            seq = join_seq,
            replayed = backlog.len(),
            "session open"
        );
        true
    }

    /// The current connection went away, or a dial failed.
    fn connection_lost(self: &Arc<Self>, generation: u64, reason: Option<&str>) {
        let mut core = self.core.lock();
        if core.generation != generation || core.status == SessionState::Closed {
            debug!(session_id = %self.session_id(), "ignoring stale closure");
            return;
        }

        core.generation += 1;
        core.outbound = None;
        let _ = core.heartbeat.stop();

        match core.scheduler.register_failure() {
            ReconnectDecision::Retry { attempt, delay } => {
                core.set_status(SessionState::Reconnecting);
                info!(
                    session_id = %self.session_id(),
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    reason = reason.unwrap_or("closed"),
                    "connection lost, reconnecting"
                );
                let weak = Arc::downgrade(self);
                let due = core.generation;
                core.cancel_reconnect();
                core.reconnect_timer = Some(timer::after(delay, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.reconnect_due(due);
                    }
                }));
            }
            ReconnectDecision::GiveUp { attempts } => {
                core.cancel_reconnect();
                core.set_status(SessionState::Closed);
                warn!(
                    session_id = %self.session_id(),
                    attempts,
                    pending = core.ledger.size(),
                    "reconnection attempts exhausted, closing"
                );
            }
        }
    }

    fn reconnect_due(&self, generation: u64) {
        let mut core = self.core.lock();
        if core.generation != generation
            || core.status != SessionState::Reconnecting
            || core.terminated
        {
            return;
        }
        core.reconnect_timer = None;
        if let Some(url) = self.endpoint.as_deref() {
            self.begin_dial(&mut core, url);
        }
    }

    /// Apply acknowledgement bookkeeping for an inbound event. Returns `false`
    /// if the link it arrived on is no longer current.
    fn accept_event(&self, generation: u64, event: &InboundEvent) -> bool {
        let mut core = self.core.lock();
        if core.generation != generation {
            return false;
        }
        if let Some(ack) = event.ack_seq {
            let cleared = core.ledger.acknowledge_through(ack);
            trace!(ack_seq = ack, cleared, pending = core.ledger.size(), "ack applied");
        }
        core.last_event = Some(event.clone());
        true
    }
}

fn send_ping(inner: &Weak<Inner>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let core = inner.core.lock();
    if core.status != SessionState::Open {
        return;
    }
    if let Some(outbound) = &core.outbound {
        trace!(session_id = %inner.session_id(), "ping");
        let _ = outbound.send(codec::encode_ping(Utc::now()));
    }
}

/// Cloneable handle to a session.
///
/// Handles stay usable after the owning [`LiveSession`] is dropped, but the
/// session is then terminal: `connect` does nothing and sends only queue.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("SessionHandle")
            .field("target", &self.inner.target)
            .field("status", &core.status)
            .field("pending", &core.ledger.size())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Start connecting.
    ///
    /// A no-op when the target is incomplete (the session stays `idle`), when
    /// a connection is already open or in flight, or after the owning
    /// [`LiveSession`] was dropped. From `reconnecting` this dials
    /// immediately instead of waiting out the delay.
    pub fn connect(&self) {
        let Some(url) = self.inner.endpoint.as_deref() else {
            debug!(session_id = %self.inner.session_id(), "no usable target, staying idle");
            return;
        };
        let mut core = self.inner.core.lock();
        if core.terminated {
            return;
        }
        match core.status {
            SessionState::Connecting | SessionState::Open => return,
            SessionState::Closed => core.scheduler.reset(),
            SessionState::Idle | SessionState::Reconnecting => {}
        }
        core.cancel_reconnect();
        self.inner.begin_dial(&mut core, url);
    }

    /// Close the connection and stop all timers.
    ///
    /// Idempotent, and safe to call from inside an [`EventSink`]. Pending
    /// messages are discarded; the sequence counter keeps counting.
    pub fn disconnect(&self) {
        let mut core = self.inner.core.lock();
        let previous = core.status;
        core.generation += 1;
        let _ = core.heartbeat.stop();
        core.cancel_reconnect();
        core.outbound = None;
        core.ledger.clear();
        core.scheduler.reset();
        core.set_status(SessionState::Closed);
        if previous != SessionState::Closed {
            info!(session_id = %self.inner.session_id(), "disconnected");
        }
    }

    /// Queue an event for delivery and return its sequence number.
    ///
    /// Written immediately when open; otherwise replayed after the next
    /// successful connect.
    pub fn send_event(&self, kind: impl Into<String>, payload: Value) -> u64 {
        let mut guard = self.inner.core.lock();
        let core = &mut *guard;
        let message = core.assign(kind, payload);
        let seq = message.sequence;
        match &core.outbound {
            Some(outbound) if outbound.send(codec::encode(&message)).is_ok() => {
                trace!(seq, kind = %message.kind, "sent");
            }
            _ => trace!(seq, kind = %message.kind, "queued for replay"),
        }
        let _ = core.ledger.record(message);
        seq
    }

    /// Unacknowledged messages.
    pub fn pending_count(&self) -> usize {
        self.inner.core.lock().ledger.size()
    }

    /// Current lifecycle state.
    pub fn current_status(&self) -> SessionState {
        self.inner.core.lock().status
    }

    /// Consecutive unexpected closures since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.core.lock().scheduler.attempts()
    }

    /// The most recently dispatched inbound event.
    pub fn last_event(&self) -> Option<InboundEvent> {
        self.inner.core.lock().last_event.clone()
    }

    /// The session being joined.
    pub fn target(&self) -> &ConnectionTarget {
        &self.inner.target
    }
}

/// Owning handle of a live-session connection.
///
/// Dereferences to [`SessionHandle`]. Dropping it disconnects and stops the
/// driver task.
pub struct LiveSession {
    handle: SessionHandle,
    _driver: JoinHandle<()>,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LiveSession").field(&self.handle).finish()
    }
}

impl LiveSession {
    /// Session over the production WebSocket connector.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(target: ConnectionTarget, config: TransportConfig, sink: impl EventSink) -> Self {
        Self::with_connector(target, config, Arc::new(TungsteniteConnector), sink)
    }

    /// Session over an arbitrary connector.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_connector(
        target: ConnectionTarget,
        config: TransportConfig,
        connector: Arc<dyn Connector>,
        sink: impl EventSink,
    ) -> Self {
        let endpoint = if target.is_complete() {
            match target.endpoint_url(&config.origin) {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(session_id = %target.session_id, error = %err, "unusable endpoint");
                    None
                }
            }
        } else {
            None
        };

        let (driver_tx, events) = mpsc::unbounded_channel();
        let auto_connect = config.auto_connect;
        let inner = Arc::new(Inner {
            target,
            endpoint,
            core: Mutex::new(Core {
                status: SessionState::Idle,
                ledger: PendingLedger::new(),
                next_seq: 0,
                scheduler: ReconnectScheduler::new(config.reconnect.clone()),
                heartbeat: HeartbeatMonitor::new(),
                reconnect_timer: None,
                outbound: None,
                generation: 0,
                last_event: None,
                terminated: false,
            }),
            config,
            connector,
            runtime: Handle::current(),
            driver_tx,
        });

        let driver = Driver {
            inner: Arc::clone(&inner),
            sink,
            events,
            link: None,
        };
        let task = tokio::spawn(driver.run());

        let handle = SessionHandle { inner };
        if auto_connect {
            handle.connect();
        }
        Self {
            handle,
            _driver: task,
        }
    }

    /// A cloneable handle, e.g. for capture inside an event sink.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }
}

impl Deref for LiveSession {
    type Target = SessionHandle;

    fn deref(&self) -> &SessionHandle {
        &self.handle
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.handle.inner.core.lock().terminated = true;
        self.handle.disconnect();
        let _ = self.handle.inner.driver_tx.send(DriverEvent::Shutdown);
    }
}

struct ActiveLink {
    generation: u64,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
}

enum Step {
    Driver(Option<DriverEvent>),
    Link(u64, LinkEvent),
}

struct Driver<S> {
    inner: Arc<Inner>,
    sink: S,
    events: mpsc::UnboundedReceiver<DriverEvent>,
    link: Option<ActiveLink>,
}

impl<S: EventSink> Driver<S> {
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                event = self.events.recv() => Step::Driver(event),
                (generation, event) = next_link_event(self.link.as_mut()) => Step::Link(generation, event),
            };
            match step {
                Step::Driver(Some(DriverEvent::Dialed { generation, result })) => {
                    self.on_dialed(generation, result);
                }
                Step::Driver(Some(DriverEvent::Shutdown) | None) => break,
                Step::Link(generation, LinkEvent::Frame(bytes)) => self.on_frame(generation, &bytes),
                Step::Link(generation, LinkEvent::Closed { reason }) => {
                    self.link = None;
                    self.inner.connection_lost(generation, reason.as_deref());
                }
            }
        }
        trace!(session_id = %self.inner.session_id(), "driver stopped");
    }

    fn on_dialed(&mut self, generation: u64, result: Result<Link, TransportError>) {
        match result {
            Ok(Link { outbound, inbound }) => {
                if self.inner.link_opened(generation, outbound) {
                    self.link = Some(ActiveLink {
                        generation,
                        inbound,
                    });
                }
            }
            Err(err) => {
                warn!(session_id = %self.inner.session_id(), error = %err, "connection attempt failed");
                let reason = err.to_string();
                self.inner.connection_lost(generation, Some(&reason));
            }
        }
    }

    fn on_frame(&mut self, generation: u64, bytes: &[u8]) {
        let event = match codec::decode(bytes) {
            Ok(frame) => InboundEvent::from(frame),
            Err(err) => {
                warn!(session_id = %self.inner.session_id(), error = %err, "dropping undecodable frame");
                return;
            }
        };
        if !self.inner.accept_event(generation, &event) {
            self.link = None;
            return;
        }
        self.sink.on_event(event);
    }
}

async fn next_link_event(link: Option<&mut ActiveLink>) -> (u64, LinkEvent) {
    match link {
        Some(link) => {
            let event = link
                .inbound
                .recv()
                .await
                .unwrap_or(LinkEvent::Closed { reason: None });
            (link.generation, event)
        }
        None => std::future::pending().await,
    }
}
