// crates/tablegate-mcp/src/session.rs
// ============================================================================
// Module: Session Agents
// Description: Per-client session state, lifecycle, and idle reclamation.
// Purpose: Bind an identity and its registry snapshot to one client.
// Dependencies: tablegate-core, rand, tokio
// ============================================================================

//! ## Overview
//! A [`SessionAgent`] owns the identity, the permission-filtered registry
//! computed at establishment, and the outbound event channel for its stream.
//! Commands on one session are serialized through a FIFO async mutex.
//!
//! [`SessionStore`] is the only cross-session structure. `teardown` is
//! idempotent: explicit deletes, dropped streams and the idle reaper all run
//! the same path, and only the first caller releases resources and audits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tablegate_core::AllowList;
use tablegate_core::Command;
use tablegate_core::CommandReport;
use tablegate_core::Identity;
use tablegate_core::OperationRegistry;
use tablegate_core::Pipeline;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Wire transport a session was established over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Streamable HTTP on `/mcp`.
    Streamable,
    /// Legacy event stream on `/sse` plus `/messages`.
    LegacyEventStream,
}

impl TransportKind {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Streamable => "streamable_http",
            Self::LegacyEventStream => "legacy_sse",
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Client asked to close the session.
    Client,
    /// The event stream was dropped.
    StreamClosed,
    /// The idle reaper reclaimed the session.
    Idle,
    /// The server is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::StreamClosed => "stream_closed",
            Self::Idle => "idle",
            Self::Shutdown => "shutdown",
        }
    }
}

// ============================================================================
// SECTION: Session Agent
// ============================================================================

/// State owned by one connected client.
pub struct SessionAgent {
    /// Session identifier (128-bit lowercase hex).
    id: String,
    /// Identity bound at establishment.
    identity: Identity,
    /// Registry snapshot computed at establishment.
    registry: OperationRegistry,
    /// Transport the session arrived on.
    transport: TransportKind,
    /// SHA-256 fingerprint of the establishing bearer token.
    token_fingerprint: String,
    /// Serializes commands in arrival order.
    command_lock: tokio::sync::Mutex<()>,
    /// Serializes event-stream replies in arrival order.
    delivery_lock: tokio::sync::Mutex<()>,
    /// Last time the client did anything.
    last_activity: Mutex<Instant>,
    /// Set once teardown begins.
    closed: AtomicBool,
    /// Outbound channel feeding the event stream, when one is attached.
    outbound: Mutex<Option<mpsc::Sender<String>>>,
}

impl SessionAgent {
    /// Returns the session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the bound identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the registry snapshot.
    #[must_use]
    pub const fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Returns the transport kind.
    #[must_use]
    pub const fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Returns the establishing token fingerprint.
    #[must_use]
    pub fn token_fingerprint(&self) -> &str {
        &self.token_fingerprint
    }

    /// Returns true once teardown has begun.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns true while a command holds the session.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.command_lock.try_lock().is_err()
    }

    /// Records client activity.
    pub fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    /// Returns how long the session has been quiet.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().map_or(Duration::ZERO, |last| last.elapsed())
    }

    /// Runs a command through the pipeline after earlier commands finish.
    ///
    /// Returns `None` when the session was torn down before the command
    /// started or while it ran; the result is discarded in that case.
    pub async fn run(&self, pipeline: &Pipeline, command: Command) -> Option<CommandReport> {
        let _turn = self.command_lock.lock().await;
        if self.is_closed() {
            return None;
        }
        self.touch();
        let report = pipeline.dispatch(&self.registry, command).await;
        self.touch();
        if self.is_closed() {
            return None;
        }
        Some(report)
    }

    /// Waits for this message's turn to handle and deliver a stream reply.
    ///
    /// Holding the guard until the reply is queued keeps events in the
    /// order their messages arrived.
    pub async fn delivery_turn(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.delivery_lock.lock().await
    }

    /// Attaches the outbound channel of a freshly opened event stream.
    ///
    /// Returns false when the session is already closed.
    pub fn attach_outbound(&self, sender: mpsc::Sender<String>) -> bool {
        let Ok(mut slot) = self.outbound.lock() else {
            return false;
        };
        if self.is_closed() {
            return false;
        }
        *slot = Some(sender);
        true
    }

    /// Queues a message on the event stream.
    ///
    /// Returns false when no stream is attached or it has gone away.
    pub async fn push_outbound(&self, message: String) -> bool {
        let sender = self.outbound.lock().ok().and_then(|slot| slot.clone());
        match sender {
            Some(sender) => sender.send(message).await.is_ok(),
            None => false,
        }
    }

    /// Marks the session closed and drops the outbound channel.
    ///
    /// Returns true only for the first caller.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Ok(mut slot) = self.outbound.lock() {
            slot.take();
        }
        true
    }
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// Live sessions keyed by identifier.
pub struct SessionStore {
    /// Session map.
    sessions: Mutex<HashMap<String, Arc<SessionAgent>>>,
    /// Process-wide write allow-list.
    allow_list: AllowList,
    /// Audit sink for lifecycle events.
    audit: Arc<dyn AuditSink>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(allow_list: AllowList, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            allow_list,
            audit,
        }
    }

    /// Returns the audit sink shared with the transports.
    #[must_use]
    pub fn audit(&self) -> &dyn AuditSink {
        self.audit.as_ref()
    }

    /// Builds a session for an authenticated identity and stores it.
    pub fn establish(
        &self,
        identity: Identity,
        transport: TransportKind,
        token_fingerprint: String,
        peer_ip: Option<String>,
    ) -> Arc<SessionAgent> {
        let registry = OperationRegistry::for_identity(&identity, &self.allow_list);
        let session = Arc::new(SessionAgent {
            id: new_session_id(),
            identity,
            registry,
            transport,
            token_fingerprint,
            command_lock: tokio::sync::Mutex::new(()),
            delivery_lock: tokio::sync::Mutex::new(()),
            last_activity: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
            outbound: Mutex::new(None),
        });
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(session.id.clone(), Arc::clone(&session));
        }
        self.audit.record(&AuditEvent::session_established(
            &session.id,
            &session.identity,
            transport,
            peer_ip,
            &session.token_fingerprint,
        ));
        session
    }

    /// Looks up a live session.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<SessionAgent>> {
        let sessions = self.sessions.lock().ok()?;
        sessions.get(id).filter(|session| !session.is_closed()).cloned()
    }

    /// Tears a session down. Safe to call repeatedly.
    ///
    /// Returns true when this call released the session.
    pub fn teardown(&self, id: &str, reason: CloseReason) -> bool {
        let removed = self.sessions.lock().ok().and_then(|mut sessions| sessions.remove(id));
        let Some(session) = removed else {
            return false;
        };
        if !session.close() {
            return false;
        }
        self.audit.record(&AuditEvent::session_closed(
            &session.id,
            &session.identity,
            session.transport,
            reason,
        ));
        true
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |sessions| sessions.len())
    }

    /// Returns true when no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tears down every live session.
    pub fn close_all(&self, reason: CloseReason) {
        let ids: Vec<String> = self
            .sessions
            .lock()
            .map_or_else(|_| Vec::new(), |sessions| sessions.keys().cloned().collect());
        for id in &ids {
            self.teardown(id, reason);
        }
    }

    /// Tears down sessions quiet for at least `idle`. Busy sessions are kept.
    ///
    /// Returns the number of sessions reclaimed.
    pub fn reap_idle(&self, idle: Duration) -> usize {
        let expired: Vec<String> = self.sessions.lock().map_or_else(
            |_| Vec::new(),
            |sessions| {
                sessions
                    .values()
                    .filter(|session| !session.is_busy() && session.idle_for() >= idle)
                    .map(|session| session.id.clone())
                    .collect()
            },
        );
        expired.iter().filter(|id| self.teardown(id, CloseReason::Idle)).count()
    }
}

/// Spawns the background idle reaper. It stops once the store is dropped.
#[must_use]
pub fn spawn_idle_reaper(
    store: &Arc<SessionStore>,
    idle: Duration,
    sweep: Duration,
) -> JoinHandle<()> {
    let store = Arc::downgrade(store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            store.reap_idle(idle);
        }
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Generates a 128-bit random session identifier.
fn new_session_id() -> String {
    let bytes = rand::random::<[u8; 16]>();
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
