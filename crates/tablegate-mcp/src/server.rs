// crates/tablegate-mcp/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: Streamable HTTP and legacy event-stream transports.
// Purpose: Authenticate clients, route JSON-RPC into sessions, serve streams.
// Dependencies: tablegate-core, tablegate-config, axum, tokio, tokio-stream
// ============================================================================

//! ## Overview
//! [`GatewayServer`] wires the identity authority, session store, audit sink
//! and command pipeline behind one axum router. The two transports are thin
//! adapters: they differ in how sessions are addressed and how replies are
//! framed, and share [`crate::jsonrpc::handle_request`] for everything else.
//!
//! Transport failures (bad framing, missing sessions, rejected credentials)
//! are answered with an HTTP status and a JSON-RPC error body and never reach
//! the pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::WWW_AUTHENTICATE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::response::sse::KeepAlive;
use axum::routing::get;
use axum::routing::post;
use serde_json::Value;
use tablegate_config::ServerConfig;
use tablegate_config::TablegateConfig;
use tablegate_core::DataProvider;
use tablegate_core::Pipeline;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::audit::sink_from_config;
use crate::auth::AuthError;
use crate::auth::IdentityAuthority;
use crate::auth::authority_from_config;
use crate::auth::fingerprints_match;
use crate::auth::parse_bearer_token;
use crate::auth::token_fingerprint;
use crate::jsonrpc::INVALID_REQUEST;
use crate::jsonrpc::JsonRpcResponse;
use crate::jsonrpc::RpcOutcome;
use crate::jsonrpc::SESSION_NOT_FOUND;
use crate::jsonrpc::UNAUTHENTICATED;
use crate::jsonrpc::handle_request;
use crate::jsonrpc::parse_message;
use crate::session::CloseReason;
use crate::session::SessionAgent;
use crate::session::SessionStore;
use crate::session::TransportKind;
use crate::session::spawn_idle_reaper;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the streamable session identifier.
pub const SESSION_HEADER: &str = "mcp-session-id";
/// Buffered outbound messages per event stream.
const OUTBOUND_CAPACITY: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server bootstrap and runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization failures.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Request-level transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Missing or rejected bearer credentials.
    #[error("unauthenticated")]
    Unauthenticated,
    /// The identity authority could not answer.
    #[error("identity authority unavailable")]
    AuthorityUnavailable,
    /// A session-scoped request arrived without a session id.
    #[error("missing session id")]
    MissingSession,
    /// Unknown, closed, or foreign session.
    #[error("session not found")]
    SessionNotFound,
}

impl TransportError {
    /// Returns the HTTP status for the failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::AuthorityUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::MissingSession => StatusCode::BAD_REQUEST,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Returns the JSON-RPC error code for the failure.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Unauthenticated | Self::AuthorityUnavailable => UNAUTHENTICATED,
            Self::MissingSession => INVALID_REQUEST,
            Self::SessionNotFound => SESSION_NOT_FOUND,
        }
    }
}

impl From<AuthError> for TransportError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthenticated(_) => Self::Unauthenticated,
            AuthError::Unavailable(_) => Self::AuthorityUnavailable,
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        let body = JsonRpcResponse::failure(Value::Null, self.code(), self.to_string());
        let mut response = (self.status(), axum::Json(body)).into_response();
        if self == Self::Unauthenticated {
            response.headers_mut().insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Server settings resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Socket address to bind.
    pub bind: SocketAddr,
    /// Maximum inbound request body size.
    pub max_body_bytes: usize,
    /// Inactivity before a session is reclaimed.
    pub idle_timeout: Duration,
    /// Interval between idle sweeps.
    pub sweep_interval: Duration,
    /// Serve `/mcp`.
    pub streamable_http: bool,
    /// Serve `/sse` and `/messages`.
    pub legacy_sse: bool,
}

impl ServerSettings {
    /// Resolves settings from the server config section.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the bind address is invalid.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let bind = config.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        Ok(Self {
            bind,
            max_body_bytes: config.max_body_bytes,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            streamable_http: config.transports.streamable_http,
            legacy_sse: config.transports.legacy_sse,
        })
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Gateway server instance.
pub struct GatewayServer {
    /// Resolved settings.
    settings: ServerSettings,
    /// Shared handler state.
    state: Arc<GatewayState>,
}

/// State shared by every handler.
struct GatewayState {
    /// Command pipeline over the data provider.
    pipeline: Pipeline,
    /// Token-to-identity authority.
    authority: Box<dyn IdentityAuthority>,
    /// Live sessions.
    sessions: Arc<SessionStore>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
}

impl GatewayServer {
    /// Builds a server from validated configuration and a data provider.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or the
    /// authority or audit sink cannot be initialized.
    pub fn from_config(
        config: &TablegateConfig,
        provider: Arc<dyn DataProvider>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let settings = ServerSettings::from_config(&config.server)?;
        let authority = authority_from_config(&config.auth, &config.provider.user_agent)
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let audit = sink_from_config(&config.server.audit)
            .map_err(|err| ServerError::Init(format!("audit log: {err}")))?;
        let sessions = Arc::new(SessionStore::new(config.access.allow_list(), Arc::clone(&audit)));
        Ok(Self {
            settings,
            state: Arc::new(GatewayState {
                pipeline: Pipeline::new(provider),
                authority,
                sessions,
                audit,
            }),
        })
    }

    /// Returns the resolved settings.
    #[must_use]
    pub const fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Returns the live session store.
    #[must_use]
    pub fn sessions(&self) -> Arc<SessionStore> {
        Arc::clone(&self.state.sessions)
    }

    /// Builds the axum router for the enabled transports.
    #[must_use]
    pub fn router(&self) -> Router {
        let mut app = Router::new().route("/healthz", get(handle_health));
        if self.settings.streamable_http {
            app = app.route(
                "/mcp",
                post(handle_mcp_post).get(handle_mcp_stream).delete(handle_mcp_delete),
            );
        }
        if self.settings.legacy_sse {
            app = app
                .route("/sse", get(handle_legacy_stream))
                .route("/messages", post(handle_legacy_message));
        }
        app.layer(DefaultBodyLimit::max(self.settings.max_body_bytes))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.settings.bind)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        self.serve_on(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Serves on an existing listener until `shutdown` resolves.
    ///
    /// Live sessions are torn down when shutdown begins so open event
    /// streams end and the graceful drain can finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when serving fails.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let reaper = spawn_idle_reaper(
            &self.state.sessions,
            self.settings.idle_timeout,
            self.settings.sweep_interval,
        );
        let sessions = Arc::clone(&self.state.sessions);
        let app = self.router();
        let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move {
                shutdown.await;
                sessions.close_all(CloseReason::Shutdown);
            })
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()));
        reaper.abort();
        result
    }
}

impl GatewayState {
    /// Authenticates the bearer token and establishes a new session.
    async fn authenticate(
        &self,
        headers: &HeaderMap,
        transport: TransportKind,
        peer: SocketAddr,
    ) -> Result<Arc<SessionAgent>, TransportError> {
        let peer_ip = Some(peer.ip().to_string());
        let resolved = match parse_bearer_token(auth_header(headers)) {
            Ok(token) => self.authority.resolve(&token).await.map(|identity| (token, identity)),
            Err(err) => Err(err),
        };
        match resolved {
            Ok((token, identity)) => Ok(self.sessions.establish(
                identity,
                transport,
                token_fingerprint(&token),
                peer_ip,
            )),
            Err(err) => {
                self.audit.record(&AuditEvent::auth_denied(transport, peer_ip, &err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Resolves an existing session and checks the presented credential.
    fn resume(
        &self,
        headers: &HeaderMap,
        session_id: &str,
        transport: TransportKind,
        peer: SocketAddr,
    ) -> Result<Arc<SessionAgent>, TransportError> {
        let token = parse_bearer_token(auth_header(headers)).map_err(|err| {
            self.audit.record(&AuditEvent::auth_denied(
                transport,
                Some(peer.ip().to_string()),
                &err.to_string(),
            ));
            TransportError::from(err)
        })?;
        let session = self.sessions.get(session_id).ok_or(TransportError::SessionNotFound)?;
        if session.transport() != transport
            || !fingerprints_match(session.token_fingerprint(), &token_fingerprint(&token))
        {
            return Err(TransportError::SessionNotFound);
        }
        Ok(session)
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness probe.
async fn handle_health() -> &'static str {
    "ok"
}

/// Handles `POST /mcp`.
async fn handle_mcp_post(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let request = match parse_message(&bytes) {
        Ok(request) => request,
        Err(response) => return rpc_response(StatusCode::BAD_REQUEST, &response, None),
    };
    let session = match session_header(&headers) {
        Some(session_id) => state.resume(&headers, session_id, TransportKind::Streamable, peer),
        None if request.method == "initialize" && !request.is_notification() => {
            state.authenticate(&headers, TransportKind::Streamable, peer).await
        }
        None => Err(TransportError::MissingSession),
    };
    let session = match session {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };
    match handle_request(&state.pipeline, state.audit.as_ref(), &session, request).await {
        RpcOutcome::Reply(response) => {
            rpc_response(StatusCode::OK, &response, Some(session.id()))
        }
        RpcOutcome::Accepted => StatusCode::ACCEPTED.into_response(),
        RpcOutcome::Discarded => TransportError::SessionNotFound.into_response(),
    }
}

/// Handles `GET /mcp`: a server-to-client event stream for the session.
async fn handle_mcp_stream(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = session_header(&headers) else {
        return TransportError::MissingSession.into_response();
    };
    let session = match state.resume(&headers, session_id, TransportKind::Streamable, peer) {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };
    let (tx, rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    if !session.attach_outbound(tx) {
        return TransportError::SessionNotFound.into_response();
    }
    let stream = ReceiverStream::new(rx)
        .map(|message| Ok::<Event, Infallible>(Event::default().event("message").data(message)));
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Handles `DELETE /mcp`. Unknown sessions are already gone.
async fn handle_mcp_delete(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = session_header(&headers) else {
        return TransportError::MissingSession.into_response();
    };
    match state.resume(&headers, session_id, TransportKind::Streamable, peer) {
        Ok(session) => {
            state.sessions.teardown(session.id(), CloseReason::Client);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(TransportError::SessionNotFound) if state.sessions.get(session_id).is_none() => {
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Handles `GET /sse`: authenticates and opens a legacy session stream.
async fn handle_legacy_stream(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let session = match state.authenticate(&headers, TransportKind::LegacyEventStream, peer).await
    {
        Ok(session) => session,
        Err(err) => return err.into_response(),
    };
    let (tx, rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    if !session.attach_outbound(tx) {
        return TransportError::SessionNotFound.into_response();
    }
    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?sessionId={}", session.id()));
    let guard = StreamGuard {
        sessions: Arc::clone(&state.sessions),
        session_id: session.id().to_string(),
    };
    let messages =
        ReceiverStream::new(rx).map(|message| Event::default().event("message").data(message));
    let stream = tokio_stream::once(endpoint).chain(messages).map(move |event| {
        let _ = &guard;
        Ok::<Event, Infallible>(event)
    });
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Handles `POST /messages?sessionId=`: replies travel on the event stream.
async fn handle_legacy_message(
    State(state): State<Arc<GatewayState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let Some(session_id) = query.get("sessionId").filter(|id| !id.is_empty()) else {
        return TransportError::MissingSession.into_response();
    };
    let session =
        match state.resume(&headers, session_id, TransportKind::LegacyEventStream, peer) {
            Ok(session) => session,
            Err(err) => return err.into_response(),
        };
    let request = match parse_message(&bytes) {
        Ok(request) => request,
        Err(response) => return rpc_response(StatusCode::BAD_REQUEST, &response, None),
    };
    let _turn = session.delivery_turn().await;
    match handle_request(&state.pipeline, state.audit.as_ref(), &session, request).await {
        RpcOutcome::Reply(response) => {
            if session.push_outbound(response.to_json_string()).await {
                StatusCode::ACCEPTED.into_response()
            } else {
                TransportError::SessionNotFound.into_response()
            }
        }
        RpcOutcome::Accepted => StatusCode::ACCEPTED.into_response(),
        RpcOutcome::Discarded => TransportError::SessionNotFound.into_response(),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Tears the legacy session down when its event stream is dropped.
struct StreamGuard {
    /// Store owning the session.
    sessions: Arc<SessionStore>,
    /// Session to release.
    session_id: String,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.sessions.teardown(&self.session_id, CloseReason::StreamClosed);
    }
}

/// Returns the raw `Authorization` header.
fn auth_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok())
}

/// Returns the streamable session id header.
fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Builds a JSON-RPC response, tagging it with the session id when known.
fn rpc_response(
    status: StatusCode,
    response: &JsonRpcResponse,
    session_id: Option<&str>,
) -> Response {
    let mut http = (status, axum::Json(response)).into_response();
    if let Some(session_id) = session_id
        && let Ok(value) = HeaderValue::from_str(session_id)
    {
        http.headers_mut().insert(SESSION_HEADER, value);
    }
    http
}
