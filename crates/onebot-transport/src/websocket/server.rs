//! Forward WebSocket server.
//!
//! | Path                | Role        |
//! |---------------------|-------------|
//! | `{prefix}/api`      | Api         |
//! | `{prefix}/event`    | Event       |
//! | `{prefix}` or `/`   | Universal   |

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{
        FromRequestParts, Request, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use onebot_core::{
    ActionRawResponse, ActionRequestHandler, BoxedEvent, Protocol, RequestContext, WsServerConfig,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{
    ConnectionGroup, ConnectionRole, FrameSink, Inbound, WsConnection, drain, serve_actions,
};
use crate::access::{OriginCheck, allow_any_origin, check_access};
use crate::error::{TransportError, TransportResult};
use crate::server::{bind, normalize_path, remote_addr, serve_router};

#[async_trait]
impl FrameSink for SplitSink<WebSocket, Message> {
    async fn send_text(&mut self, text: String) -> TransportResult<()> {
        self.send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

fn inbound(message: Message) -> Inbound {
    match message {
        Message::Text(text) => Inbound::Frame(text.as_str().as_bytes().to_vec()),
        Message::Binary(data) => Inbound::Frame(data.to_vec()),
        Message::Close(_) => Inbound::Close,
        Message::Ping(_) | Message::Pong(_) => Inbound::Control,
    }
}

/// Accepts OneBot WebSocket connections.
///
/// Clones share the same connection set.
#[derive(Clone)]
pub struct WsServer {
    config: WsServerConfig,
    shared: Arc<Shared>,
}

struct Shared {
    prefix: String,
    access_token: Option<String>,
    read_timeout: Option<std::time::Duration>,
    write_timeout: Option<std::time::Duration>,
    actions: Arc<dyn ActionRequestHandler>,
    origin_check: OriginCheck,
    connections: ConnectionGroup,
    next_id: AtomicU64,
    /// Parent of every live connection's token. Replaced on each shutdown.
    shutdown: Mutex<CancellationToken>,
}

impl WsServer {
    pub fn new(config: WsServerConfig, actions: Arc<dyn ActionRequestHandler>) -> Self {
        Self::with_origin_check(config, actions, allow_any_origin())
    }

    /// Like [`WsServer::new`], rejecting handshakes whose `Origin` fails
    /// `origin_check` with 403.
    pub fn with_origin_check(
        config: WsServerConfig,
        actions: Arc<dyn ActionRequestHandler>,
        origin_check: OriginCheck,
    ) -> Self {
        let shared = Arc::new(Shared {
            prefix: normalize_path(&config.path_prefix),
            access_token: config.access_token.clone(),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            actions,
            origin_check,
            connections: ConnectionGroup::new(),
            next_id: AtomicU64::new(1),
            shutdown: Mutex::new(CancellationToken::new()),
        });
        Self { config, shared }
    }

    pub fn config(&self) -> &WsServerConfig {
        &self.config
    }

    /// Number of connections receiving broadcasts.
    pub fn tracked_connections(&self) -> usize {
        self.shared.connections.len()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .fallback(handle_upgrade)
            .with_state(self.shared.clone())
    }

    /// Binds the configured address and serves until `token` is cancelled.
    pub async fn start(&self, token: CancellationToken) -> TransportResult<()> {
        let listener = bind(&self.config.addr).await?;
        self.serve(listener, token).await
    }

    /// Serves on an already bound listener until `token` is cancelled.
    pub async fn serve(&self, listener: TcpListener, token: CancellationToken) -> TransportResult<()> {
        let server = self.clone();
        serve_router(
            "websocket",
            listener,
            self.router(),
            token,
            self.config.shutdown_grace,
            move || server.shutdown(),
        )
        .await
    }

    /// Closes every connection, tracked ones first.
    ///
    /// Connections accepted afterwards, for example by a later `serve`, are
    /// not affected.
    pub fn shutdown(&self) {
        self.shared.connections.close_all();
        let fresh = CancellationToken::new();
        let previous = std::mem::replace(&mut *self.shared.shutdown.lock(), fresh);
        previous.cancel();
    }

    /// Sends `payload` to every event and universal connection.
    pub async fn broadcast<T: Serialize + ?Sized>(&self, payload: &T) -> TransportResult<()> {
        self.shared.connections.broadcast(payload).await
    }

    pub async fn broadcast_event(&self, event: &BoxedEvent) -> TransportResult<()> {
        self.broadcast(&event.to_json()?).await
    }
}

impl Shared {
    fn connection_token(&self) -> CancellationToken {
        self.shutdown.lock().child_token()
    }

    fn route(&self, path: &str) -> Option<ConnectionRole> {
        let at = |base: &str| path == base || path.strip_suffix('/') == Some(base);

        if at(&format!("{}/api", self.prefix)) {
            Some(ConnectionRole::Api)
        } else if at(&format!("{}/event", self.prefix)) {
            Some(ConnectionRole::Event)
        } else if self.prefix.is_empty() {
            (path == "/").then_some(ConnectionRole::Universal)
        } else {
            at(&self.prefix).then_some(ConnectionRole::Universal)
        }
    }

    async fn run_connection(
        self: Arc<Self>,
        socket: WebSocket,
        role: ConnectionRole,
        remote: Option<SocketAddr>,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sink, stream) = socket.split();
        let conn = Arc::new(WsConnection::new(
            id,
            role,
            Box::new(sink),
            self.connection_token(),
            self.write_timeout,
        ));
        if role.is_tracked() {
            self.connections.insert(conn.clone());
        }
        info!(conn_id = id, %role, remote_addr = ?remote, "WebSocket connection established");

        let stream = stream.map(|message| message.map(inbound));
        let result = if role.serves_actions() {
            let ctx = RequestContext::new(Protocol::WsServer)
                .with_remote_addr(remote)
                .with_connection_id(id);
            serve_actions(&conn, stream, &*self.actions, &ctx, self.read_timeout).await
        } else {
            drain(&conn, stream, self.read_timeout).await
        };

        self.connections.remove(id);
        conn.close_sink().await;

        match result {
            Ok(()) => info!(conn_id = id, %role, "WebSocket connection closed"),
            Err(e) => warn!(conn_id = id, %role, error = %e, "WebSocket connection ended"),
        }
    }
}

fn handshake_error(status: StatusCode, retcode: i64, message: &str) -> Response {
    (status, Json(ActionRawResponse::failed(retcode, message))).into_response()
}

async fn handle_upgrade(State(shared): State<Arc<Shared>>, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();

    let Some(role) = shared.route(parts.uri.path()) else {
        return (StatusCode::NOT_FOUND, "404 page not found").into_response();
    };

    if let Err(e) = check_access(
        shared.access_token.as_deref(),
        &parts.headers,
        parts.uri.query(),
    ) {
        debug!(%role, error = %e, "Rejected WebSocket handshake");
        return handshake_error(e.status_code(), e.retcode(), &e.to_string());
    }

    let origin = parts
        .headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if !(shared.origin_check)(origin) {
        debug!(%role, origin = ?origin, "Rejected WebSocket origin");
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &shared).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let remote = remote_addr(&parts.extensions);
    upgrade
        .on_failed_upgrade(|e| warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| shared.run_connection(socket, role, remote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use onebot_core::ActionDispatcher;
    use tower::ServiceExt;

    fn server(prefix: &str) -> WsServer {
        WsServer::new(
            WsServerConfig::default().with_path_prefix(prefix),
            Arc::new(ActionDispatcher::new()),
        )
    }

    #[test]
    fn test_route_without_prefix() {
        let server = server("");
        let shared = &server.shared;
        assert_eq!(shared.route("/api"), Some(ConnectionRole::Api));
        assert_eq!(shared.route("/api/"), Some(ConnectionRole::Api));
        assert_eq!(shared.route("/event"), Some(ConnectionRole::Event));
        assert_eq!(shared.route("/"), Some(ConnectionRole::Universal));
        assert_eq!(shared.route("/other"), None);
        assert_eq!(shared.route("/api/x"), None);
    }

    #[test]
    fn test_route_with_prefix() {
        let server = server("/onebot/v11/");
        let shared = &server.shared;
        assert_eq!(shared.route("/onebot/v11/api"), Some(ConnectionRole::Api));
        assert_eq!(shared.route("/onebot/v11/event/"), Some(ConnectionRole::Event));
        assert_eq!(shared.route("/onebot/v11"), Some(ConnectionRole::Universal));
        assert_eq!(shared.route("/onebot/v11/"), Some(ConnectionRole::Universal));
        assert_eq!(shared.route("/"), None);
        assert_eq!(shared.route("/api"), None);
    }

    #[tokio::test]
    async fn test_handshake_access_error_is_envelope() {
        let server = WsServer::new(
            WsServerConfig::default().with_token("secret"),
            Arc::new(ActionDispatcher::new()),
        );

        let request = Request::builder().uri("/api").body(Body::empty()).unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["retcode"], 1401);
        assert_eq!(body["status"], "failed");

        let request = Request::builder()
            .uri("/api?access_token=wrong")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_origin_check() {
        let server = WsServer::with_origin_check(
            WsServerConfig::default(),
            Arc::new(ActionDispatcher::new()),
            Arc::new(|origin: Option<&str>| origin == Some("https://bot.example")),
        );
        let request = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_shutdown_only_closes_current_connections() {
        let server = server("");
        let before = server.shared.connection_token();
        server.shutdown();
        assert!(before.is_cancelled());

        let after = server.shared.connection_token();
        assert!(!after.is_cancelled());
        server.shutdown();
        assert!(after.is_cancelled());
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let response = server("").router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
