//! Reverse WebSocket client.
//!
//! ```text
//!            dial ok                 read/write failure
//! Connecting ───────▶ Connected ──────────────────────▶ Disconnected
//!     ▲                                                     │
//!     └──────────────── sleep(reconnect_interval) ◀─────────┘
//!
//! cancellation at any point ──▶ ShuttingDown ──▶ Disconnected
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use onebot_core::{
    ActionRequestHandler, BoxedEvent, Protocol, RequestContext, WsClientConfig,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{ConnectionRole, FrameSink, Inbound, WsConnection, serve_actions};
use crate::error::{TransportError, TransportResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[async_trait]
impl FrameSink for SplitSink<WsStream, Message> {
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
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
    }
}

/// Lifecycle of a [`WsClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
}

/// Dials a OneBot endpoint and serves action requests over the connection.
///
/// The connection identifies itself as a `Universal` client, so it also
/// carries pushed events.
pub struct WsClient {
    config: WsClientConfig,
    actions: Arc<dyn ActionRequestHandler>,
    state: watch::Sender<ClientState>,
    active: Mutex<Option<Arc<WsConnection>>>,
    shutdown: CancellationToken,
    next_id: AtomicU64,
}

impl WsClient {
    pub fn new(config: WsClientConfig, actions: Arc<dyn ActionRequestHandler>) -> Self {
        let (state, _) = watch::channel(ClientState::Disconnected);
        Self {
            config,
            actions,
            state,
            active: Mutex::new(None),
            shutdown: CancellationToken::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &WsClientConfig {
        &self.config
    }

    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Watches state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Runs the dial/serve/reconnect loop until `token` is cancelled or
    /// [`WsClient::shutdown`] is called.
    pub async fn start(&self, token: CancellationToken) -> TransportResult<()> {
        if self.config.url.trim().is_empty() {
            return Err(TransportError::EmptyUrl);
        }
        self.build_request()?;

        let run = self.shutdown.child_token();
        let link = {
            let run = run.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                run.cancel();
            })
        };

        self.run(&run).await;

        link.abort();
        self.state.send_replace(ClientState::Disconnected);
        info!(url = %self.config.url, "Reverse WebSocket client stopped");
        Ok(())
    }

    /// Stops the loop and closes the active connection.
    pub fn shutdown(&self) {
        self.state.send_replace(ClientState::ShuttingDown);
        self.shutdown.cancel();
    }

    /// Sends `payload` over the active connection.
    pub async fn broadcast<T: Serialize + ?Sized>(&self, payload: &T) -> TransportResult<()> {
        let conn = self.active.lock().clone();
        match conn {
            Some(conn) => conn.send_json(payload).await,
            None => Err(TransportError::NotConnected),
        }
    }

    pub async fn broadcast_event(&self, event: &BoxedEvent) -> TransportResult<()> {
        self.broadcast(&event.to_json()?).await
    }

    async fn run(&self, run: &CancellationToken) {
        let url = &self.config.url;
        while !run.is_cancelled() {
            self.state.send_replace(ClientState::Connecting);
            debug!(%url, "Dialing reverse WebSocket");

            let dialed = tokio::select! {
                _ = run.cancelled() => break,
                dialed = self.dial() => dialed,
            };

            match dialed {
                Ok(stream) => self.serve(stream, run).await,
                Err(e) => warn!(%url, error = %e, "Reverse WebSocket dial failed"),
            }

            if run.is_cancelled() {
                break;
            }
            self.state.send_replace(ClientState::Disconnected);
            tokio::select! {
                _ = run.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_interval) => {}
            }
        }
        self.state.send_replace(ClientState::ShuttingDown);
    }

    async fn serve(&self, stream: WsStream, run: &CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sink, stream) = stream.split();
        let conn = Arc::new(WsConnection::new(
            id,
            ConnectionRole::Universal,
            Box::new(sink),
            run.child_token(),
            self.config.write_timeout,
        ));
        *self.active.lock() = Some(conn.clone());
        self.state.send_replace(ClientState::Connected);
        info!(conn_id = id, url = %self.config.url, "Reverse WebSocket connected");

        let ctx = RequestContext::new(Protocol::WsClient).with_connection_id(id);
        let result = serve_actions(
            &conn,
            stream.map(|message| message.map(inbound)),
            &*self.actions,
            &ctx,
            self.config.read_timeout,
        )
        .await;

        {
            let mut active = self.active.lock();
            if active.as_ref().is_some_and(|c| c.id() == id) {
                *active = None;
            }
        }
        conn.close_sink().await;

        match result {
            Ok(()) => info!(conn_id = id, "Reverse WebSocket closed"),
            Err(e) => warn!(conn_id = id, error = %e, "Reverse WebSocket connection lost"),
        }
    }

    async fn dial(&self) -> TransportResult<WsStream> {
        let request = self.build_request()?;
        let url = &self.config.url;

        let (stream, _response) =
            tokio::time::timeout(self.config.handshake_timeout, connect_async(request))
                .await
                .map_err(|_| TransportError::Timeout {
                    operation: "handshake",
                })?
                .map_err(|e| TransportError::ConnectionFailed {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
        Ok(stream)
    }

    fn build_request(&self) -> TransportResult<Request> {
        let invalid = |e: &dyn std::fmt::Display| TransportError::InvalidConfig(e.to_string());

        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e: tungstenite::Error| invalid(&e))?;

        let headers = request.headers_mut();
        if let Some(self_id) = self.config.self_id {
            headers.insert("X-Self-ID", HeaderValue::from(self_id));
        }
        headers.insert("X-Client-Role", HeaderValue::from_static("Universal"));
        if let Some(token) = self.config.access_token.as_deref().filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| invalid(&e))?;
            headers.insert("Authorization", value);
        }
        Ok(request)
    }
}
