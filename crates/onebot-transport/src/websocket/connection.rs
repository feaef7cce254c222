//! Connection bookkeeping shared by the WebSocket server and client.
//!
//! ```text
//!                    ┌──────────────┐
//! read loop ────────▶│ WsConnection │◀──────── broadcast
//! (action replies)   │  sink mutex  │   (ConnectionGroup)
//!                    └──────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt, future};
use onebot_core::{ActionRequestHandler, RequestContext, handle_action_frame};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{TransportError, TransportResult};

// ============================================================================
// Frame I/O
// ============================================================================

/// Write half of a WebSocket, independent of the WebSocket library.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, text: String) -> TransportResult<()>;

    /// Sends a close frame. Errors are ignored by callers.
    async fn close(&mut self) -> TransportResult<()>;
}

/// A decoded inbound frame.
#[derive(Debug)]
pub(crate) enum Inbound {
    Frame(Vec<u8>),
    Close,
    /// Control frames handled by the library.
    Control,
}

/// Role of a server-side connection, chosen by its upgrade path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionRole {
    /// Request/response only.
    Api,
    /// Receives broadcasts, inbound frames are ignored.
    Event,
    /// Request/response and broadcasts.
    Universal,
}

impl ConnectionRole {
    /// Whether the connection receives broadcasts.
    pub fn is_tracked(&self) -> bool {
        matches!(self, Self::Event | Self::Universal)
    }

    pub fn serves_actions(&self) -> bool {
        matches!(self, Self::Api | Self::Universal)
    }
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Api => "api",
            Self::Event => "event",
            Self::Universal => "universal",
        })
    }
}

// ============================================================================
// WsConnection
// ============================================================================

/// One live WebSocket connection.
///
/// Writes are serialized by the sink mutex, so action replies and
/// broadcasts never interleave on the wire.
pub struct WsConnection {
    id: u64,
    role: ConnectionRole,
    sink: tokio::sync::Mutex<Box<dyn FrameSink>>,
    token: CancellationToken,
    write_timeout: Option<Duration>,
}

impl WsConnection {
    pub fn new(
        id: u64,
        role: ConnectionRole,
        sink: Box<dyn FrameSink>,
        token: CancellationToken,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            id,
            role,
            sink: tokio::sync::Mutex::new(sink),
            token,
            write_timeout,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Cancelled when the connection is asked to close.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Writes one text frame, honouring the write deadline.
    pub async fn send_text(&self, text: String) -> TransportResult<()> {
        if self.token.is_cancelled() {
            return Err(TransportError::ConnectionClosed {
                reason: "connection is closing".into(),
            });
        }

        let mut sink = self.sink.lock().await;
        match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, sink.send_text(text))
                .await
                .map_err(|_| TransportError::Timeout { operation: "write" })?,
            None => sink.send_text(text).await,
        }
    }

    pub async fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> TransportResult<()> {
        self.send_text(serde_json::to_string(value)?).await
    }

    /// Asks the read loop to stop.
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Sends a close frame to the peer.
    pub(crate) async fn close_sink(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.close().await {
            trace!(conn_id = self.id, error = %e, "Close frame not delivered");
        }
    }
}

impl fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Read loops
// ============================================================================

async fn next_frame<S, E>(
    stream: &mut S,
    read_timeout: Option<Duration>,
) -> TransportResult<Option<Result<Inbound, E>>>
where
    S: Stream<Item = Result<Inbound, E>> + Unpin,
{
    match read_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| TransportError::Timeout { operation: "read" }),
        None => Ok(stream.next().await),
    }
}

/// Answers action frames until the peer closes, the read fails or the
/// connection is cancelled.
///
/// A frame that is not a valid request is answered with a 1400 envelope and
/// the loop keeps going.
pub(crate) async fn serve_actions<S, E>(
    conn: &WsConnection,
    mut stream: S,
    handler: &dyn ActionRequestHandler,
    ctx: &RequestContext,
    read_timeout: Option<Duration>,
) -> TransportResult<()>
where
    S: Stream<Item = Result<Inbound, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let next = tokio::select! {
            _ = conn.token.cancelled() => return Ok(()),
            next = next_frame(&mut stream, read_timeout) => next?,
        };

        match next {
            None | Some(Ok(Inbound::Close)) => return Ok(()),
            Some(Ok(Inbound::Control)) => continue,
            Some(Ok(Inbound::Frame(data))) => {
                trace!(conn_id = conn.id, len = data.len(), "Received action frame");
                let reply = tokio::select! {
                    _ = conn.token.cancelled() => return Ok(()),
                    reply = handle_action_frame(handler, ctx, &data) => reply,
                };
                conn.send_json(&reply).await?;
            }
            Some(Err(e)) => {
                return Err(TransportError::ConnectionClosed {
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Reads and discards frames until the connection ends.
#[cfg(feature = "ws-server")]
pub(crate) async fn drain<S, E>(
    conn: &WsConnection,
    mut stream: S,
    read_timeout: Option<Duration>,
) -> TransportResult<()>
where
    S: Stream<Item = Result<Inbound, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        let next = tokio::select! {
            _ = conn.token.cancelled() => return Ok(()),
            next = next_frame(&mut stream, read_timeout) => next?,
        };
        match next {
            None | Some(Ok(Inbound::Close)) => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                return Err(TransportError::ConnectionClosed {
                    reason: e.to_string(),
                });
            }
        }
    }
}

// ============================================================================
// ConnectionGroup
// ============================================================================

/// Connections that receive broadcasts.
#[derive(Debug, Default)]
pub struct ConnectionGroup {
    conns: Mutex<HashMap<u64, Arc<WsConnection>>>,
}

impl ConnectionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conn: Arc<WsConnection>) {
        self.conns.lock().insert(conn.id(), conn);
    }

    pub fn remove(&self, id: u64) -> Option<Arc<WsConnection>> {
        self.conns.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.lock().is_empty()
    }

    /// Copies the member list so no lock is held across writes.
    pub fn snapshot(&self) -> Vec<Arc<WsConnection>> {
        self.conns.lock().values().cloned().collect()
    }

    /// Cancels every member. Members remove themselves as their loops end.
    pub fn close_all(&self) {
        for conn in self.snapshot() {
            conn.close();
        }
    }

    /// Sends `text` to every member.
    ///
    /// A failed write does not stop delivery to the others. The last error
    /// seen is returned.
    pub async fn broadcast_text(&self, text: &str) -> TransportResult<()> {
        let conns = self.snapshot();
        if conns.is_empty() {
            debug!("Broadcast skipped, no connections");
            return Ok(());
        }

        let results = future::join_all(conns.iter().map(|conn| async move {
            let result = conn.send_text(text.to_string()).await;
            if let Err(e) = &result {
                warn!(conn_id = conn.id(), role = %conn.role(), error = %e, "Broadcast write failed");
            }
            result
        }))
        .await;

        results.into_iter().filter_map(Result::err).last().map_or(Ok(()), Err)
    }

    pub async fn broadcast<T: Serialize + ?Sized>(&self, payload: &T) -> TransportResult<()> {
        let text = serde_json::to_string(payload)?;
        self.broadcast_text(&text).await
    }
}
