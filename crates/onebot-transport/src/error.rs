//! Transport error types.

use thiserror::Error;

/// Errors raised while running a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The reverse client has no URL to dial.
    #[error("reverse websocket client url is empty")]
    EmptyUrl,

    /// Dial or handshake failure.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// The peer went away or the connection was closed locally.
    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: String },

    /// A frame could not be written.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// A per-operation deadline expired.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    /// No connection is currently established.
    #[error("not connected")]
    NotConnected,

    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

// ============================================================================
// HTTP action client errors
// ============================================================================

/// Errors returned by [`HttpActionClient`](crate::http::HttpActionClient).
#[cfg(feature = "http-client")]
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("unexpected http status {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint answered with a failed action response.
    #[error("action {action} failed: status={status}, retcode={retcode}, message={message}")]
    Action {
        action: String,
        status: onebot_core::ActionStatus,
        retcode: i64,
        message: String,
    },

    #[error("decode response failed: {0}")]
    Decode(#[from] serde_json::Error),
}

#[cfg(feature = "http-client")]
pub type ClientResult<T> = Result<T, ClientError>;
