//! Runtime error types.

use onebot_transport::{ClientError, TransportError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or running a [`OneBotRuntime`](crate::OneBotRuntime).
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A transport failed to start or stopped with an error.
    #[error("{transport} transport failed: {source}")]
    Transport {
        transport: String,
        #[source]
        source: TransportError,
    },

    /// The HTTP action client could not be built.
    #[error("http client error: {0}")]
    HttpClient(#[from] ClientError),

    /// The configuration enables no transport.
    #[error("no transport configured")]
    NoTransport,

    /// Installing the shutdown signal handler failed.
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

impl RuntimeError {
    pub fn transport(transport: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            transport: transport.into(),
            source,
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
