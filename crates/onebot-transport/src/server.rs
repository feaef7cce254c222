//! Listener plumbing shared by the HTTP, WebSocket and unified servers.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap, header};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{TransportError, TransportResult};

/// Normalizes a route path to a single leading slash and no trailing one.
///
/// `""` and `"/"` both normalize to `""`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Normalizes the HTTP API prefix to `/` or `/prefix/`.
pub fn normalize_api_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Whether the request asks for a WebSocket upgrade.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

pub(crate) fn remote_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

pub(crate) async fn bind(addr: &str) -> TransportResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serves `router` until `token` is cancelled.
///
/// On cancellation `on_shutdown` runs first, then in-flight requests get
/// `grace` to finish before the server is dropped.
pub(crate) async fn serve_router<F>(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    token: CancellationToken,
    grace: Duration,
    on_shutdown: F,
) -> TransportResult<()>
where
    F: FnOnce() + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    info!(server = name, addr = %local_addr, "Server listening");

    let signal = {
        let token = token.clone();
        async move {
            token.cancelled().await;
            on_shutdown();
        }
    };

    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal)
    .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            if let Err(e) = &result {
                error!(server = name, error = %e, "Server failed");
            }
            return result.map_err(TransportError::Io);
        }
        _ = token.cancelled() => {
            info!(server = name, "Server shutting down");
        }
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(TransportError::Io),
        Err(_) => {
            warn!(server = name, grace = ?grace, "Grace period elapsed, dropping connections");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("/"), "");
        assert_eq!(normalize_path("api"), "/api");
        assert_eq!(normalize_path("/api/v1/"), "/api/v1");
    }

    #[test]
    fn test_normalize_api_prefix() {
        assert_eq!(normalize_api_prefix(""), "/");
        assert_eq!(normalize_api_prefix("//"), "/");
        assert_eq!(normalize_api_prefix("api"), "/api/");
        assert_eq!(normalize_api_prefix("/api/"), "/api/");
    }

    #[test]
    fn test_is_websocket_upgrade() {
        let mut headers = HeaderMap::new();
        assert!(!is_websocket_upgrade(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("WebSocket"));
        assert!(is_websocket_upgrade(&headers));

        headers.insert(header::UPGRADE, HeaderValue::from_static("h2c"));
        assert!(!is_websocket_upgrade(&headers));
    }
}
