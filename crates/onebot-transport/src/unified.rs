//! HTTP and WebSocket on a single listener.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    response::Response,
};
use onebot_core::{
    ActionRequestHandler, BoxedEvent, EventRequestHandler, UnifiedConfig,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::access::OriginCheck;
use crate::error::TransportResult;
use crate::http::HttpServer;
use crate::server::{bind, is_websocket_upgrade, serve_router};
use crate::websocket::WsServer;

/// Routes upgrade requests to a [`WsServer`] and the rest to an
/// [`HttpServer`], both behind one port.
#[derive(Clone)]
pub struct UnifiedServer {
    config: UnifiedConfig,
    http: HttpServer,
    ws: WsServer,
}

struct Routes {
    http: Router,
    ws: Router,
}

impl UnifiedServer {
    pub fn new(config: UnifiedConfig, actions: Arc<dyn ActionRequestHandler>) -> Self {
        let http = HttpServer::new(config.http.clone(), actions.clone());
        let ws = WsServer::new(config.ws.clone(), actions);
        Self { config, http, ws }
    }

    pub fn with_event_handler(mut self, events: Arc<dyn EventRequestHandler>) -> Self {
        self.http = self.http.with_event_handler(events);
        self
    }

    /// Replaces the WebSocket side, keeping the HTTP side.
    pub fn with_origin_check(
        mut self,
        actions: Arc<dyn ActionRequestHandler>,
        origin_check: OriginCheck,
    ) -> Self {
        self.ws = WsServer::with_origin_check(self.config.ws.clone(), actions, origin_check);
        self
    }

    pub fn config(&self) -> &UnifiedConfig {
        &self.config
    }

    pub fn http(&self) -> &HttpServer {
        &self.http
    }

    pub fn ws(&self) -> &WsServer {
        &self.ws
    }

    pub fn router(&self) -> Router {
        let routes = Arc::new(Routes {
            http: self.http.router(),
            ws: self.ws.router(),
        });
        Router::new().fallback(dispatch).with_state(routes)
    }

    /// Binds `config.addr` and serves until `token` is cancelled.
    pub async fn start(&self, token: CancellationToken) -> TransportResult<()> {
        let listener = bind(&self.config.addr).await?;
        self.serve(listener, token).await
    }

    /// WebSocket connections are closed before HTTP requests are drained.
    pub async fn serve(&self, listener: TcpListener, token: CancellationToken) -> TransportResult<()> {
        let ws = self.ws.clone();
        serve_router(
            "unified",
            listener,
            self.router(),
            token,
            self.config.shutdown_grace,
            move || ws.shutdown(),
        )
        .await
    }

    pub async fn broadcast_event(&self, event: &BoxedEvent) -> TransportResult<()> {
        self.ws.broadcast_event(event).await
    }
}

async fn dispatch(State(routes): State<Arc<Routes>>, request: Request) -> Response {
    let router = if is_websocket_upgrade(request.headers()) {
        routes.ws.clone()
    } else {
        routes.http.clone()
    };
    match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use onebot_core::{ActionDispatcher, ActionRawResponse, HttpServerConfig, WsServerConfig};

    fn server() -> UnifiedServer {
        let mut actions = ActionDispatcher::new();
        actions.register_fn("ping", |_ctx, _params| async {
            Ok(Some(ActionRawResponse::ok(serde_json::json!("pong"))))
        });
        let config = UnifiedConfig {
            http: HttpServerConfig::default(),
            ws: WsServerConfig::default().with_token("secret"),
            ..UnifiedConfig::default()
        };
        UnifiedServer::new(config, Arc::new(actions))
    }

    #[tokio::test]
    async fn test_plain_request_goes_to_http() {
        let request = Request::builder().uri("/ping").body(Body::empty()).unwrap();
        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_upgrade_request_goes_to_ws() {
        // Only the WS side requires a token.
        let request = Request::builder()
            .uri("/ping")
            .header(header::UPGRADE, "WebSocket")
            .body(Body::empty())
            .unwrap();
        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let request = Request::builder()
            .uri("/api")
            .header(header::UPGRADE, "websocket")
            .body(Body::empty())
            .unwrap();
        let response = server().router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
