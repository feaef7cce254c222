//! HTTP server for actions and posted events.
//!
//! ```text
//! POST/GET {api_prefix}{action} ──▶ access check ──▶ params ──▶ ActionRequestHandler ──▶ JSON
//! POST     {event_path}         ──▶ access check ──▶ EventTypeRegistry ──▶ EventRequestHandler
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
};
use onebot_core::{
    ActionError, ActionRawResponse, ActionRequest, ActionRequestHandler, EventOutcome,
    EventRequestHandler, EventTypeRegistry, HttpServerConfig, Protocol, RejectActions,
    RequestContext,
};
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, trace, warn};

use super::params::{ParamsError, parse_params};
use crate::access::check_access;
use crate::error::TransportResult;
use crate::server::{bind, normalize_api_prefix, normalize_path, remote_addr, serve_router};

const DEFAULT_EVENT_PATH: &str = "/event";

/// Serves OneBot actions over HTTP and optionally ingests posted events.
#[derive(Clone)]
pub struct HttpServer {
    config: HttpServerConfig,
    actions: Arc<dyn ActionRequestHandler>,
    events: Option<Arc<dyn EventRequestHandler>>,
    registry: Arc<EventTypeRegistry>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, actions: Arc<dyn ActionRequestHandler>) -> Self {
        Self {
            config,
            actions,
            events: None,
            registry: onebot_event::default_registry(),
        }
    }

    /// A server that only ingests events and rejects every action.
    ///
    /// The event route defaults to `/event`.
    pub fn event_only(
        mut config: HttpServerConfig,
        events: Arc<dyn EventRequestHandler>,
    ) -> Self {
        let has_path = config
            .event_path
            .as_deref()
            .is_some_and(|p| !normalize_path(p).is_empty());
        if !has_path {
            config.event_path = Some(DEFAULT_EVENT_PATH.to_string());
        }
        Self::new(config, Arc::new(RejectActions)).with_event_handler(events)
    }

    /// Handles events posted to the configured event path.
    ///
    /// Without a handler, decoded events are acknowledged with 204.
    pub fn with_event_handler(mut self, events: Arc<dyn EventRequestHandler>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_event_registry(mut self, registry: Arc<EventTypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    /// Normalized event route, if event ingestion is enabled.
    pub fn event_path(&self) -> Option<String> {
        self.config
            .event_path
            .as_deref()
            .map(normalize_path)
            .filter(|p| !p.is_empty())
    }

    /// Builds the request router.
    pub fn router(&self) -> Router {
        let state = Arc::new(HttpState {
            api_prefix: normalize_api_prefix(&self.config.api_prefix),
            access_token: self.config.access_token.clone(),
            body_limit: self.config.body_limit,
            actions: self.actions.clone(),
            events: self.events.clone(),
            registry: self.registry.clone(),
        });

        let mut router = Router::new();
        if let Some(path) = self.event_path() {
            router = router.route(&path, any(handle_event));
        }
        let mut router = router
            .fallback(handle_action)
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if let Some(timeout) = self.config.request_timeout {
            router = router.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ));
        }
        router
    }

    /// Binds the configured address and serves until `token` is cancelled.
    pub async fn start(&self, token: CancellationToken) -> TransportResult<()> {
        let listener = bind(&self.config.addr).await?;
        self.serve(listener, token).await
    }

    /// Serves on an already bound listener until `token` is cancelled.
    pub async fn serve(&self, listener: TcpListener, token: CancellationToken) -> TransportResult<()> {
        serve_router(
            "http",
            listener,
            self.router(),
            token,
            self.config.shutdown_grace,
            || {},
        )
        .await
    }
}

struct HttpState {
    api_prefix: String,
    access_token: Option<String>,
    body_limit: usize,
    actions: Arc<dyn ActionRequestHandler>,
    events: Option<Arc<dyn EventRequestHandler>>,
    registry: Arc<EventTypeRegistry>,
}

impl HttpState {
    fn extract_action<'a>(&self, path: &'a str) -> Option<Cow<'a, str>> {
        let action = path.strip_prefix(&self.api_prefix)?.trim_matches('/');
        let action = percent_decode_str(action).decode_utf8().ok()?;
        (!action.is_empty()).then_some(action)
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, ParamsError> {
        axum::body::to_bytes(body, self.body_limit)
            .await
            .map_err(|_| ParamsError::BodyTooLarge)
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found").into_response()
}

fn text(status: StatusCode, message: impl ToString) -> Response {
    (status, message.to_string()).into_response()
}

async fn handle_action(State(state): State<Arc<HttpState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let Some(action) = state.extract_action(parts.uri.path()) else {
        return not_found();
    };
    let action = &*action;

    if let Err(e) = check_access(
        state.access_token.as_deref(),
        &parts.headers,
        parts.uri.query(),
    ) {
        debug!(action, error = %e, "Rejected action request");
        return text(e.status_code(), e);
    }

    let body = if [Method::POST, Method::PUT, Method::PATCH].contains(&parts.method) {
        match state.read_body(body).await {
            Ok(body) => body,
            Err(e) => return text(e.status_code(), e),
        }
    } else {
        Bytes::new()
    };

    let params = match parse_params(&parts.method, &parts.headers, parts.uri.query(), &body) {
        Ok(params) => params,
        Err(e) => return text(e.status_code(), e),
    };

    let ctx = RequestContext::new(Protocol::Http).with_remote_addr(remote_addr(&parts.extensions));
    trace!(action, remote_addr = ?ctx.remote_addr, "Handling HTTP action");

    let result = state
        .actions
        .handle_action_request(&ctx, ActionRequest::new(action, params))
        .await;

    match result {
        Ok(Some(response)) => Json(response).into_response(),
        Ok(None) => Json(ActionRawResponse::empty()).into_response(),
        Err(ActionError::NotFound(_)) => not_found(),
        Err(e @ ActionError::BadRequest(_)) => text(StatusCode::BAD_REQUEST, e),
        Err(e) => {
            warn!(action, error = %e, "Action handler failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn handle_event(State(state): State<Arc<HttpState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    if parts.method != Method::POST {
        return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }

    if let Err(e) = check_access(
        state.access_token.as_deref(),
        &parts.headers,
        parts.uri.query(),
    ) {
        debug!(error = %e, "Rejected event post");
        return text(e.status_code(), e);
    }

    let body = match state.read_body(body).await {
        Ok(body) => body,
        Err(e) => return text(e.status_code(), e),
    };

    let event = match state.registry.decode(&body) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Rejected undecodable event");
            return text(StatusCode::BAD_REQUEST, e);
        }
    };

    let Some(handler) = &state.events else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let ctx = RequestContext::new(Protocol::Http).with_remote_addr(remote_addr(&parts.extensions));
    match handler.handle_event(&ctx, event).await {
        Ok(EventOutcome::Reply(reply)) if !reply.is_empty() => Json(reply).into_response(),
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            warn!(error = %e, "Event handler failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use onebot_core::{ActionDispatcher, BoxError, EventDispatcher, QuickOperation};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn dispatcher() -> Arc<ActionDispatcher> {
        let mut dispatcher = ActionDispatcher::new();
        dispatcher.register_fn("echo", |_ctx, params| async move {
            Ok(Some(ActionRawResponse::ok(Value::Object(params))))
        });
        dispatcher.register_fn("nothing", |_ctx, _params| async move { Ok(None) });
        dispatcher.register_fn("strict", |_ctx, _params| async move {
            Err(ActionError::bad_request("user_id required"))
        });
        dispatcher.register_fn("broken", |_ctx, _params| async move {
            Err(ActionError::handler("database offline"))
        });
        Arc::new(dispatcher)
    }

    async fn send(router: Router, request: Request) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_action_routing() {
        let server = HttpServer::new(HttpServerConfig::default().with_api_prefix("api"), dispatcher());

        let (status, body) = send(server.router(), get("/api/echo?user_id=7")).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            json!({"status": "ok", "retcode": 0, "data": {"user_id": "7"}})
        );

        let (status, _) = send(server.router(), get("/api/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(server.router(), get("/other/echo")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(server.router(), get("/api/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_encoded_action_name() {
        let server = HttpServer::new(HttpServerConfig::default(), dispatcher());

        let (status, body) = send(server.router(), get("/ech%6F?user_id=7")).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["data"], json!({"user_id": "7"}));

        let (status, _) = send(server.router(), get("/%FF%FE")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_handler_error_mapping() {
        let server = HttpServer::new(HttpServerConfig::default(), dispatcher());

        let (status, body) = send(server.router(), get("/strict")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("user_id required"));

        let (status, _) = send(server.router(), get("/broken")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = send(server.router(), get("/nothing")).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            json!({"status": "failed", "retcode": -1, "message": "empty response"})
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let server = HttpServer::new(HttpServerConfig::default(), dispatcher());
        let (status, body) = send(server.router(), post_json("/echo", "{oops")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "invalid json");
    }

    #[tokio::test]
    async fn test_access_token() {
        let server = HttpServer::new(HttpServerConfig::default().with_token("secret"), dispatcher());

        let (status, _) = send(server.router(), get("/echo")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(server.router(), get("/echo?access_token=nope")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let request = Request::builder()
            .uri("/echo")
            .header(header::AUTHORIZATION, "Bearer secret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(server.router(), request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let mut config = HttpServerConfig::default();
        config.body_limit = 8;
        let server = HttpServer::new(config, dispatcher());
        let (status, _) = send(
            server.router(),
            post_json("/echo", r#"{"message": "far too long"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    fn heartbeat() -> String {
        json!({
            "time": 1, "self_id": 2, "post_type": "meta_event",
            "meta_event_type": "heartbeat", "interval": 5000,
            "status": {"online": true, "good": true}
        })
        .to_string()
    }

    fn private_message(text: &str) -> String {
        json!({
            "time": 1, "self_id": 2, "post_type": "message", "message_type": "private",
            "sub_type": "friend", "message_id": 3, "user_id": 4, "message": text,
            "raw_message": text, "font": 0, "sender": {}
        })
        .to_string()
    }

    fn event_server() -> HttpServer {
        let mut events = EventDispatcher::new();
        events.register_fn("message/private", |_ctx, event| async move {
            let msg = event
                .downcast_ref::<onebot_event::PrivateMessageEvent>()
                .map(|m| m.plain_text())
                .unwrap_or_default();
            if msg == "quiet" {
                return Ok(Some(QuickOperation::new()));
            }
            if msg == "fail" {
                return Err(BoxError::from("storage offline"));
            }
            let mut reply = QuickOperation::new();
            reply.insert("reply".to_string(), Value::String(msg));
            Ok(Some(reply))
        });
        HttpServer::event_only(HttpServerConfig::default(), Arc::new(events))
    }

    #[tokio::test]
    async fn test_event_route() {
        let server = event_server();
        assert_eq!(server.event_path().as_deref(), Some("/event"));

        let (status, body) = send(server.router(), post_json("/event", &private_message("hi"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"reply": "hi"}));

        let (status, _) = send(server.router(), post_json("/event", &private_message("quiet"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(server.router(), post_json("/event", &heartbeat())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(server.router(), post_json("/event", &private_message("fail"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = send(server.router(), post_json("/event", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(server.router(), get("/event")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, _) = send(server.router(), get("/get_status")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_without_handler_is_acknowledged() {
        let server = HttpServer::new(
            HttpServerConfig::default().with_event_path("/post/"),
            dispatcher(),
        );
        assert_eq!(server.event_path().as_deref(), Some("/post"));
        let (status, _) = send(server.router(), post_json("/post", &heartbeat())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_root_event_path_disables_route() {
        let server = HttpServer::new(HttpServerConfig::default().with_event_path("/"), dispatcher());
        assert_eq!(server.event_path(), None);
    }
}
