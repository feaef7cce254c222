//! Runs every configured transport against one pair of dispatchers.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use onebot_runtime::OneBotRuntime;
//!
//! let runtime = OneBotRuntime::builder()
//!     .config_file("onebot.toml")
//!     .actions(actions)
//!     .events(events)
//!     .build()?;
//!
//! runtime.run_until_ctrl_c().await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, join_all};
use onebot_core::{
    ActionDispatcher, ActionRequestHandler, BoxedEvent, EventDispatcher, EventRequestHandler,
};
use onebot_transport::{
    HttpActionClient, HttpServer, TransportError, TransportResult, UnifiedServer, WsClient,
    WsServer,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, OneBotConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Owns the transports built from a [`OneBotConfig`].
///
/// Actions arriving on any transport go to the same [`ActionDispatcher`];
/// events posted over HTTP go to the same [`EventDispatcher`].
pub struct OneBotRuntime {
    config: OneBotConfig,
    http: Option<HttpServer>,
    ws: Option<WsServer>,
    unified: Option<UnifiedServer>,
    reverse: Vec<Arc<WsClient>>,
    http_client: Option<HttpActionClient>,
}

impl OneBotRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Builds every transport named in `config` and installs logging.
    pub fn from_config(
        config: OneBotConfig,
        actions: ActionDispatcher,
        events: EventDispatcher,
    ) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let actions: Arc<dyn ActionRequestHandler> = Arc::new(actions);
        let events: Arc<dyn EventRequestHandler> = Arc::new(events);

        let http = config
            .http
            .clone()
            .map(|c| HttpServer::new(c, actions.clone()).with_event_handler(events.clone()));
        let ws = config.ws.clone().map(|c| WsServer::new(c, actions.clone()));
        let unified = config
            .unified
            .clone()
            .map(|c| UnifiedServer::new(c, actions.clone()).with_event_handler(events.clone()));
        let reverse = config
            .ws_reverse
            .iter()
            .cloned()
            .map(|c| Arc::new(WsClient::new(c, actions.clone())))
            .collect();
        let http_client = config
            .http_client
            .clone()
            .map(HttpActionClient::new)
            .transpose()?;

        info!(
            log_level = %config.logging.level,
            http = config.http.is_some(),
            ws = config.ws.is_some(),
            unified = config.unified.is_some(),
            ws_reverse = config.ws_reverse.len(),
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            http,
            ws,
            unified,
            reverse,
            http_client,
        })
    }

    pub fn config(&self) -> &OneBotConfig {
        &self.config
    }

    /// Client for the configured remote action endpoint.
    pub fn http_client(&self) -> Option<&HttpActionClient> {
        self.http_client.as_ref()
    }

    /// Starts every transport and waits until all have stopped.
    ///
    /// Cancelling `token` stops them gracefully. If one transport fails, the
    /// others are stopped too and the first failure is returned.
    pub async fn run(&self, token: CancellationToken) -> RuntimeResult<()> {
        let token = token.child_token();
        let mut tasks: Vec<BoxFuture<'_, RuntimeResult<()>>> = Vec::new();

        if let Some(http) = &self.http {
            tasks.push(supervise("http".into(), http.start(token.clone()), &token));
        }
        if let Some(ws) = &self.ws {
            tasks.push(supervise("ws".into(), ws.start(token.clone()), &token));
        }
        if let Some(unified) = &self.unified {
            tasks.push(supervise("unified".into(), unified.start(token.clone()), &token));
        }
        for (i, client) in self.reverse.iter().enumerate() {
            tasks.push(supervise(
                format!("ws_reverse[{i}]"),
                client.start(token.clone()),
                &token,
            ));
        }

        if tasks.is_empty() {
            return Err(RuntimeError::NoTransport);
        }

        info!(transports = tasks.len(), "OneBot runtime started");
        let results = join_all(tasks).await;
        info!("OneBot runtime stopped");

        results.into_iter().collect()
    }

    /// Like [`OneBotRuntime::run`], stopping on Ctrl+C or SIGTERM.
    pub async fn run_until_ctrl_c(&self) -> RuntimeResult<()> {
        let token = CancellationToken::new();
        let run = self.run(token.clone());
        tokio::pin!(run);

        let signal = tokio::select! {
            result = &mut run => return result,
            signal = wait_for_shutdown() => signal,
        };

        token.cancel();
        let result = run.await;
        signal.map_err(RuntimeError::Signal)?;
        result
    }

    /// Pushes `event` to every forward WebSocket peer and every connected
    /// reverse client.
    ///
    /// Delivery is best effort; the last failure is returned.
    pub async fn broadcast_event(&self, event: &BoxedEvent) -> RuntimeResult<()> {
        let mut sends: Vec<BoxFuture<'_, (String, TransportResult<()>)>> = Vec::new();

        if let Some(ws) = &self.ws {
            sends.push(async { ("ws".to_string(), ws.broadcast_event(event).await) }.boxed());
        }
        if let Some(unified) = &self.unified {
            sends.push(
                async { ("unified".to_string(), unified.broadcast_event(event).await) }.boxed(),
            );
        }
        for (i, client) in self.reverse.iter().enumerate() {
            sends.push(
                async move {
                    (format!("ws_reverse[{i}]"), client.broadcast_event(event).await)
                }
                .boxed(),
            );
        }

        let mut last_error = None;
        for (transport, result) in join_all(sends).await {
            match result {
                Ok(()) => {}
                Err(TransportError::NotConnected) => {
                    debug!(%transport, "Skipping event push, not connected");
                }
                Err(e) => {
                    warn!(%transport, error = %e, "Event push failed");
                    last_error = Some(RuntimeError::transport(transport, e));
                }
            }
        }
        last_error.map_or(Ok(()), Err)
    }
}

/// Maps a transport's failure and stops its siblings.
fn supervise<'a, F>(
    name: String,
    transport: F,
    token: &CancellationToken,
) -> BoxFuture<'a, RuntimeResult<()>>
where
    F: Future<Output = TransportResult<()>> + Send + 'a,
{
    let token = token.clone();
    async move {
        transport.await.map_err(|e| {
            error!(transport = %name, error = %e, "Transport failed, stopping runtime");
            token.cancel();
            RuntimeError::transport(name, e)
        })
    }
    .boxed()
}

async fn wait_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Loads configuration and assembles a [`OneBotRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    actions: ActionDispatcher,
    events: EventDispatcher,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            actions: ActionDispatcher::new(),
            events: EventDispatcher::new(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: OneBotConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    pub fn actions(mut self, actions: ActionDispatcher) -> Self {
        self.actions = actions;
        self
    }

    pub fn events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    pub fn build(self) -> RuntimeResult<OneBotRuntime> {
        let config = self.config_loader.load()?;
        OneBotRuntime::from_config(config, self.actions, self.events)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onebot_core::{HttpServerConfig, WsClientConfig, WsServerConfig};
    use serde_json::json;
    use std::time::Duration;

    fn runtime(config: OneBotConfig) -> OneBotRuntime {
        OneBotRuntime::from_config(config, ActionDispatcher::new(), EventDispatcher::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_without_transport() {
        let err = runtime(OneBotConfig::default())
            .run(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::NoTransport));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let runtime = runtime(OneBotConfig {
            http: Some(HttpServerConfig::new("127.0.0.1:0")),
            ws: Some(WsServerConfig::new("127.0.0.1:0")),
            ws_reverse: vec![
                WsClientConfig::new("ws://127.0.0.1:1/").with_reconnect_interval(Duration::from_secs(60)),
            ],
            ..Default::default()
        });

        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                token.cancel();
            })
        };

        tokio::time::timeout(Duration::from_secs(10), runtime.run(token))
            .await
            .expect("runtime did not stop")
            .unwrap();
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_transport_stops_the_rest() {
        let runtime = runtime(OneBotConfig {
            http: Some(HttpServerConfig::new("not-an-address")),
            ws: Some(WsServerConfig::new("127.0.0.1:0")),
            ..Default::default()
        });

        let err = tokio::time::timeout(Duration::from_secs(10), runtime.run(CancellationToken::new()))
            .await
            .expect("runtime did not stop")
            .unwrap_err();
        match err {
            RuntimeError::Transport { transport, source } => {
                assert_eq!(transport, "http");
                assert!(matches!(source, TransportError::Bind { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_peers() {
        let runtime = runtime(OneBotConfig {
            ws: Some(WsServerConfig::new("127.0.0.1:0")),
            ws_reverse: vec![WsClientConfig::new("ws://127.0.0.1:1/")],
            ..Default::default()
        });
        let event = onebot_event::default_registry()
            .decode_value(json!({
                "time": 1,
                "self_id": 10001,
                "post_type": "meta_event",
                "meta_event_type": "heartbeat",
                "interval": 5000
            }))
            .unwrap();

        runtime.broadcast_event(&event).await.unwrap();
    }

    #[test]
    fn test_invalid_http_client_config() {
        let result = OneBotRuntime::from_config(
            OneBotConfig {
                http_client: Some(onebot_core::HttpClientConfig::new("")),
                ..Default::default()
            },
            ActionDispatcher::new(),
            EventDispatcher::new(),
        );
        assert!(matches!(result, Err(RuntimeError::HttpClient(_))));
    }
}
