//! Configuration types for transports.
//!
//! Every type deserializes with defaults for all fields, so a config file
//! only has to name what differs. Durations are written as `"5s"`,
//! `"500ms"`, `"2m"` or a bare number of seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// HTTP Server Config
// =============================================================================

/// Configuration for the HTTP action/event server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    /// Listen address, e.g. `0.0.0.0:5700`.
    pub addr: String,
    /// Prefix in front of every action path. Empty means `/`.
    pub api_prefix: String,
    /// Route that accepts posted events. `None` disables event ingestion.
    pub event_path: Option<String>,
    /// Static access token. `None` disables the access check.
    pub access_token: Option<String>,
    /// Deadline for reading a request and writing its response.
    #[serde(with = "humantime_serde::option")]
    pub request_timeout: Option<Duration>,
    /// Largest accepted request body in bytes.
    pub body_limit: usize,
    /// Grace period for in-flight requests on shutdown.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5700".to_string(),
            api_prefix: String::new(),
            event_path: None,
            access_token: None,
            request_timeout: None,
            body_limit: 10 * 1024 * 1024,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl HttpServerConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_event_path(mut self, path: impl Into<String>) -> Self {
        self.event_path = Some(path.into());
        self
    }
}

// =============================================================================
// WebSocket Server Config
// =============================================================================

/// Configuration for the forward WebSocket server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsServerConfig {
    /// Listen address, e.g. `0.0.0.0:6700`.
    pub addr: String,
    /// Prefix for `/api`, `/event` and the universal path.
    pub path_prefix: String,
    pub access_token: Option<String>,
    /// Per-frame read deadline. `None` waits forever.
    #[serde(with = "humantime_serde::option")]
    pub read_timeout: Option<Duration>,
    /// Per-frame write deadline. `None` waits forever.
    #[serde(with = "humantime_serde::option")]
    pub write_timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for WsServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:6700".to_string(),
            path_prefix: String::new(),
            access_token: None,
            read_timeout: None,
            write_timeout: None,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl WsServerConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }
}

// =============================================================================
// WebSocket Client Config
// =============================================================================

/// Configuration for the reverse WebSocket client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsClientConfig {
    /// URL to dial, e.g. `ws://127.0.0.1:8080/onebot/v11/ws`.
    pub url: String,
    pub access_token: Option<String>,
    /// Sent as `X-Self-ID` during the handshake.
    pub self_id: Option<i64>,
    /// Pause between a failed or closed connection and the next dial.
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub handshake_timeout: Duration,
    #[serde(with = "humantime_serde::option")]
    pub read_timeout: Option<Duration>,
    #[serde(with = "humantime_serde::option")]
    pub write_timeout: Option<Duration>,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_token: None,
            self_id: None,
            reconnect_interval: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(10),
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl WsClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_self_id(mut self, self_id: i64) -> Self {
        self.self_id = Some(self_id);
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }
}

// =============================================================================
// Unified Server Config
// =============================================================================

/// One listener serving both HTTP and WebSocket.
///
/// The `addr` fields of the nested configs are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnifiedConfig {
    pub addr: String,
    pub http: HttpServerConfig,
    pub ws: WsServerConfig,
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for UnifiedConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:5700".to_string(),
            http: HttpServerConfig::default(),
            ws: WsServerConfig::default(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

// =============================================================================
// HTTP Client Config
// =============================================================================

/// Configuration for calling actions on a remote HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Base URL; the action name is appended as the last path segment.
    pub base_url: String,
    /// Sent as a Bearer token.
    pub access_token: Option<String>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            access_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(5)
}

/// Serde helpers for human readable durations.
pub mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
        }
    }

    /// Parses `"500ms"`, `"5s"`, `"2m"` or a bare number of seconds.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let (digits, unit): (&str, fn(u64) -> Duration) = if let Some(ms) = s.strip_suffix("ms") {
            (ms, Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            (secs, Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            (mins, |m| Duration::from_secs(m * 60))
        } else {
            (s, Duration::from_secs)
        };
        digits
            .trim()
            .parse::<u64>()
            .map(unit)
            .map_err(|e| format!("invalid duration '{s}': {e}"))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<Raw>::deserialize(deserializer)? {
                None => Ok(None),
                Some(Raw::Secs(secs)) => Ok(Some(Duration::from_secs(secs))),
                Some(Raw::Text(s)) => parse_duration(&s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_duration() {
        use humantime_serde::parse_duration;
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration(" 7 "), Ok(Duration::from_secs(7)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg: WsClientConfig = serde_json::from_value(json!({"url": "ws://x"})).unwrap();
        assert_eq!(cfg.reconnect_interval, Duration::from_secs(3));
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(10));
        assert_eq!(cfg.read_timeout, None);

        let cfg: HttpServerConfig =
            serde_json::from_value(json!({"request_timeout": "250ms", "event_path": "/event"}))
                .unwrap();
        assert_eq!(cfg.request_timeout, Some(Duration::from_millis(250)));
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_serialized_durations_round_trip() {
        let cfg = WsServerConfig {
            write_timeout: Some(Duration::from_millis(1500)),
            ..Default::default()
        };
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["write_timeout"], json!("1500ms"));
        let back: WsServerConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, cfg);
    }
}
