//! Configuration validation.

use std::collections::HashSet;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, OneBotConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &OneBotConfig) -> ConfigResult<()> {
    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }

    validate_listeners(config)?;

    for (i, client) in config.ws_reverse.iter().enumerate() {
        validate_url(&client.url, &format!("ws_reverse[{i}].url"), &["ws://", "wss://"])?;
        validate_positive(
            client.reconnect_interval,
            &format!("ws_reverse[{i}].reconnect_interval"),
        )?;
    }

    if let Some(client) = &config.http_client {
        validate_url(&client.base_url, "http_client.base_url", &["http://", "https://"])?;
    }

    Ok(())
}

/// Every configured listener needs an address, and no two may share one.
fn validate_listeners(config: &OneBotConfig) -> ConfigResult<()> {
    let listeners = [
        ("http.addr", config.http.as_ref().map(|c| c.addr.as_str())),
        ("ws.addr", config.ws.as_ref().map(|c| c.addr.as_str())),
        ("unified.addr", config.unified.as_ref().map(|c| c.addr.as_str())),
    ];

    let mut seen = HashSet::new();
    for (field, addr) in listeners {
        let Some(addr) = addr else { continue };
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(ConfigError::validation(format!("{field} is empty")));
        }
        if !seen.insert(addr) {
            return Err(ConfigError::validation(format!(
                "{field} {addr} is already used by another listener"
            )));
        }
    }
    Ok(())
}

fn validate_url(url: &str, field: &str, schemes: &[&str]) -> ConfigResult<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ConfigError::validation(format!("{field} is empty")));
    }
    if !schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {schemes:?}"),
        ));
    }
    Ok(())
}

fn validate_positive(value: Duration, field: &str) -> ConfigResult<()> {
    if value.is_zero() {
        return Err(ConfigError::validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use onebot_core::{HttpClientConfig, HttpServerConfig, WsClientConfig, WsServerConfig};

    #[test]
    fn test_validate_empty_config() {
        assert!(validate_config(&OneBotConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_file_output_requires_path() {
        let mut config = OneBotConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("onebot.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_shared_listener_address() {
        let config = OneBotConfig {
            http: Some(HttpServerConfig::new("127.0.0.1:5700")),
            ws: Some(WsServerConfig::new("127.0.0.1:5700")),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("ws.addr"));
    }

    #[test]
    fn test_validate_reverse_client_url() {
        let mut config = OneBotConfig {
            ws_reverse: vec![WsClientConfig::new("http://127.0.0.1:8080")],
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        config.ws_reverse = vec![WsClientConfig::new("wss://bot.example/ws")];
        assert!(validate_config(&config).is_ok());

        config.ws_reverse[0].reconnect_interval = Duration::ZERO;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_http_client_url() {
        let config = OneBotConfig {
            http_client: Some(HttpClientConfig::new("127.0.0.1:5700")),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }
}
