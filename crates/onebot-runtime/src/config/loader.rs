//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `onebot.toml`
//! - `yaml-config`: `onebot.yaml` / `onebot.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides passed to [`ConfigLoader::merge`]
//! 3. Profile-specific config file (`onebot.{profile}.toml`)
//! 4. Main config file (`onebot.toml`)
//! 5. Environment variables (`ONEBOT_*`)
//!
//! # Environment Variable Mapping
//!
//! `__` separates nesting levels:
//!
//! - `ONEBOT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `ONEBOT_WS__ADDR=0.0.0.0:6700` → `ws.addr = "0.0.0.0:6700"`
//! - `ONEBOT_HTTP__ACCESS_TOKEN=xxx` → `http.access_token = "xxx"`
//!
//! # Example
//!
//! ```rust,ignore
//! use onebot_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/onebot.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::OneBotConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "ONEBOT_";
const PROFILE_VAR: &str = "ONEBOT_PROFILE";

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `ONEBOT_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layers defaults, files and environment variables into a [`OneBotConfig`].
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a directory searched for `onebot.*` files.
    ///
    /// Without any search path, the current directory and the user config
    /// directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Loads exactly this file instead of searching. It must exist.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges `config` over the defaults, below files and environment.
    pub fn merge(mut self, config: OneBotConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<OneBotConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: OneBotConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            reverse_clients = config.ws_reverse.len(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(OneBotConfig::default()));
        figment = figment.merge(std::mem::take(&mut self.figment));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["PROFILE"])
                    .split("__"),
            );
        }

        Ok(figment)
    }

    /// Dispatches on the extension; only enabled formats are accepted.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("onebot"));
        }
        paths
    }

    /// Searches `search_paths × base_names`. The profile variant of a base
    /// name is merged before the base file itself, and the first base file
    /// found ends the search.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = search_path.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["onebot.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["onebot.yaml", "onebot.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

/// Loads from the default locations with environment overrides.
pub fn load_config() -> ConfigResult<OneBotConfig> {
    ConfigLoader::new().load()
}

/// Loads exactly `path` with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<OneBotConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};
    use std::time::Duration;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_files() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.http.is_none());
        assert!(config.ws_reverse.is_empty());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let err = ConfigLoader::new()
            .file(dir.path().join("absent.toml"))
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "onebot.ini", "");
        let err = ConfigLoader::new().file(path).without_env().load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_file() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "onebot.toml",
            r#"
[logging]
level = "debug"
format = "pretty"

[http]
addr = "127.0.0.1:5700"
access_token = "secret"
event_path = "/event"
request_timeout = "5s"

[ws]
addr = "127.0.0.1:6700"
read_timeout = 30

[[ws_reverse]]
url = "ws://127.0.0.1:8080/onebot/v11/ws"
self_id = 10001
reconnect_interval = "500ms"
"#,
        );

        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Pretty);

        let http = config.http.unwrap();
        assert_eq!(http.addr, "127.0.0.1:5700");
        assert_eq!(http.access_token.as_deref(), Some("secret"));
        assert_eq!(http.request_timeout, Some(Duration::from_secs(5)));

        let ws = config.ws.unwrap();
        assert_eq!(ws.read_timeout, Some(Duration::from_secs(30)));
        assert_eq!(ws.path_prefix, "");

        assert_eq!(config.ws_reverse.len(), 1);
        let client = &config.ws_reverse[0];
        assert_eq!(client.self_id, Some(10001));
        assert_eq!(client.reconnect_interval, Duration::from_millis(500));
        assert_eq!(client.handshake_timeout, Duration::from_secs(10));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_is_overridden_by_base_file() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "onebot.production.toml",
            "[logging]\nlevel = \"warn\"\nthread_ids = true\n",
        );
        write(&dir, "onebot.toml", "[logging]\nlevel = \"error\"\n");

        let config = ConfigLoader::new()
            .profile("prod")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Error);
        assert!(config.logging.thread_ids);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "onebot.toml", "[[ws_reverse]]\nurl = \"\"\n");

        let err = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[cfg(feature = "yaml-config")]
    #[test]
    fn test_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "onebot.yaml",
            "unified:\n  addr: 127.0.0.1:5800\n  ws:\n    path_prefix: /onebot\n",
        );

        let config = ConfigLoader::new().file(path).without_env().load().unwrap();
        let unified = config.unified.unwrap();
        assert_eq!(unified.addr, "127.0.0.1:5800");
        assert_eq!(unified.ws.path_prefix, "/onebot");
    }

    #[test]
    fn test_merge_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let mut base = OneBotConfig::default();
        base.logging.level = LogLevel::Trace;

        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .merge(base)
            .load()
            .unwrap();
        assert_eq!(config.logging.level, LogLevel::Trace);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
        assert_eq!(Profile::Production.to_string(), "production");
    }
}
