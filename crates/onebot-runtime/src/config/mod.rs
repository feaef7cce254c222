//! Configuration for the OneBot runtime.
//!
//! Files are TOML (default) or YAML, layered under `ONEBOT_*` environment
//! variables and validated before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{LogFormat, LogLevel, LogOutput, LoggingConfig, OneBotConfig, SpanEventConfig};
pub use validation::validate_config;
