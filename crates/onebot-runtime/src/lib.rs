//! OneBot Runtime - configuration, logging and lifecycle for the transports.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `OneBotConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - Transport orchestration (`OneBotRuntime`)
//!
//! ```ignore
//! use onebot_core::{ActionDispatcher, EventDispatcher};
//! use onebot_runtime::OneBotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = OneBotRuntime::builder()
//!         .actions(ActionDispatcher::new())
//!         .events(EventDispatcher::new())
//!         .build()?;
//!
//!     runtime.run_until_ctrl_c().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, OneBotConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{OneBotRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;
