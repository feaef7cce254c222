//! HTTP transports.
//!
//! The server answers actions and ingests posted events; the client calls
//! actions on a remote endpoint.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::HttpActionClient;

#[cfg(feature = "http-server")]
pub mod params;
#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::HttpServer;
