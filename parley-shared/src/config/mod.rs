//! # Configuration
//!
//! Client configuration: server endpoints, polling cadence, timeouts and the
//! reconnect policy of the live transport.

pub mod client;

pub use client::{ClientConfig, ConfigError, ReconnectConfig};
