pub mod chat;
pub mod completion;
pub mod config;
pub mod profile;
pub mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use shared::config::ClientConfig;

/// Resolves the client configuration: file, then `PARLEY_*` overrides.
pub fn load_config(path: Option<PathBuf>) -> Result<ClientConfig> {
    ClientConfig::load_config(path).context("failed to load configuration")
}
