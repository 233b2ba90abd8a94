pub mod agents;
pub mod audit;
pub mod commands;
pub mod progress;
pub mod render;

pub use commands::{Cli, Commands};

use std::path::PathBuf;
use crate::config::{self, QuorumConfig};
use crate::errors::QuorumError;

/// Parse the config file if one was given, else use defaults.
pub async fn load_config(path: Option<&str>) -> Result<QuorumConfig, QuorumError> {
    match path {
        Some(p) => config::parse_config(&PathBuf::from(p)).await,
        None => Ok(QuorumConfig::default()),
    }
}
