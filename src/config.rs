//! Runtime settings of a syncing replica.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::engine::{EventMapper, OrderedEventMapper, UnorderedEventMapper};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which [`EventMapper`] confirms local changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MapperKind {
    #[default]
    Unordered,
    Ordered,
}

impl MapperKind {
    pub fn build(self) -> Box<dyn EventMapper> {
        match self {
            MapperKind::Unordered => Box::new(UnorderedEventMapper),
            MapperKind::Ordered => Box::new(OrderedEventMapper),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub actor: String,
    pub password_hash: String,
    /// Upper bound for one remote round trip.
    pub round_timeout_ms: u64,
    pub mapper: MapperKind,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            actor: "anonymous".to_string(),
            password_hash: String::new(),
            round_timeout_ms: 30_000,
            mapper: MapperKind::default(),
        }
    }
}

impl SyncConfig {
    /// Reads a JSON config. Missing keys fall back to their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.round_timeout_ms)
    }
}
