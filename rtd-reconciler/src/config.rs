//! Process configuration, read from a YAML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::network::DistanceCacheConfig;
use crate::reconcile::{BackfillConfig, FollowConfig, ServiceSettings};
use crate::store::WriterConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SQLite database holding records and the delivery log
    pub database_url: String,
    /// Root directory of the file feed
    pub feed_dir: PathBuf,
    /// JSON network snapshot (stations and track segments)
    pub network_snapshot: PathBuf,
    /// Stations to backfill; every station of the snapshot if empty
    #[serde(default)]
    pub stations: Vec<String>,
    #[serde(default)]
    pub writer: WriterConfig,
    #[serde(default)]
    pub distance_cache: DistanceCacheConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    #[serde(default)]
    pub follow: FollowConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.as_ref().display(), e)))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Settings for the reconciliation service.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            writer: self.writer.clone(),
            backfill: self.backfill.clone(),
            follow: self.follow.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}
