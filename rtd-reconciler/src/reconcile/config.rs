//! Settings for the two reconciliation modes.

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::domain::HourBucket;
use crate::store::WriterConfig;

/// Batch (backfill) mode.
#[derive(Debug, Clone, Deserialize)]
pub struct BackfillConfig {
    /// Stations per chunk (default: 50)
    #[serde(default = "BackfillConfig::default_chunk_size")]
    pub chunk_size: usize,
    /// Chunks processed at the same time (default: 4)
    #[serde(default = "BackfillConfig::default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,
    /// How far before the latest stored stop a resumed backfill starts,
    /// so changes published after the last run are picked up (default: 48)
    #[serde(default = "BackfillConfig::default_resume_overlap_hours")]
    pub resume_overlap_hours: i64,
    /// Start of a backfill into an empty store (default: 2020-01-01T00:00)
    #[serde(default = "BackfillConfig::default_start")]
    pub default_start: HourBucket,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::default_chunk_size(),
            max_concurrent_chunks: Self::default_max_concurrent_chunks(),
            resume_overlap_hours: Self::default_resume_overlap_hours(),
            default_start: Self::default_start(),
        }
    }
}

impl BackfillConfig {
    fn default_chunk_size() -> usize {
        50
    }
    fn default_max_concurrent_chunks() -> usize {
        4
    }
    fn default_resume_overlap_hours() -> i64 {
        48
    }
    fn default_start() -> HourBucket {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
        HourBucket::containing(date.and_time(NaiveTime::MIN))
    }
}

/// Continuous (follow) mode.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowConfig {
    /// Name under which the log cursor is stored (default: "reconciler")
    #[serde(default = "FollowConfig::default_consumer")]
    pub consumer: String,
    /// Pause after a poll that found nothing (default: 60)
    #[serde(default = "FollowConfig::default_idle_interval_secs")]
    pub idle_interval_secs: u64,
    /// Pause after a failed cycle (default: 30)
    #[serde(default = "FollowConfig::default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    /// Maximum notifications handled per cycle (default: 500)
    #[serde(default = "FollowConfig::default_batch_limit")]
    pub batch_limit: u32,
    /// Reload the network snapshot this often; never if unset or 0
    #[serde(default)]
    pub network_refresh_secs: Option<u64>,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            consumer: Self::default_consumer(),
            idle_interval_secs: Self::default_idle_interval_secs(),
            retry_backoff_secs: Self::default_retry_backoff_secs(),
            batch_limit: Self::default_batch_limit(),
            network_refresh_secs: None,
        }
    }
}

impl FollowConfig {
    fn default_consumer() -> String {
        "reconciler".to_string()
    }
    fn default_idle_interval_secs() -> u64 {
        60
    }
    fn default_retry_backoff_secs() -> u64 {
        30
    }
    fn default_batch_limit() -> u32 {
        500
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.idle_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn network_refresh(&self) -> Option<Duration> {
        self.network_refresh_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Everything the reconciliation service is tuned by.
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    pub writer: WriterConfig,
    pub backfill: BackfillConfig,
    pub follow: FollowConfig,
}
