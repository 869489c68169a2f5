//! Feed batches stored as JSON files.
//!
//! Layout: `<root>/<station>/<yyMMddHH>_plan.json` and
//! `<root>/<station>/<yyMMddHH>_changes.json`, each holding a JSON array.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::domain::HourBucket;

use super::error::FeedError;
use super::{FeedSource, HourBatch};

/// Feed source reading hourly documents from a directory tree.
#[derive(Debug, Clone)]
pub struct FileFeed {
    root: PathBuf,
}

impl FileFeed {
    /// Create a file feed rooted at `root`.
    ///
    /// Fails if `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FeedError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FeedError::Unavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Directory holding one station's documents.
    pub fn station_dir(&self, station: &str) -> PathBuf {
        self.root.join(clean_station_name(station))
    }

    fn document_path(&self, station: &str, hour: HourBucket, kind: &str) -> PathBuf {
        self.station_dir(station)
            .join(format!("{}_{}.json", hour.file_key(), kind))
    }
}

/// Station names become directory names; slashes are not allowed there.
fn clean_station_name(station: &str) -> String {
    station.trim().replace('/', "slash")
}

/// Read and parse one document.
///
/// A missing or empty file is a gap. An unparseable file is logged and
/// treated as a gap as well, since re-reading it will not help.
async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>, FeedError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(FeedError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    if contents.trim().is_empty() {
        return Ok(None);
    }

    match serde_json::from_str(&contents) {
        Ok(items) => Ok(Some(items)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unparseable feed document");
            Ok(None)
        }
    }
}

impl FeedSource for FileFeed {
    async fn hour_batch(&self, station: &str, hour: HourBucket) -> Result<HourBatch, FeedError> {
        let plan = read_document(&self.document_path(station, hour, "plan")).await?;
        let changes = read_document(&self.document_path(station, hour, "changes")).await?;
        Ok(HourBatch { plan, changes })
    }
}
