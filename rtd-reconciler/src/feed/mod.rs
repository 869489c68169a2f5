//! Raw timetable feed access.
//!
//! The feed is organized per station and per publishing hour. Each hour may
//! carry a plan document (scheduled stops) and a change document (realtime
//! revisions). Either can be missing; a missing document is a feed gap and
//! is reported as `None`, never as an error.

mod error;
mod file;
mod memory;
mod types;

use std::future::Future;

use crate::domain::HourBucket;

pub use error::FeedError;
pub use file::FileFeed;
pub use memory::MemoryFeed;
pub use types::{RawChangeEvent, RawEvent, RawMessage, RawPlanStop, RawTrainLabel, split_path};

/// Plan and change documents of one station for one hour.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourBatch {
    pub plan: Option<Vec<RawPlanStop>>,
    pub changes: Option<Vec<RawChangeEvent>>,
}

impl HourBatch {
    /// A batch with neither plan nor changes published.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Source of hourly feed batches.
///
/// This abstraction allows reconciliation to run against files on disk or
/// against in-memory fixtures.
pub trait FeedSource {
    /// Fetch the batch published for `station` in `hour`.
    fn hour_batch(
        &self,
        station: &str,
        hour: HourBucket,
    ) -> impl Future<Output = Result<HourBatch, FeedError>> + Send;
}
