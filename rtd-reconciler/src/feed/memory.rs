//! In-memory feed source.
//!
//! Holds batches handed to it directly. Used to drive reconciliation from
//! data already loaded by the caller, and in tests.

use std::collections::HashMap;

use crate::domain::HourBucket;

use super::error::FeedError;
use super::types::{RawChangeEvent, RawPlanStop};
use super::{FeedSource, HourBatch};

/// Feed source backed by a map of (station, hour) → batch.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
    batches: HashMap<(String, HourBucket), HourBatch>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a plan document for `station` in `hour`, replacing any previous one.
    pub fn insert_plan(&mut self, station: &str, hour: HourBucket, plan: Vec<RawPlanStop>) {
        self.entry(station, hour).plan = Some(plan);
    }

    /// Publish a change document for `station` in `hour`, replacing any previous one.
    pub fn insert_changes(
        &mut self,
        station: &str,
        hour: HourBucket,
        changes: Vec<RawChangeEvent>,
    ) {
        self.entry(station, hour).changes = Some(changes);
    }

    fn entry(&mut self, station: &str, hour: HourBucket) -> &mut HourBatch {
        self.batches
            .entry((station.to_string(), hour))
            .or_default()
    }
}

impl FeedSource for MemoryFeed {
    async fn hour_batch(&self, station: &str, hour: HourBucket) -> Result<HourBatch, FeedError> {
        Ok(self
            .batches
            .get(&(station.to_string(), hour))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_hour_is_empty() {
        let feed = MemoryFeed::new();
        let hour = HourBucket::parse("2021-02-01T08:00").unwrap();
        assert_eq!(feed.hour_batch("Altona", hour).await.unwrap(), HourBatch::empty());
    }

    #[tokio::test]
    async fn plan_and_changes_are_kept_separately() {
        let mut feed = MemoryFeed::new();
        let hour = HourBucket::parse("2021-02-01T08:00").unwrap();
        feed.insert_changes(
            "Altona",
            hour,
            vec![RawChangeEvent {
                id: "42-2102010800-3".into(),
                ar: Vec::new(),
                dp: Vec::new(),
                m: Vec::new(),
            }],
        );

        let batch = feed.hour_batch("Altona", hour).await.unwrap();
        assert!(batch.plan.is_none());
        assert_eq!(batch.changes.unwrap().len(), 1);
        assert_eq!(
            feed.hour_batch("Altona", hour.next()).await.unwrap(),
            HourBatch::empty()
        );
    }
}
