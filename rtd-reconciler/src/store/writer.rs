//! Buffered writes of finished records.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use crate::domain::StopId;
use crate::reconcile::CanonicalStopRecord;

use super::{RecordStore, StoreError};

/// Configuration for [`DurableWriter`].
#[derive(Debug, Clone, Deserialize)]
pub struct WriterConfig {
    /// Number of buffered records written per storage call (default: 1000)
    #[serde(default = "WriterConfig::default_flush_threshold")]
    pub flush_threshold: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            flush_threshold: Self::default_flush_threshold(),
        }
    }
}

impl WriterConfig {
    fn default_flush_threshold() -> usize {
        1000
    }
}

/// Buffers finished records and writes them in batches.
///
/// Records are keyed by `hash_id`; pushing a record whose id is already
/// buffered replaces the earlier one. Every write before [`finish`] carries
/// exactly `flush_threshold` records.
///
/// [`finish`]: DurableWriter::finish
pub struct DurableWriter<'a, S> {
    store: &'a S,
    threshold: usize,
    buffer: BTreeMap<StopId, CanonicalStopRecord>,
    written: usize,
}

impl<'a, S: RecordStore> DurableWriter<'a, S> {
    pub fn new(store: &'a S, config: &WriterConfig) -> Self {
        Self {
            store,
            threshold: config.flush_threshold.max(1),
            buffer: BTreeMap::new(),
            written: 0,
        }
    }

    /// Buffer a record, writing the buffer out once it is full.
    pub async fn push(&mut self, record: CanonicalStopRecord) -> Result<(), StoreError> {
        self.buffer.insert(record.hash_id, record);
        if self.buffer.len() >= self.threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Number of records waiting to be written.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Write whatever is left and return the total number of records written.
    pub async fn finish(mut self) -> Result<usize, StoreError> {
        self.flush().await?;
        Ok(self.written)
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        // Only cleared once the store accepted the batch
        self.store.upsert(&self.buffer).await?;
        self.written += self.buffer.len();
        debug!(count = self.buffer.len(), total = self.written, "Flushed records");
        self.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDateTime;

    use super::*;
    use crate::reconcile::build_record;
    use crate::test_support::plan_stop;

    /// Store that records the size of every write.
    #[derive(Default)]
    struct CountingStore {
        calls: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl RecordStore for CountingStore {
        async fn upsert(
            &self,
            records: &BTreeMap<StopId, CanonicalStopRecord>,
        ) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.calls.lock().unwrap().push(records.len());
            Ok(())
        }

        async fn max_planned_time(&self) -> Result<Option<NaiveDateTime>, StoreError> {
            Ok(None)
        }
    }

    fn record(n: usize) -> CanonicalStopRecord {
        let stop = plan_stop(&format!("{n}-2102010800-1"), "2102010812", "Hamburg Hbf", "2102010814", "Harburg");
        build_record(&stop, "Altona").unwrap()
    }

    #[test]
    fn default_threshold() {
        assert_eq!(WriterConfig::default().flush_threshold, 1000);
        let config: WriterConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.flush_threshold, 1000);
    }

    #[tokio::test]
    async fn writes_in_threshold_sized_batches() {
        let store = CountingStore::default();
        let mut writer = DurableWriter::new(&store, &WriterConfig { flush_threshold: 1000 });
        for n in 0..1500 {
            writer.push(record(n)).await.unwrap();
        }
        assert_eq!(*store.calls.lock().unwrap(), vec![1000]);
        assert_eq!(writer.buffered(), 500);

        assert_eq!(writer.finish().await.unwrap(), 1500);
        assert_eq!(*store.calls.lock().unwrap(), vec![1000, 500]);
    }

    #[tokio::test]
    async fn same_id_is_buffered_once() {
        let store = CountingStore::default();
        let mut writer = DurableWriter::new(&store, &WriterConfig::default());
        writer.push(record(1)).await.unwrap();
        writer.push(record(1)).await.unwrap();
        assert_eq!(writer.buffered(), 1);
        assert_eq!(writer.finish().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn finishing_empty_writer_does_not_call_store() {
        let store = CountingStore::default();
        let writer = DurableWriter::new(&store, &WriterConfig::default());
        assert_eq!(writer.finish().await.unwrap(), 0);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_flush_keeps_buffer() {
        let store = CountingStore {
            fail: true,
            ..CountingStore::default()
        };
        let mut writer = DurableWriter::new(&store, &WriterConfig { flush_threshold: 2 });
        writer.push(record(1)).await.unwrap();
        assert!(writer.push(record(2)).await.is_err());
        assert_eq!(writer.buffered(), 2);
    }
}
