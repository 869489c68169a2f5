//! Delivery log of stops that became eligible for reconciliation.
//!
//! Producers append a notification when new data arrives for a station and
//! hour. Consumers read everything after their cursor and advance the cursor
//! once the notifications are processed, so delivery is at-least-once.

use std::future::Future;

use sqlx::SqlitePool;
use tracing::warn;

use crate::domain::{HourBucket, StopId, from_storage, to_storage};

use super::error::LogError;

/// One log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub seq: i64,
    pub station: String,
    pub hour: HourBucket,
    /// The stop to reconcile, or every stop of the hour if absent.
    pub hash_id: Option<StopId>,
}

/// Entries read from the log in one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBatch {
    pub notifications: Vec<Notification>,
    /// Highest sequence number read, including unreadable entries.
    pub last_seq: Option<i64>,
}

impl LogBatch {
    pub fn is_empty(&self) -> bool {
        self.last_seq.is_none()
    }
}

/// Replayable, cursor-based log of reconciliation notifications.
pub trait DeliveryLog: Sync {
    /// Position of `consumer`, `0` if it never advanced.
    fn cursor(&self, consumer: &str) -> impl Future<Output = Result<i64, LogError>> + Send;

    /// Up to `limit` entries with a sequence number greater than `after`.
    fn read_since(
        &self,
        after: i64,
        limit: u32,
    ) -> impl Future<Output = Result<LogBatch, LogError>> + Send;

    /// Move the cursor of `consumer` to `position`. Never moves it backwards.
    fn advance(
        &self,
        consumer: &str,
        position: i64,
    ) -> impl Future<Output = Result<(), LogError>> + Send;
}

/// Delivery log in the `reconcile_log` and `log_cursors` tables.
#[derive(Debug, Clone)]
pub struct SqliteDeliveryLog {
    pool: SqlitePool,
}

impl SqliteDeliveryLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a notification and return its sequence number.
    pub async fn append(
        &self,
        station: &str,
        hour: HourBucket,
        hash_id: Option<StopId>,
    ) -> Result<i64, LogError> {
        let result = sqlx::query("INSERT INTO reconcile_log (station, hour, hash_id) VALUES (?, ?, ?)")
            .bind(station)
            .bind(to_storage(&hour.start()))
            .bind(hash_id.map(|id| id.get()))
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }
}

impl DeliveryLog for SqliteDeliveryLog {
    async fn cursor(&self, consumer: &str) -> Result<i64, LogError> {
        let position: Option<i64> =
            sqlx::query_scalar("SELECT position FROM log_cursors WHERE consumer = ?")
                .bind(consumer)
                .fetch_optional(&self.pool)
                .await?;
        Ok(position.unwrap_or(0))
    }

    async fn read_since(&self, after: i64, limit: u32) -> Result<LogBatch, LogError> {
        let rows: Vec<(i64, String, String, Option<i64>)> = sqlx::query_as(
            "SELECT seq, station, hour, hash_id FROM reconcile_log WHERE seq > ? ORDER BY seq LIMIT ?",
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut batch = LogBatch::default();
        for (seq, station, hour, hash_id) in rows {
            batch.last_seq = Some(seq);
            let hour = match from_storage(&hour) {
                Ok(start) => HourBucket::containing(start),
                Err(e) => {
                    warn!(seq, hour = %hour, error = %e, "Skipping unreadable log entry");
                    continue;
                }
            };
            batch.notifications.push(Notification {
                seq,
                station,
                hour,
                hash_id: hash_id.map(StopId::from_raw),
            });
        }
        Ok(batch)
    }

    async fn advance(&self, consumer: &str, position: i64) -> Result<(), LogError> {
        sqlx::query(
            r#"
            INSERT INTO log_cursors (consumer, position)
            VALUES (?, ?)
            ON CONFLICT(consumer) DO UPDATE SET
                position = MAX(log_cursors.position, excluded.position)
            "#,
        )
        .bind(consumer)
        .bind(position)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory_pool;
    use crate::test_support::hour;

    #[tokio::test]
    async fn append_and_read_in_order() {
        let log = SqliteDeliveryLog::new(memory_pool().await);
        let h8 = hour("2021-02-01T08:00");
        let id = StopId::derive("42-2102010800-3");

        let first = log.append("Altona", h8, Some(id)).await.unwrap();
        let second = log.append("Harburg", h8.next(), None).await.unwrap();
        assert!(second > first);

        let batch = log.read_since(0, 10).await.unwrap();
        assert_eq!(batch.last_seq, Some(second));
        assert_eq!(
            batch.notifications,
            vec![
                Notification {
                    seq: first,
                    station: "Altona".into(),
                    hour: h8,
                    hash_id: Some(id),
                },
                Notification {
                    seq: second,
                    station: "Harburg".into(),
                    hour: h8.next(),
                    hash_id: None,
                },
            ]
        );

        let rest = log.read_since(first, 10).await.unwrap();
        assert_eq!(rest.notifications.len(), 1);
        assert!(log.read_since(second, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_respects_limit() {
        let log = SqliteDeliveryLog::new(memory_pool().await);
        let h8 = hour("2021-02-01T08:00");
        for _ in 0..5 {
            log.append("Altona", h8, None).await.unwrap();
        }
        let batch = log.read_since(0, 2).await.unwrap();
        assert_eq!(batch.notifications.len(), 2);
        assert_eq!(batch.last_seq, Some(batch.notifications[1].seq));
    }

    #[tokio::test]
    async fn cursor_starts_at_zero_and_only_moves_forward() {
        let log = SqliteDeliveryLog::new(memory_pool().await);
        assert_eq!(log.cursor("reconciler").await.unwrap(), 0);

        log.advance("reconciler", 7).await.unwrap();
        assert_eq!(log.cursor("reconciler").await.unwrap(), 7);

        log.advance("reconciler", 3).await.unwrap();
        assert_eq!(log.cursor("reconciler").await.unwrap(), 7);

        // cursors are per consumer
        assert_eq!(log.cursor("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreadable_entries_are_skipped_but_counted() {
        let log = SqliteDeliveryLog::new(memory_pool().await);
        sqlx::query("INSERT INTO reconcile_log (station, hour) VALUES ('Altona', 'yesterday')")
            .execute(&log.pool)
            .await
            .unwrap();
        let good = log.append("Altona", hour("2021-02-01T08:00"), None).await.unwrap();

        let batch = log.read_since(0, 10).await.unwrap();
        assert_eq!(batch.notifications.len(), 1);
        assert_eq!(batch.last_seq, Some(good));
    }
}
