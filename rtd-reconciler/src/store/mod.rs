//! Durable storage of reconciled stops and the delivery log.
//!
//! Records are written to two tables sharing the `hash_id` primary key:
//! `rtd` holds the scalar fields and `rtd_arrays` the message arrays. All
//! writes are upserts, so replaying a batch rewrites the same rows.

mod delivery;
mod error;
mod sqlite;
mod writer;

use std::collections::BTreeMap;
use std::future::Future;
use std::str::FromStr;

use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::domain::StopId;
use crate::reconcile::CanonicalStopRecord;

pub use delivery::{DeliveryLog, LogBatch, Notification, SqliteDeliveryLog};
pub use error::{LogError, StoreError};
pub use sqlite::SqliteRecordStore;
pub use writer::{DurableWriter, WriterConfig};

/// Destination of reconciled records.
pub trait RecordStore: Sync {
    /// Insert or update every record, keyed by its `hash_id`. An empty batch
    /// is a no-op.
    fn upsert(
        &self,
        records: &BTreeMap<StopId, CanonicalStopRecord>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Latest planned time of any stored stop, used to resume backfills.
    fn max_planned_time(
        &self,
    ) -> impl Future<Output = Result<Option<NaiveDateTime>, StoreError>> + Send;
}

/// Connect to the database and bring its schema up to date.
///
/// In-memory databases live only as long as their connection, so they get
/// a pool of exactly one connection that is never recycled.
pub async fn open_database(url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool_options = if url.contains(":memory:") || url.contains("mode=memory") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(8)
    };
    let pool = pool_options.connect_with(options).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(url, "Database ready");
    Ok(pool)
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    open_database("sqlite::memory:").await.unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn migrations_create_tables() {
        let pool = memory_pool().await;
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in ["log_cursors", "reconcile_log", "rtd", "rtd_arrays"] {
            assert!(names.contains(&expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn file_database_is_created_and_reopened() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("rtd.db").display());
        let pool = open_database(&url).await.unwrap();
        pool.close().await;
        // migrations are idempotent
        open_database(&url).await.unwrap();
    }
}
