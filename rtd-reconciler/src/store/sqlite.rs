//! SQLite record store.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::domain::{StopId, from_storage, to_storage};
use crate::reconcile::{CanonicalStopRecord, MessageLog, StopEvent};

use super::{RecordStore, StoreError};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

const UPSERT_RTD: &str = r#"
INSERT INTO rtd (
    hash_id, id, dayly_id, date_id, stop_id, station,
    f, t, o, c, n,
    ar_pp, ar_cp, ar_pt, ar_ct, ar_ps, ar_cs, ar_hi, ar_clt, ar_wings, ar_tra, ar_pde, ar_cde, ar_dc, ar_l,
    dp_pp, dp_cp, dp_pt, dp_ct, dp_ps, dp_cs, dp_hi, dp_clt, dp_wings, dp_tra, dp_pde, dp_cde, dp_dc, dp_l,
    distance_to_start, distance_to_end, distance_to_last, distance_to_next,
    obstacles_priority_24, obstacles_priority_37, obstacles_priority_63,
    obstacles_priority_65, obstacles_priority_70, obstacles_priority_80
)
VALUES (
    ?, ?, ?, ?, ?, ?,
    ?, ?, ?, ?, ?,
    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
    ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
    ?, ?, ?, ?,
    ?, ?, ?,
    ?, ?, ?
)
ON CONFLICT(hash_id) DO UPDATE SET
    id = excluded.id,
    dayly_id = excluded.dayly_id,
    date_id = excluded.date_id,
    stop_id = excluded.stop_id,
    station = excluded.station,
    f = excluded.f,
    t = excluded.t,
    o = excluded.o,
    c = excluded.c,
    n = excluded.n,
    ar_pp = excluded.ar_pp,
    ar_cp = excluded.ar_cp,
    ar_pt = excluded.ar_pt,
    ar_ct = excluded.ar_ct,
    ar_ps = excluded.ar_ps,
    ar_cs = excluded.ar_cs,
    ar_hi = excluded.ar_hi,
    ar_clt = excluded.ar_clt,
    ar_wings = excluded.ar_wings,
    ar_tra = excluded.ar_tra,
    ar_pde = excluded.ar_pde,
    ar_cde = excluded.ar_cde,
    ar_dc = excluded.ar_dc,
    ar_l = excluded.ar_l,
    dp_pp = excluded.dp_pp,
    dp_cp = excluded.dp_cp,
    dp_pt = excluded.dp_pt,
    dp_ct = excluded.dp_ct,
    dp_ps = excluded.dp_ps,
    dp_cs = excluded.dp_cs,
    dp_hi = excluded.dp_hi,
    dp_clt = excluded.dp_clt,
    dp_wings = excluded.dp_wings,
    dp_tra = excluded.dp_tra,
    dp_pde = excluded.dp_pde,
    dp_cde = excluded.dp_cde,
    dp_dc = excluded.dp_dc,
    dp_l = excluded.dp_l,
    distance_to_start = excluded.distance_to_start,
    distance_to_end = excluded.distance_to_end,
    distance_to_last = excluded.distance_to_last,
    distance_to_next = excluded.distance_to_next,
    obstacles_priority_24 = excluded.obstacles_priority_24,
    obstacles_priority_37 = excluded.obstacles_priority_37,
    obstacles_priority_63 = excluded.obstacles_priority_63,
    obstacles_priority_65 = excluded.obstacles_priority_65,
    obstacles_priority_70 = excluded.obstacles_priority_70,
    obstacles_priority_80 = excluded.obstacles_priority_80
"#;

const UPSERT_RTD_ARRAYS: &str = r#"
INSERT INTO rtd_arrays (
    hash_id,
    ar_m_id, ar_m_t, ar_m_ts, ar_m_c,
    dp_m_id, dp_m_t, dp_m_ts, dp_m_c,
    m_id, m_t, m_ts, m_c,
    hd, hdc, conn, rtr
)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(hash_id) DO UPDATE SET
    ar_m_id = excluded.ar_m_id,
    ar_m_t = excluded.ar_m_t,
    ar_m_ts = excluded.ar_m_ts,
    ar_m_c = excluded.ar_m_c,
    dp_m_id = excluded.dp_m_id,
    dp_m_t = excluded.dp_m_t,
    dp_m_ts = excluded.dp_m_ts,
    dp_m_c = excluded.dp_m_c,
    m_id = excluded.m_id,
    m_t = excluded.m_t,
    m_ts = excluded.m_ts,
    m_c = excluded.m_c,
    hd = excluded.hd,
    hdc = excluded.hdc,
    conn = excluded.conn,
    rtr = excluded.rtr
"#;

/// Record store backed by the `rtd` and `rtd_arrays` tables.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Wrap a pool whose schema is already migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn time(t: Option<NaiveDateTime>) -> Option<String> {
    t.as_ref().map(to_storage)
}

fn bind_event<'q>(query: SqliteQuery<'q>, event: &'q StopEvent) -> SqliteQuery<'q> {
    query
        .bind(event.pp.as_deref())
        .bind(event.cp.as_deref())
        .bind(time(event.pt))
        .bind(time(event.ct))
        .bind(event.ps.as_deref())
        .bind(event.cs.as_deref())
        .bind(event.hi)
        .bind(time(event.clt))
        .bind(event.wings.as_deref())
        .bind(event.tra.as_deref())
        .bind(event.pde.as_deref())
        .bind(event.cde.as_deref())
        .bind(event.dc)
        .bind(event.l.as_deref())
}

fn json<T: Serialize + ?Sized>(column: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { column, source })
}

/// JSON text of the four message arrays, in `id, t, ts, c` order.
fn encode_messages(log: &MessageLog, columns: [&'static str; 4]) -> Result<[String; 4], StoreError> {
    let ts: Vec<Option<String>> = log.ts.iter().map(|t| time(*t)).collect();
    Ok([
        json(columns[0], &log.id)?,
        json(columns[1], &log.t)?,
        json(columns[2], &ts)?,
        json(columns[3], &log.c)?,
    ])
}

async fn upsert_record(
    tx: &mut Transaction<'_, Sqlite>,
    record: &CanonicalStopRecord,
) -> Result<(), StoreError> {
    let label = &record.label;
    let query = sqlx::query(UPSERT_RTD)
        .bind(record.hash_id.get())
        .bind(record.key.as_str())
        .bind(record.key.daily_id())
        .bind(to_storage(&record.key.date()))
        .bind(record.key.sequence())
        .bind(record.station.as_str())
        .bind(label.f.as_deref())
        .bind(label.t.as_deref())
        .bind(label.o.as_deref())
        .bind(label.c.as_deref())
        .bind(label.n.as_deref());
    let query = bind_event(query, &record.ar);
    let query = bind_event(query, &record.dp);

    let distances = record.distances;
    let obstacles = &record.obstacles;
    query
        .bind(distances.map(|d| d.to_start))
        .bind(distances.map(|d| d.to_end))
        .bind(distances.map(|d| d.to_last))
        .bind(distances.map(|d| d.to_next))
        .bind(obstacles.priority_24)
        .bind(obstacles.priority_37)
        .bind(obstacles.priority_63)
        .bind(obstacles.priority_65)
        .bind(obstacles.priority_70)
        .bind(obstacles.priority_80)
        .execute(&mut **tx)
        .await?;

    let [ar_id, ar_t, ar_ts, ar_c] =
        encode_messages(&record.ar.messages, ["ar_m_id", "ar_m_t", "ar_m_ts", "ar_m_c"])?;
    let [dp_id, dp_t, dp_ts, dp_c] =
        encode_messages(&record.dp.messages, ["dp_m_id", "dp_m_t", "dp_m_ts", "dp_m_c"])?;
    let [m_id, m_t, m_ts, m_c] = encode_messages(&record.messages, ["m_id", "m_t", "m_ts", "m_c"])?;
    let attributes = &record.attributes;
    let hd = attributes.hd.as_ref().map(|v| json("hd", v)).transpose()?;
    let hdc = attributes.hdc.as_ref().map(|v| json("hdc", v)).transpose()?;
    let conn = attributes.conn.as_ref().map(|v| json("conn", v)).transpose()?;
    let rtr = attributes.rtr.as_ref().map(|v| json("rtr", v)).transpose()?;

    sqlx::query(UPSERT_RTD_ARRAYS)
        .bind(record.hash_id.get())
        .bind(ar_id)
        .bind(ar_t)
        .bind(ar_ts)
        .bind(ar_c)
        .bind(dp_id)
        .bind(dp_t)
        .bind(dp_ts)
        .bind(dp_c)
        .bind(m_id)
        .bind(m_t)
        .bind(m_ts)
        .bind(m_c)
        .bind(hd)
        .bind(hdc)
        .bind(conn)
        .bind(rtr)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

impl RecordStore for SqliteRecordStore {
    async fn upsert(
        &self,
        records: &BTreeMap<StopId, CanonicalStopRecord>,
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        // Both tables in one transaction so they never disagree
        let mut tx = self.pool.begin().await?;
        for record in records.values() {
            upsert_record(&mut tx, record).await?;
        }
        tx.commit().await?;

        debug!(count = records.len(), "Upserted records");
        Ok(())
    }

    async fn max_planned_time(&self) -> Result<Option<NaiveDateTime>, StoreError> {
        let latest: Option<String> =
            sqlx::query_scalar("SELECT MAX(COALESCE(ar_pt, dp_pt)) FROM rtd")
                .fetch_one(&self.pool)
                .await?;
        latest
            .map(|s| {
                from_storage(&s).map_err(|e| StoreError::Corrupt {
                    column: "ar_pt",
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_feed_time;
    use crate::feed::RawMessage;
    use crate::reconcile::{RouteDistances, build_record};
    use crate::store::memory_pool;
    use crate::test_support::plan_stop;

    fn record(key: &str, pt: &str) -> CanonicalStopRecord {
        let stop = plan_stop(key, pt, "Hamburg Hbf", pt, "Harburg");
        let mut record = build_record(&stop, "Altona").unwrap();
        record.ar.clear_paths();
        record.dp.clear_paths();
        record.distances = Some(RouteDistances {
            to_start: 6300.0,
            to_end: 11000.0,
            to_last: 6300.0,
            to_next: 11000.0,
        });
        record.ar.messages.push(&RawMessage {
            id: Some("r1".into()),
            t: Some("d".into()),
            ts: Some("2102010805".into()),
            c: Some(47),
        });
        record
    }

    fn batch(records: impl IntoIterator<Item = CanonicalStopRecord>) -> BTreeMap<StopId, CanonicalStopRecord> {
        records.into_iter().map(|r| (r.hash_id, r)).collect()
    }

    async fn count(store: &SqliteRecordStore, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn upsert_writes_both_tables() {
        let store = SqliteRecordStore::new(memory_pool().await);
        let r = record("42-2102010800-3", "2102010812");
        store.upsert(&batch([r.clone()])).await.unwrap();

        let (id, dayly_id, date_id, stop_id, ar_pt, ar_ct, to_last): (
            String,
            i64,
            String,
            i32,
            Option<String>,
            Option<String>,
            Option<f64>,
        ) = sqlx::query_as(
            "SELECT id, dayly_id, date_id, stop_id, ar_pt, ar_ct, distance_to_last FROM rtd WHERE hash_id = ?",
        )
        .bind(r.hash_id.get())
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(id, "42-2102010800-3");
        assert_eq!(dayly_id, 42);
        assert_eq!(date_id, "2021-02-01 08:00:00");
        assert_eq!(stop_id, 3);
        assert_eq!(ar_pt.as_deref(), Some("2021-02-01 08:12:00"));
        assert_eq!(ar_ct, ar_pt);
        assert_eq!(to_last, Some(6300.0));

        let (ar_m_id, ar_m_ts, dp_m_id): (String, String, String) =
            sqlx::query_as("SELECT ar_m_id, ar_m_ts, dp_m_id FROM rtd_arrays WHERE hash_id = ?")
                .bind(r.hash_id.get())
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(ar_m_id, r#"["r1"]"#);
        assert_eq!(ar_m_ts, r#"["2021-02-01 08:05:00"]"#);
        assert_eq!(dp_m_id, "[]");
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = SqliteRecordStore::new(memory_pool().await);
        let records = batch([
            record("42-2102010800-3", "2102010812"),
            record("43-2102010800-1", "2102010820"),
        ]);
        store.upsert(&records).await.unwrap();
        let first: Vec<(i64, Option<String>, Option<f64>)> =
            sqlx::query_as("SELECT hash_id, ar_ct, distance_to_end FROM rtd ORDER BY hash_id")
                .fetch_all(store.pool())
                .await
                .unwrap();

        store.upsert(&records).await.unwrap();
        let second: Vec<(i64, Option<String>, Option<f64>)> =
            sqlx::query_as("SELECT hash_id, ar_ct, distance_to_end FROM rtd ORDER BY hash_id")
                .fetch_all(store.pool())
                .await
                .unwrap();

        assert_eq!(first, second);
        assert_eq!(count(&store, "rtd").await, 2);
        assert_eq!(count(&store, "rtd_arrays").await, 2);
    }

    #[tokio::test]
    async fn upsert_updates_changed_fields() {
        let store = SqliteRecordStore::new(memory_pool().await);
        let mut r = record("42-2102010800-3", "2102010812");
        store.upsert(&batch([r.clone()])).await.unwrap();

        r.ar.ct = parse_feed_time("2102010819").ok();
        store.upsert(&batch([r.clone()])).await.unwrap();

        let ar_ct: Option<String> = sqlx::query_scalar("SELECT ar_ct FROM rtd WHERE hash_id = ?")
            .bind(r.hash_id.get())
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(ar_ct.as_deref(), Some("2021-02-01 08:19:00"));
        assert_eq!(count(&store, "rtd").await, 1);
    }

    #[tokio::test]
    async fn plan_attributes_stored_as_json() {
        let store = SqliteRecordStore::new(memory_pool().await);
        let mut r = record("42-2102010800-3", "2102010812");
        r.attributes.conn = Some(serde_json::json!([{"id": "c1"}]));
        store.upsert(&batch([r.clone()])).await.unwrap();

        let (hd, conn): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT hd, conn FROM rtd_arrays WHERE hash_id = ?")
                .bind(r.hash_id.get())
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(hd, None);
        assert_eq!(conn.as_deref(), Some(r#"[{"id":"c1"}]"#));
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let store = SqliteRecordStore::new(memory_pool().await);
        store.upsert(&BTreeMap::new()).await.unwrap();
        assert_eq!(count(&store, "rtd").await, 0);
    }

    #[tokio::test]
    async fn max_planned_time_tracks_latest_stop() {
        let store = SqliteRecordStore::new(memory_pool().await);
        assert_eq!(store.max_planned_time().await.unwrap(), None);

        let mut departure_only = record("44-2102011000-1", "2102011030");
        departure_only.ar = StopEvent::default();
        store
            .upsert(&batch([record("42-2102010800-3", "2102010812"), departure_only]))
            .await
            .unwrap();
        assert_eq!(
            store.max_planned_time().await.unwrap(),
            parse_feed_time("2102011030").ok()
        );
    }
}
