//! Reconciliation orchestration.
//!
//! [`ReconciliationService`] runs the build → merge → annotate → write
//! pipeline in two modes:
//!
//! * **backfill** over a closed range of hours for a list of stations,
//!   split into chunks of stations processed concurrently;
//! * **follow**, polling the delivery log and reconciling whatever it
//!   announces, advancing the log cursor only after the results are stored.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::domain::{HourBucket, StopId};
use crate::feed::{FeedError, FeedSource};
use crate::network::NetworkHandle;
use crate::store::{DeliveryLog, DurableWriter, LogError, RecordStore, StoreError};

use super::annotate::RouteAnnotator;
use super::config::ServiceSettings;
use super::timeline::{Reconciled, StationTimeline};

/// Errors that abort a backfill chunk or a follow cycle.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("delivery log error: {0}")]
    Log(#[from] LogError),

    #[error("reconcile task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Counts for a successfully written chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    pub written: usize,
    pub malformed: usize,
    pub superseded: usize,
}

/// A chunk whose stations were not (completely) written.
#[derive(Debug)]
pub struct ChunkFailure {
    pub stations: Vec<String>,
    pub error: ServiceError,
}

/// Outcome of a backfill.
#[derive(Debug, Default)]
pub struct BackfillSummary {
    pub chunks: usize,
    pub written: usize,
    pub malformed: usize,
    pub superseded: usize,
    pub failed: Vec<ChunkFailure>,
}

impl BackfillSummary {
    /// Whether every chunk was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of a follow cycle that found work in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub notifications: usize,
    pub written: usize,
    /// Cursor position after the cycle.
    pub cursor: i64,
}

/// Reconciles stops from a feed into a record store.
pub struct ReconciliationService<F, S> {
    feed: F,
    store: S,
    network: NetworkHandle,
    settings: ServiceSettings,
}

impl<F: FeedSource, S: RecordStore> ReconciliationService<F, S> {
    pub fn new(feed: F, store: S, network: NetworkHandle, settings: ServiceSettings) -> Self {
        Self {
            feed,
            store,
            network,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn network(&self) -> &NetworkHandle {
        &self.network
    }

    /// Where a backfill without explicit start begins: a safety margin
    /// before the latest stored stop, or the configured default start if
    /// nothing is stored.
    pub async fn resume_start(&self) -> Result<HourBucket, ServiceError> {
        let backfill = &self.settings.backfill;
        let Some(latest) = self.store.max_planned_time().await? else {
            return Ok(backfill.default_start);
        };
        let start = backfill
            .resume_overlap_hours
            .checked_neg()
            .and_then(|hours| HourBucket::containing(latest).checked_offset(hours));
        Ok(start.unwrap_or_else(|| {
            warn!(
                overlap_hours = backfill.resume_overlap_hours,
                "Resume overlap out of range, using the default start"
            );
            backfill.default_start
        }))
    }

    /// Reconcile the hours `from..to` of every station.
    ///
    /// A failing chunk is logged and reported in the summary; the other
    /// chunks are unaffected.
    pub async fn backfill(
        &self,
        stations: &[String],
        from: HourBucket,
        to: HourBucket,
    ) -> BackfillSummary {
        let config = &self.settings.backfill;
        let chunks: Vec<&[String]> = stations.chunks(config.chunk_size.max(1)).collect();
        info!(
            stations = stations.len(),
            chunks = chunks.len(),
            %from,
            %to,
            "Starting backfill"
        );

        let results: Vec<(&[String], Result<ChunkReport, ServiceError>)> = stream::iter(chunks)
            .map(|chunk| async move { (chunk, self.reconcile_chunk(chunk, from, to).await) })
            .buffer_unordered(config.max_concurrent_chunks.max(1))
            .collect()
            .await;

        let mut summary = BackfillSummary::default();
        for (chunk, result) in results {
            summary.chunks += 1;
            match result {
                Ok(report) => {
                    summary.written += report.written;
                    summary.malformed += report.malformed;
                    summary.superseded += report.superseded;
                }
                Err(e) => {
                    error!(
                        first_station = chunk.first().map(String::as_str).unwrap_or_default(),
                        stations = chunk.len(),
                        error = %e,
                        "Backfill chunk failed"
                    );
                    summary.failed.push(ChunkFailure {
                        stations: chunk.to_vec(),
                        error: e,
                    });
                }
            }
        }

        info!(
            written = summary.written,
            malformed = summary.malformed,
            superseded = summary.superseded,
            failed_chunks = summary.failed.len(),
            "Backfill finished"
        );
        summary
    }

    async fn reconcile_chunk(
        &self,
        stations: &[String],
        from: HourBucket,
        to: HourBucket,
    ) -> Result<ChunkReport, ServiceError> {
        let annotator = RouteAnnotator::new(self.network.current().await);
        let mut writer = DurableWriter::new(&self.store, &self.settings.writer);
        let mut report = ChunkReport::default();

        for station in stations {
            let timeline = StationTimeline::load(&self.feed, station, from, to).await?;
            let reconciled = reconcile_blocking(timeline, from, to, &annotator).await?;
            report.malformed += reconciled.malformed;
            report.superseded += reconciled.superseded;
            debug!(station = %station, records = reconciled.records.len(), "Reconciled station");
            for record in reconciled.records {
                writer.push(record).await?;
            }
        }

        report.written = writer.finish().await?;
        info!(
            first_station = stations.first().map(String::as_str).unwrap_or_default(),
            stations = stations.len(),
            written = report.written,
            "Backfill chunk written"
        );
        Ok(report)
    }

    /// Process the next batch of log notifications.
    ///
    /// Returns `None` if the log had nothing new. The cursor is advanced only
    /// after every record of the batch is stored; on error it stays put and
    /// the same notifications are read again next time.
    pub async fn run_cycle<L: DeliveryLog>(
        &self,
        log: &L,
    ) -> Result<Option<CycleReport>, ServiceError> {
        let follow = &self.settings.follow;
        let cursor = log.cursor(&follow.consumer).await?;
        let batch = log.read_since(cursor, follow.batch_limit).await?;
        let Some(last_seq) = batch.last_seq else {
            return Ok(None);
        };

        // (station, hour) -> stops to write, or None for every stop
        let mut targets: BTreeMap<(String, HourBucket), Option<HashSet<StopId>>> = BTreeMap::new();
        for notification in &batch.notifications {
            let entry = targets
                .entry((notification.station.clone(), notification.hour))
                .or_insert_with(|| Some(HashSet::new()));
            match notification.hash_id {
                Some(id) => {
                    if let Some(ids) = entry {
                        ids.insert(id);
                    }
                }
                None => *entry = None,
            }
        }

        let annotator = RouteAnnotator::new(self.network.current().await);
        let mut writer = DurableWriter::new(&self.store, &self.settings.writer);
        for ((station, hour), ids) in &targets {
            let timeline = StationTimeline::load(&self.feed, station, *hour, hour.next()).await?;
            let reconciled = reconcile_blocking(timeline, *hour, hour.next(), &annotator).await?;
            for record in reconciled.records {
                if ids.as_ref().is_none_or(|ids| ids.contains(&record.hash_id)) {
                    writer.push(record).await?;
                }
            }
        }
        let written = writer.finish().await?;

        log.advance(&follow.consumer, last_seq).await?;
        let report = CycleReport {
            notifications: batch.notifications.len(),
            written,
            cursor: last_seq,
        };
        info!(
            notifications = report.notifications,
            written = report.written,
            cursor = report.cursor,
            "Reconciliation cycle done"
        );
        Ok(Some(report))
    }

    /// Poll the delivery log until `shutdown` completes.
    ///
    /// Sleeps for the idle interval after an empty poll and for the retry
    /// backoff after a failed cycle. Failures never end the loop.
    pub async fn follow<L: DeliveryLog>(&self, log: &L, shutdown: impl Future<Output = ()>) {
        let follow = &self.settings.follow;
        tokio::pin!(shutdown);
        info!(consumer = %follow.consumer, "Following delivery log");

        let mut failures: u32 = 0;
        loop {
            let pause = match self.run_cycle(log).await {
                Ok(Some(_)) => {
                    failures = 0;
                    Duration::ZERO
                }
                Ok(None) => {
                    failures = 0;
                    follow.idle_interval()
                }
                Err(e) => {
                    failures += 1;
                    if failures > 1 {
                        error!(failures, error = %e, "Reconciliation cycle failed again, retrying");
                    } else {
                        warn!(error = %e, "Reconciliation cycle failed, retrying");
                    }
                    follow.retry_backoff()
                }
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stopped following delivery log");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

/// Run the reconcile pass of a loaded timeline on the blocking pool, so
/// the path searches of concurrent chunks run in parallel.
async fn reconcile_blocking(
    timeline: StationTimeline,
    from: HourBucket,
    to: HourBucket,
    annotator: &RouteAnnotator,
) -> Result<Reconciled, ServiceError> {
    let annotator = annotator.clone();
    Ok(tokio::task::spawn_blocking(move || timeline.reconcile(from, to, &annotator)).await?)
}
