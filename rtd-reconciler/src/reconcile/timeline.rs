//! All hourly batches of one station needed to reconcile a range of hours.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::domain::HourBucket;
use crate::feed::{FeedError, FeedSource, HourBatch};

use super::annotate::RouteAnnotator;
use super::builder::build_record;
use super::merger::{
    CHANGE_LOOKAHEAD_HOURS, ChangeIndex, MergeOutcome, MergeWindow, PlanKeys, merge_changes,
};
use super::record::CanonicalStopRecord;

/// Records produced for one station, with counts of stops left out.
#[derive(Debug, Default)]
pub struct Reconciled {
    pub records: Vec<CanonicalStopRecord>,
    /// Plan stops with an unparseable key.
    pub malformed: usize,
    /// Plan stops dropped because they are planned again in the next hour.
    pub superseded: usize,
}

/// The batches of one station, keyed by hour.
#[derive(Debug, Clone)]
pub struct StationTimeline {
    station: String,
    hours: BTreeMap<HourBucket, HourBatch>,
}

impl StationTimeline {
    pub fn new(station: impl Into<String>, hours: BTreeMap<HourBucket, HourBatch>) -> Self {
        Self {
            station: station.into(),
            hours,
        }
    }

    /// Fetch what is needed to reconcile the hours `from..to`: the hours
    /// themselves and the lookahead hours after them.
    pub async fn load<F: FeedSource>(
        feed: &F,
        station: &str,
        from: HourBucket,
        to: HourBucket,
    ) -> Result<Self, FeedError> {
        let mut hours = BTreeMap::new();
        for hour in from.range_to(to.offset(CHANGE_LOOKAHEAD_HOURS as i64)) {
            let batch = feed.hour_batch(station, hour).await?;
            if batch != HourBatch::empty() {
                hours.insert(hour, batch);
            }
        }
        debug!(station, %from, %to, loaded = hours.len(), "Loaded station timeline");
        Ok(Self::new(station, hours))
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    /// Build, merge and annotate every stop planned in `from..to`.
    pub fn reconcile(
        &self,
        from: HourBucket,
        to: HourBucket,
        annotator: &RouteAnnotator,
    ) -> Reconciled {
        let changes: HashMap<HourBucket, ChangeIndex<'_>> = self
            .hours
            .iter()
            .filter_map(|(hour, batch)| Some((*hour, ChangeIndex::new(batch.changes.as_deref()?))))
            .collect();
        let plans: HashMap<HourBucket, PlanKeys<'_>> = self
            .hours
            .iter()
            .filter_map(|(hour, batch)| Some((*hour, PlanKeys::new(batch.plan.as_deref()?))))
            .collect();

        let mut out = Reconciled::default();
        for hour in from.range_to(to) {
            let Some(plan) = self.hours.get(&hour).and_then(|b| b.plan.as_deref()) else {
                continue;
            };
            let window = MergeWindow::new(
                std::array::from_fn(|offset| changes.get(&hour.offset(offset as i64))),
                plans.get(&hour.next()),
            );

            for stop in plan {
                let mut record = match build_record(stop, &self.station) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(station = %self.station, %hour, error = %e, "Skipping stop");
                        out.malformed += 1;
                        continue;
                    }
                };
                match merge_changes(&mut record, &window) {
                    MergeOutcome::Kept => {
                        annotator.annotate(&mut record);
                        out.records.push(record);
                    }
                    MergeOutcome::Superseded => out.superseded += 1,
                }
            }
        }
        out
    }
}
