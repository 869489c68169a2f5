//! Applying realtime changes to built records.
//!
//! Changes for a stop are published under the hour the stop is planned in
//! and under the following hours, so a record is merged with the change
//! batches of its own hour and the next [`CHANGE_LOOKAHEAD_HOURS`]. Batches
//! are applied furthest hour first, which lets the nearest hour's values win.

use std::collections::{HashMap, HashSet};

use crate::feed::{RawChangeEvent, RawPlanStop};

use super::record::CanonicalStopRecord;

/// Hours after a stop's own hour whose change batches still apply to it.
pub const CHANGE_LOOKAHEAD_HOURS: usize = 3;

/// Number of change batches in a merge window.
pub const WINDOW_LEN: usize = CHANGE_LOOKAHEAD_HOURS + 1;

/// Changes of one hourly batch by natural key.
#[derive(Debug, Default)]
pub struct ChangeIndex<'a> {
    by_key: HashMap<&'a str, &'a RawChangeEvent>,
}

impl<'a> ChangeIndex<'a> {
    /// Index a change batch. Only the first change for a key is used.
    pub fn new(changes: &'a [RawChangeEvent]) -> Self {
        let mut by_key = HashMap::with_capacity(changes.len());
        for change in changes {
            by_key.entry(change.id.as_str()).or_insert(change);
        }
        Self { by_key }
    }

    pub fn get(&self, key: &str) -> Option<&'a RawChangeEvent> {
        self.by_key.get(key).copied()
    }
}

/// Natural keys planned in one hour.
#[derive(Debug, Default)]
pub struct PlanKeys<'a> {
    keys: HashSet<&'a str>,
}

impl<'a> PlanKeys<'a> {
    pub fn new(plan: &'a [RawPlanStop]) -> Self {
        Self {
            keys: plan.iter().map(|stop| stop.id.as_str()).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

/// Everything published around one hour that a record of that hour is
/// merged against. Absent batches are feed gaps.
#[derive(Debug, Clone, Copy)]
pub struct MergeWindow<'a> {
    /// Change batches at offsets 0 (own hour) to 3.
    changes: [Option<&'a ChangeIndex<'a>>; WINDOW_LEN],
    /// Plan of the following hour.
    next_plan: Option<&'a PlanKeys<'a>>,
}

impl<'a> MergeWindow<'a> {
    pub fn new(
        changes: [Option<&'a ChangeIndex<'a>>; WINDOW_LEN],
        next_plan: Option<&'a PlanKeys<'a>>,
    ) -> Self {
        Self { changes, next_plan }
    }
}

/// What happened to a record during merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The record is final and should be persisted.
    Kept,
    /// The stop is planned again in the next hour; this instance is dropped
    /// and the next hour's one is persisted instead.
    Superseded,
}

/// Merge the window's changes into `record`.
pub fn merge_changes(record: &mut CanonicalStopRecord, window: &MergeWindow<'_>) -> MergeOutcome {
    let key = record.key.as_str().to_string();
    if window.next_plan.is_some_and(|plan| plan.contains(&key)) {
        return MergeOutcome::Superseded;
    }

    for index in window.changes.iter().rev().flatten() {
        if let Some(change) = index.get(&key) {
            apply_change(record, change);
        }
    }
    MergeOutcome::Kept
}

/// Overwrite the fields a change carries and append its messages.
pub fn apply_change(record: &mut CanonicalStopRecord, change: &RawChangeEvent) {
    if let Some(arrival) = change.arrival() {
        record.ar.overwrite(arrival);
    }
    if let Some(departure) = change.departure() {
        record.dp.overwrite(departure);
    }
    for message in &change.m {
        record.messages.push(message);
    }
}
