//! Reconciliation of plan and change batches into canonical stop records.
//!
//! For every stop planned at a station in some hour:
//!
//! 1. [`build_record`] turns the plan entry into a [`CanonicalStopRecord`];
//! 2. [`merge_changes`] applies the change batches of that hour and the
//!    three following ones, and drops the record if the stop is planned
//!    again in the next hour;
//! 3. [`RouteAnnotator`] adds the route distances;
//! 4. the record is handed to a [`DurableWriter`](crate::store::DurableWriter).
//!
//! [`ReconciliationService`] drives this pipeline in backfill and follow
//! mode.

mod annotate;
mod builder;
mod config;
mod merger;
mod record;
mod service;
mod timeline;

pub use annotate::RouteAnnotator;
pub use builder::{BuildError, build_record};
pub use config::{BackfillConfig, FollowConfig, ServiceSettings};
pub use merger::{
    CHANGE_LOOKAHEAD_HOURS, ChangeIndex, MergeOutcome, MergeWindow, PlanKeys, WINDOW_LEN,
    apply_change, merge_changes,
};
pub use record::{
    CanonicalStopRecord, MessageLog, ObstaclePriorities, PlanAttributes, RouteDistances,
    StopEvent, TrainLabel,
};
pub use service::{
    BackfillSummary, ChunkFailure, ChunkReport, CycleReport, ReconciliationService, ServiceError,
};
pub use timeline::{Reconciled, StationTimeline};
