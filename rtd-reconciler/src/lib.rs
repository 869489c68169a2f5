//! Realtime railway stop reconciliation.
//!
//! Timetable data is published per station and hour in two layers: a plan
//! of scheduled stops and change documents with realtime revisions. This
//! crate merges both into one canonical record per physical stop, annotates
//! each stop with its position along the route on the rail network, and
//! stores the records idempotently.

pub mod config;
pub mod domain;
pub mod feed;
pub mod network;
pub mod reconcile;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
