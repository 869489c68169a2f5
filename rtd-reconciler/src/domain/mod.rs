//! Domain types for timetable reconciliation.
//!
//! Identity of a stop (natural key and derived storage id) and the feed's
//! time formats. All types validate at construction time.

mod stop_id;
mod time;

pub use stop_id::{InvalidNaturalKey, NaturalKey, StopId};
pub use time::{HourBucket, TimeError, from_storage, parse_feed_time, to_storage};
