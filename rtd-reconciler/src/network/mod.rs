//! Rail network distances.
//!
//! Provides the shortest-path distance between stations over the track
//! graph, with a great-circle fallback for stations outside the graph and
//! an explicit zero for stations that cannot be located at all. Distances
//! are memoized in a bounded cache shared by all reconciliation workers.

mod distance;
mod error;
mod geo;
mod graph;
mod lookup;
mod station_network;

pub use distance::{DistanceCache, DistanceCacheConfig, NetworkHandle, RouteLength};
pub use error::StationError;
pub use geo::{Coord, haversine_distance};
pub use graph::{Segment, TrackGraph};
pub use lookup::{StationLookup, StationRecord, StationTable};
pub use station_network::{Distance, DistanceSource, NetworkSnapshot, StationNetwork};
