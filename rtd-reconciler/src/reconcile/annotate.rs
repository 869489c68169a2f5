//! Route position of a stop.

use std::sync::Arc;

use tracing::debug;

use crate::network::DistanceCache;

use super::record::{CanonicalStopRecord, RouteDistances};

/// Sets [`RouteDistances`] on records from their current paths.
#[derive(Clone)]
pub struct RouteAnnotator {
    distances: Arc<DistanceCache>,
}

impl RouteAnnotator {
    pub fn new(distances: Arc<DistanceCache>) -> Self {
        Self { distances }
    }

    /// Compute the route distances of `record` and drop its paths.
    ///
    /// The arrival path lists the stations before this one, the departure
    /// path those after it. A stop without an arrival (or departure) path
    /// gets zero for the two distances derived from it.
    pub fn annotate(&self, record: &mut CanonicalStopRecord) {
        let station = record.station.as_str();

        let (to_last, to_start) = match record.ar.cpth.as_deref() {
            Some(path @ [.., last]) => {
                let mut route: Vec<&str> = path.iter().map(String::as_str).collect();
                route.push(station);
                (
                    self.distances.distance(last, station).meters,
                    self.route_meters(&route, record),
                )
            }
            _ => (0.0, 0.0),
        };

        let (to_next, to_end) = match record.dp.cpth.as_deref() {
            Some(path @ [first, ..]) => {
                let mut route: Vec<&str> = Vec::with_capacity(path.len() + 1);
                route.push(station);
                route.extend(path.iter().map(String::as_str));
                (
                    self.distances.distance(station, first).meters,
                    self.route_meters(&route, record),
                )
            }
            _ => (0.0, 0.0),
        };

        record.distances = Some(RouteDistances {
            to_start,
            to_end,
            to_last,
            to_next,
        });
        record.ar.clear_paths();
        record.dp.clear_paths();
    }

    fn route_meters(&self, route: &[&str], record: &CanonicalStopRecord) -> f64 {
        let length = self.distances.route_length(route);
        if length.skipped_waypoints > 0 || length.unresolved_legs > 0 {
            debug!(
                hash_id = %record.hash_id,
                station = %record.station,
                skipped = length.skipped_waypoints,
                unresolved = length.unresolved_legs,
                "Route length is partial"
            );
        }
        length.meters
    }
}
