//! Rail network: track graph plus station table.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::StationError;
use super::geo::haversine_distance;
use super::graph::{Segment, TrackGraph};
use super::lookup::{StationLookup, StationRecord, StationTable};

/// Serialized network: station table and track segments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    #[serde(default)]
    pub stations: Vec<StationRecord>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl NetworkSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| StationError::Snapshot {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        serde_json::from_str(&contents).map_err(|e| StationError::Snapshot {
            message: format!("failed to parse {}: {}", path.display(), e),
        })
    }
}

/// How a distance was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceSource {
    /// Shortest path over the track graph.
    Network,
    /// Great-circle distance between station coordinates.
    Geodesic,
    /// Neither graph path nor coordinates were available; the distance is
    /// reported as zero.
    Unknown,
}

/// Distance between two stations in meters, tagged with its source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    pub meters: f64,
    pub source: DistanceSource,
}

impl Distance {
    pub fn network(meters: f64) -> Self {
        Self {
            meters,
            source: DistanceSource::Network,
        }
    }

    pub fn geodesic(meters: f64) -> Self {
        Self {
            meters,
            source: DistanceSource::Geodesic,
        }
    }

    /// The zero-distance fallback.
    pub fn unknown() -> Self {
        Self {
            meters: 0.0,
            source: DistanceSource::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        self.source != DistanceSource::Unknown
    }
}

/// Immutable station graph with coordinate fallback.
pub struct StationNetwork {
    graph: TrackGraph,
    stations: Box<dyn StationLookup>,
}

impl StationNetwork {
    pub fn new(graph: TrackGraph, stations: impl StationLookup + 'static) -> Self {
        Self {
            graph,
            stations: Box::new(stations),
        }
    }

    /// Build the network from a snapshot.
    pub fn from_snapshot(snapshot: &NetworkSnapshot) -> Result<Self, StationError> {
        let graph = TrackGraph::from_segments(&snapshot.segments)?;
        let stations = StationTable::new(snapshot.stations.iter().cloned());
        Ok(Self::new(graph, stations))
    }

    /// Station lookup backing the coordinate fallback.
    pub fn stations(&self) -> &dyn StationLookup {
        self.stations.as_ref()
    }

    pub fn graph(&self) -> &TrackGraph {
        &self.graph
    }

    /// Whether the network can say anything about this station: it is a
    /// graph node or it has coordinates.
    pub fn is_resolvable(&self, name: &str) -> bool {
        self.graph.contains(name) || self.stations.location(name).is_ok()
    }

    /// Distance between two stations.
    ///
    /// Uses the track graph if both stations are nodes and connected,
    /// otherwise the great-circle distance between their coordinates. If
    /// either coordinate is unavailable the result is a zero
    /// [`DistanceSource::Unknown`] distance.
    pub fn distance(&self, u: &str, v: &str) -> Distance {
        if let Some(meters) = self.graph.shortest_path_length(u, v) {
            return Distance::network(meters);
        }

        let locations = self
            .stations
            .location(u)
            .and_then(|a| self.stations.location(v).map(|b| (a, b)));
        match locations {
            Ok((a, b)) => Distance::geodesic(haversine_distance(a, b)),
            Err(e) => {
                debug!(u, v, error = %e, "No distance between stations");
                Distance::unknown()
            }
        }
    }
}
