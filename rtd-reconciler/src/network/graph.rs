//! Track graph with weighted shortest paths.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use super::error::StationError;

/// Bidirectional track segment between two stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub u: String,
    pub v: String,
    /// Length in meters.
    pub length: f64,
}

/// Undirected weighted graph of stations.
///
/// Built once from a list of segments and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct TrackGraph {
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<(usize, f64)>>,
}

/// Dijkstra frontier entry, ordered so that `BinaryHeap` pops the cheapest.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| self.node.cmp(&other.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TrackGraph {
    /// Build a graph from segments.
    ///
    /// Stations become nodes by appearing in a segment. Lengths must be
    /// finite and non-negative.
    pub fn from_segments<'a>(
        segments: impl IntoIterator<Item = &'a Segment>,
    ) -> Result<Self, StationError> {
        let mut graph = Self::default();
        for segment in segments {
            if !segment.length.is_finite() || segment.length < 0.0 {
                return Err(StationError::InvalidSegment {
                    u: segment.u.clone(),
                    v: segment.v.clone(),
                    length: segment.length,
                });
            }
            let u = graph.node(&segment.u);
            let v = graph.node(&segment.v);
            graph.adjacency[u].push((v, segment.length));
            graph.adjacency[v].push((u, segment.length));
        }
        Ok(graph)
    }

    fn node(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.adjacency.len();
        self.index.insert(name.to_string(), idx);
        self.adjacency.push(Vec::new());
        idx
    }

    /// Whether the station is a node of the graph.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Length of the shortest path between two stations.
    ///
    /// Returns `None` if either station is not in the graph or no path
    /// connects them.
    pub fn shortest_path_length(&self, from: &str, to: &str) -> Option<f64> {
        let source = *self.index.get(from)?;
        let target = *self.index.get(to)?;

        let mut dist = vec![f64::INFINITY; self.adjacency.len()];
        dist[source] = 0.0;
        let mut heap = BinaryHeap::new();
        heap.push(Frontier {
            cost: 0.0,
            node: source,
        });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if node == target {
                return Some(cost);
            }
            if cost > dist[node] {
                continue; // Stale entry
            }
            for &(next, weight) in &self.adjacency[node] {
                let candidate = cost + weight;
                if candidate < dist[next] {
                    dist[next] = candidate;
                    heap.push(Frontier {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }

        None
    }
}
