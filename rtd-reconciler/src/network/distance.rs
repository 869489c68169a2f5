//! Memoized station distances.
//!
//! Route annotation asks for the same station pairs over and over (every
//! train along a line repeats the same legs), so distances are cached per
//! unordered station pair. The cache is bounded and evicts least recently
//! used pairs.

use std::path::Path;
use std::sync::Arc;

use moka::policy::EvictionPolicy;
use moka::sync::Cache as MokaCache;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::error::StationError;
use super::station_network::{Distance, NetworkSnapshot, StationNetwork};

/// Unordered station pair, stored with the smaller name first.
type PairKey = (String, String);

/// Configuration for the distance cache.
#[derive(Debug, Clone, Deserialize)]
pub struct DistanceCacheConfig {
    /// Maximum number of cached station pairs (default: 8000)
    #[serde(default = "DistanceCacheConfig::default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for DistanceCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: Self::default_max_capacity(),
        }
    }
}

impl DistanceCacheConfig {
    fn default_max_capacity() -> u64 {
        8000
    }
}

/// Total length of a route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteLength {
    pub meters: f64,
    /// Waypoints that are neither graph nodes nor located, left out of the route.
    pub skipped_waypoints: usize,
    /// Legs whose distance could not be determined and counted as zero.
    pub unresolved_legs: usize,
}

impl RouteLength {
    fn zero() -> Self {
        Self {
            meters: 0.0,
            skipped_waypoints: 0,
            unresolved_legs: 0,
        }
    }
}

/// Station network with a bounded, thread-safe distance memo.
pub struct DistanceCache {
    network: StationNetwork,
    pairs: MokaCache<PairKey, Distance>,
}

impl DistanceCache {
    pub fn new(network: StationNetwork, config: &DistanceCacheConfig) -> Self {
        let pairs = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { network, pairs }
    }

    fn key(u: &str, v: &str) -> PairKey {
        if u <= v {
            (u.to_string(), v.to_string())
        } else {
            (v.to_string(), u.to_string())
        }
    }

    /// Distance between two stations, computed at most once per pair while
    /// the pair stays cached.
    pub fn distance(&self, u: &str, v: &str) -> Distance {
        self.pairs
            .get_with(Self::key(u, v), || self.network.distance(u, v))
    }

    /// Sum of distances between consecutive waypoints.
    ///
    /// Waypoints the network knows nothing about are left out, so the legs
    /// around them collapse into one. Legs with an unknown distance
    /// contribute zero.
    pub fn route_length<S: AsRef<str>>(&self, waypoints: &[S]) -> RouteLength {
        let mut length = RouteLength::zero();
        let mut resolved: Vec<&str> = Vec::with_capacity(waypoints.len());
        for waypoint in waypoints {
            let name = waypoint.as_ref();
            if self.network.is_resolvable(name) {
                resolved.push(name);
            } else {
                length.skipped_waypoints += 1;
            }
        }
        self.add_legs(&resolved, &mut length);
        length
    }

    /// Like [`route_length`](Self::route_length), with waypoints given as EVA
    /// station numbers. Numbers without a station name are skipped.
    pub fn eva_route_length(&self, waypoints: &[i64]) -> RouteLength {
        let mut length = RouteLength::zero();
        let mut resolved: Vec<String> = Vec::with_capacity(waypoints.len());
        for eva in waypoints {
            match self.network.stations().name_of(*eva) {
                Ok(name) if self.network.is_resolvable(&name) => resolved.push(name),
                _ => length.skipped_waypoints += 1,
            }
        }
        self.add_legs(&resolved, &mut length);
        length
    }

    fn add_legs<S: AsRef<str>>(&self, waypoints: &[S], length: &mut RouteLength) {
        for leg in waypoints.windows(2) {
            let d = self.distance(leg[0].as_ref(), leg[1].as_ref());
            if d.is_known() {
                length.meters += d.meters;
            } else {
                length.unresolved_legs += 1;
            }
        }
    }

    pub fn network(&self) -> &StationNetwork {
        &self.network
    }

    /// Number of cached pairs (for monitoring).
    pub fn entry_count(&self) -> u64 {
        self.pairs.run_pending_tasks();
        self.pairs.entry_count()
    }
}

/// Swappable reference to the active network and its cache.
///
/// Readers take an `Arc` snapshot with [`current`](Self::current) and keep
/// using it for the rest of their work; [`replace`](Self::replace) installs
/// a freshly built network (with an empty cache) for subsequent readers.
#[derive(Clone)]
pub struct NetworkHandle {
    inner: Arc<RwLock<Arc<DistanceCache>>>,
}

impl NetworkHandle {
    pub fn new(cache: DistanceCache) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(cache))),
        }
    }

    /// The network active right now.
    pub async fn current(&self) -> Arc<DistanceCache> {
        self.inner.read().await.clone()
    }

    /// Install a new network.
    pub async fn replace(&self, cache: DistanceCache) {
        let mut guard = self.inner.write().await;
        *guard = Arc::new(cache);
    }

    /// Rebuild the network from a snapshot file and install it.
    ///
    /// Returns the number of graph nodes. On error the active network is
    /// left in place.
    pub async fn reload(
        &self,
        snapshot: impl AsRef<Path>,
        config: &DistanceCacheConfig,
    ) -> Result<usize, StationError> {
        let snapshot = NetworkSnapshot::load(snapshot)?;
        let network = StationNetwork::from_snapshot(&snapshot)?;
        let nodes = network.graph().node_count();
        self.replace(DistanceCache::new(network, config)).await;
        Ok(nodes)
    }
}
