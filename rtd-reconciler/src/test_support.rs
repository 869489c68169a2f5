//! Shared fixtures for unit tests.

use crate::domain::HourBucket;
use crate::feed::{RawChangeEvent, RawEvent, RawMessage, RawPlanStop};
use crate::network::{DistanceCache, DistanceCacheConfig, NetworkSnapshot, StationNetwork};

/// A small network around Hamburg.
///
/// * Hamburg Hbf – Altona (6.3 km) and Hamburg Hbf – Harburg (11 km) on track
/// * Kiel Hbf – Sylt and Kiel Hbf – Depot on a separate island
/// * Ghost has a number but no coordinates, Depot has no station row
pub fn snapshot() -> NetworkSnapshot {
    serde_json::from_str(
        r#"{
            "stations": [
                {"name": "Hamburg Hbf", "eva": 8002549, "lon": 10.0069, "lat": 53.5530},
                {"name": "Altona", "eva": 8002553, "lon": 9.9350, "lat": 53.5520},
                {"name": "Harburg", "eva": 8000147, "lon": 9.9915, "lat": 53.4560},
                {"name": "Kiel Hbf", "eva": 8000199, "lon": 10.1320, "lat": 54.3150},
                {"name": "Sylt", "eva": 8000001, "lon": 8.3100, "lat": 54.9000},
                {"name": "Ghost", "eva": 8000002}
            ],
            "segments": [
                {"u": "Hamburg Hbf", "v": "Altona", "length": 6300.0},
                {"u": "Hamburg Hbf", "v": "Harburg", "length": 11000.0},
                {"u": "Kiel Hbf", "v": "Sylt", "length": 200000.0},
                {"u": "Kiel Hbf", "v": "Depot", "length": 1500.0}
            ]
        }"#,
    )
    .unwrap()
}

pub fn distance_cache() -> DistanceCache {
    let network = StationNetwork::from_snapshot(&snapshot()).unwrap();
    DistanceCache::new(network, &DistanceCacheConfig::default())
}

pub fn hour(s: &str) -> HourBucket {
    HourBucket::parse(s).unwrap()
}

/// Plan stop with an arrival at `pt` coming from `path` and a departure at
/// `dt` heading to `next`.
pub fn plan_stop(id: &str, pt: &str, path: &str, dt: &str, next: &str) -> RawPlanStop {
    RawPlanStop {
        id: id.to_string(),
        tl: Vec::new(),
        ar: vec![RawEvent {
            pt: Some(pt.to_string()),
            pp: Some("5".to_string()),
            ppth: Some(path.to_string()),
            ..RawEvent::default()
        }],
        dp: vec![RawEvent {
            pt: Some(dt.to_string()),
            pp: Some("5".to_string()),
            ppth: Some(next.to_string()),
            ..RawEvent::default()
        }],
        ..RawPlanStop::default()
    }
}

/// Change revising the arrival time and carrying one arrival message.
pub fn arrival_change(id: &str, ct: &str, message_id: &str) -> RawChangeEvent {
    RawChangeEvent {
        id: id.to_string(),
        ar: vec![RawEvent {
            ct: Some(ct.to_string()),
            m: vec![RawMessage {
                id: Some(message_id.to_string()),
                t: Some("d".to_string()),
                ts: Some(ct.to_string()),
                c: Some(47),
            }],
            ..RawEvent::default()
        }],
        dp: Vec::new(),
        m: Vec::new(),
    }
}
