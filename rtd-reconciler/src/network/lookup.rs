//! Station table: names, station numbers, DS100 codes and coordinates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::StationError;
use super::geo::Coord;

/// Station metadata lookup.
///
/// Misses are reported as errors; deciding what a miss means is up to the
/// caller.
pub trait StationLookup: Send + Sync {
    /// Coordinates of a station by name.
    fn location(&self, name: &str) -> Result<Coord, StationError>;

    /// Station name for an EVA station number.
    fn name_of(&self, eva: i64) -> Result<String, StationError>;

    /// EVA station number for a station name.
    fn eva_of(&self, name: &str) -> Result<i64, StationError>;

    /// DS100 code (e.g. `AA` for Hamburg-Altona) for a station name.
    fn ds100_of(&self, name: &str) -> Result<String, StationError>;

    /// Station name for a DS100 code.
    fn name_of_ds100(&self, ds100: &str) -> Result<String, StationError>;

    /// Coordinates of a station by DS100 code.
    fn location_of_ds100(&self, ds100: &str) -> Result<Coord, StationError> {
        self.location(&self.name_of_ds100(ds100)?)
    }
}

/// One row of the station table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub name: String,
    #[serde(default)]
    pub eva: Option<i64>,
    #[serde(default)]
    pub ds100: Option<String>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
}

impl StationRecord {
    fn coord(&self) -> Option<Coord> {
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => {
                Some(Coord::new(lon, lat))
            }
            _ => None,
        }
    }
}

/// In-memory station table indexed by name, station number and DS100 code.
#[derive(Debug, Clone, Default)]
pub struct StationTable {
    by_name: HashMap<String, StationRecord>,
    by_eva: HashMap<i64, String>,
    by_ds100: HashMap<String, String>,
}

impl StationTable {
    /// Build the table. Later rows win on duplicate names.
    pub fn new(records: impl IntoIterator<Item = StationRecord>) -> Self {
        let mut table = Self::default();
        for record in records {
            if let Some(eva) = record.eva {
                table.by_eva.insert(eva, record.name.clone());
            }
            if let Some(ds100) = &record.ds100 {
                table.by_ds100.insert(ds100.clone(), record.name.clone());
            }
            table.by_name.insert(record.name.clone(), record);
        }
        table
    }

    /// Station names in the table, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl StationLookup for StationTable {
    fn location(&self, name: &str) -> Result<Coord, StationError> {
        let record = self
            .by_name
            .get(name)
            .ok_or_else(|| StationError::UnknownStation(name.to_string()))?;
        record
            .coord()
            .ok_or_else(|| StationError::NoLocation(name.to_string()))
    }

    fn name_of(&self, eva: i64) -> Result<String, StationError> {
        self.by_eva
            .get(&eva)
            .cloned()
            .ok_or(StationError::UnknownEva(eva))
    }

    fn eva_of(&self, name: &str) -> Result<i64, StationError> {
        self.by_name
            .get(name)
            .and_then(|r| r.eva)
            .ok_or_else(|| StationError::UnknownStation(name.to_string()))
    }

    fn ds100_of(&self, name: &str) -> Result<String, StationError> {
        self.by_name
            .get(name)
            .and_then(|r| r.ds100.clone())
            .ok_or_else(|| StationError::UnknownStation(name.to_string()))
    }

    fn name_of_ds100(&self, ds100: &str) -> Result<String, StationError> {
        self.by_ds100
            .get(ds100)
            .cloned()
            .ok_or_else(|| StationError::UnknownDs100(ds100.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StationTable {
        StationTable::new(vec![
            StationRecord {
                name: "Altona".into(),
                eva: Some(8002553),
                ds100: Some("AA".into()),
                lon: Some(9.935),
                lat: Some(53.552),
            },
            StationRecord {
                name: "Nowhere".into(),
                eva: None,
                ds100: Some("XNW".into()),
                lon: None,
                lat: Some(50.0),
            },
        ])
    }

    #[test]
    fn location_lookup() {
        let table = table();
        assert_eq!(table.location("Altona").unwrap(), Coord::new(9.935, 53.552));
        assert_eq!(
            table.location("Nowhere"),
            Err(StationError::NoLocation("Nowhere".into()))
        );
        assert_eq!(
            table.location("Atlantis"),
            Err(StationError::UnknownStation("Atlantis".into()))
        );
    }

    #[test]
    fn eva_mapping_both_ways() {
        let table = table();
        assert_eq!(table.name_of(8002553).unwrap(), "Altona");
        assert_eq!(table.eva_of("Altona").unwrap(), 8002553);
        assert_eq!(table.name_of(1), Err(StationError::UnknownEva(1)));
        assert!(table.eva_of("Nowhere").is_err());
    }

    #[test]
    fn ds100_mapping_both_ways() {
        let table = table();
        assert_eq!(table.ds100_of("Altona").unwrap(), "AA");
        assert_eq!(table.name_of_ds100("AA").unwrap(), "Altona");
        assert_eq!(
            table.name_of_ds100("ZZ"),
            Err(StationError::UnknownDs100("ZZ".into()))
        );
        assert!(table.ds100_of("Atlantis").is_err());
    }

    #[test]
    fn location_by_ds100() {
        let table = table();
        assert_eq!(table.location_of_ds100("AA").unwrap(), Coord::new(9.935, 53.552));
        assert_eq!(
            table.location_of_ds100("XNW"),
            Err(StationError::NoLocation("Nowhere".into()))
        );
    }

    #[test]
    fn names_are_sorted() {
        let table = table();
        assert_eq!(table.names(), vec!["Altona", "Nowhere"]);
        assert_eq!(table.len(), 2);
        assert!(!table.is_empty());
    }
}
