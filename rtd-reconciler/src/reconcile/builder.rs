//! Building canonical records from plan stops.

use crate::domain::{InvalidNaturalKey, NaturalKey};
use crate::feed::RawPlanStop;

use super::record::{
    CanonicalStopRecord, MessageLog, ObstaclePriorities, PlanAttributes, StopEvent, TrainLabel,
};

/// Errors building a record from a plan stop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("malformed stop identifier: {0}")]
    MalformedIdentifier(#[from] InvalidNaturalKey),
}

/// Build the canonical record for one planned stop at `station`.
///
/// Current arrival and departure fields start out equal to the planned ones,
/// so a stop that never receives a change is still complete. Missing train
/// label or events leave the corresponding fields null.
pub fn build_record(stop: &RawPlanStop, station: &str) -> Result<CanonicalStopRecord, BuildError> {
    let key = NaturalKey::parse(&stop.id)?;
    Ok(CanonicalStopRecord {
        hash_id: key.stop_id(),
        key,
        station: station.to_string(),
        label: stop.train_label().map(TrainLabel::from).unwrap_or_default(),
        ar: StopEvent::planned(stop.arrival()),
        dp: StopEvent::planned(stop.departure()),
        messages: MessageLog::default(),
        distances: None,
        obstacles: ObstaclePriorities::default(),
        attributes: PlanAttributes::from(stop),
    })
}
