//! Station and network error types.

/// Errors from station lookup and network loading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StationError {
    /// Station name not present in the station table
    #[error("unknown station: {0}")]
    UnknownStation(String),

    /// Station number not present in the station table
    #[error("unknown station number: {0}")]
    UnknownEva(i64),

    /// DS100 code not present in the station table
    #[error("unknown DS100 code: {0}")]
    UnknownDs100(String),

    /// Station is known but has no coordinates
    #[error("no location for station: {0}")]
    NoLocation(String),

    /// Track segment with a negative or non-finite length
    #[error("invalid segment {u} - {v}: length {length}")]
    InvalidSegment { u: String, v: String, length: f64 },

    /// Network snapshot could not be loaded
    #[error("snapshot error: {message}")]
    Snapshot { message: String },
}
