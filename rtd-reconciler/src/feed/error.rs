//! Feed error types.

/// Errors that can occur while reading raw feed batches.
///
/// A batch that was simply never published is not an error; sources
/// report it as `None` in the [`HourBatch`](super::HourBatch).
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Reading the batch failed
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The source is not usable at all
    #[error("feed not available: {0}")]
    Unavailable(String),
}
