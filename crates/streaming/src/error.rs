//! Error types for topology ingestion and the reselection runtime.

use replication::SelectionError;
use thiserror::Error;

/// Errors from the streaming layer.
#[derive(Debug, Error)]
pub enum StreamingError {
    /// The topology feed was dropped; no further snapshots will arrive.
    #[error("Topology feed closed")]
    FeedClosed,

    #[error(transparent)]
    Selection(#[from] SelectionError),
}
