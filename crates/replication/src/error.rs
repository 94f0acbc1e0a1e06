//! Error types for replication-server selection.

use corelib::ConfigError;
use thiserror::Error;

/// Result type for selection operations.
pub type Result<T> = std::result::Result<T, SelectionError>;

/// Preconditions that prevent selection from running at all.
///
/// Finding no usable replication server is not an error; it is reported as a
/// selection with no winner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Invalid local configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
