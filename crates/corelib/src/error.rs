//! Error types for the core library.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A CSN encoding could not be decoded.
    #[error("Invalid CSN: {0}")]
    InvalidCsn(String),
    /// A replication server address is not of the `host:port` form.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
    /// Local configuration cannot support a safe selection.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration defects detected before any selection runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Server ids are strictly positive.
    #[error("server id 0 is reserved")]
    ReservedServerId,
    /// Group ids live in `1..=127`.
    #[error("group id {0} is outside 1..=127")]
    InvalidGroupId(u8),
    /// The local generation id has not been computed yet.
    #[error("local generation id is unknown")]
    UnknownGenerationId,
    /// A configured replication server address does not parse.
    #[error("configured replication server {0:?} is not a host:port address")]
    InvalidReplicationServer(String),
}
