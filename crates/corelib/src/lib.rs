//! Core data model for replication-server selection.
//!
//! This crate provides the value types the selectors operate on:
//! - Change sequence numbers and their codecs
//! - Per-origin freshness vectors
//! - Peer DS/RS snapshots and server addresses
//! - Local replica configuration
//! - Immutable topology snapshots and their builder

pub mod config;
pub mod csn;
pub mod error;
pub mod network;
pub mod node;
pub mod state;
pub mod topology;

pub use config::{LocalConfig, ValidConfig};
pub use csn::Csn;
pub use error::{ConfigError, Error, Result};
pub use network::ServerUrl;
pub use node::{DsInfo, GenerationId, GroupId, RsInfo, ServerId};
pub use state::ServerState;
pub use topology::{RsView, Topology, TopologyBuilder, TopologyUpdate};
