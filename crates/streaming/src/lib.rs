//! Topology ingestion and the replication server reselection runtime.
//!
//! - [`TopologyFeed`]: single writer publishing immutable topology snapshots
//! - [`TopologySource`]: seam for whatever decodes topology announcements
//! - [`Reselector`]: background task turning snapshots into connect/stay/disconnect decisions

pub mod error;
pub mod feed;
pub mod metrics;
pub mod reselector;
pub mod source;

pub use error::StreamingError;
pub use feed::{TopologyFeed, TopologyReader};
pub use reselector::{Decision, DecisionEvent, Reselector};
pub use source::{pump, ChannelSource, DynTopologySource, TopologySource};
