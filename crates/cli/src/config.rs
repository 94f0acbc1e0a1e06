//! Scenario files consumed by `rs-select evaluate`.
//!
//! A scenario is a JSON document describing everything the selection needs:
//!
//! ```json
//! {
//!   "config": { "server_id": 1, "generation_id": 42, "replication_servers": ["rs11:8989"] },
//!   "my_state": ["0000000000000064000000000001"],
//!   "topology": {
//!     "ds_infos": [{ "ds_id": 2, "attached_rs_id": 11, "generation_id": 42 }],
//!     "rs_infos": [{ "rs_id": 11, "url": "rs11:8989", "generation_id": 42 }]
//!   },
//!   "attached_rs": 11
//! }
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use corelib::config::LocalConfig;
use corelib::node::ServerId;
use corelib::state::ServerState;
use corelib::topology::{Topology, TopologyBuilder, TopologyUpdate};
use serde::{Deserialize, Serialize};

/// One selection input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub config: LocalConfig,
    #[serde(default)]
    pub my_state: ServerState,
    pub topology: TopologyUpdate,
    /// RS the local DS is attached to, if any.
    #[serde(default)]
    pub attached_rs: Option<ServerId>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse scenario")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    /// Topology as the local DS would build it from this scenario.
    pub fn topology(&self) -> Topology {
        TopologyBuilder::from_config(&self.config)
            .attached_to(self.attached_rs)
            .build(&self.topology)
    }
}
