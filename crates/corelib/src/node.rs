//! Peer snapshots received in topology updates.
//!
//! Directory servers (DS) and replication servers (RS) share one id space:
//! a DS id doubles as the origin id stamped on the CSNs of the changes it
//! makes. Snapshots are plain values; a new topology update replaces them
//! wholesale.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::ServerState;

/// Identifier of a DS or RS in the replication topology.
///
/// Newtype over `u16`, the width of the origin id inside a CSN.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub u16);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replication group. Servers prefer peers of their own group.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u8);

impl GroupId {
    /// Group servers belong to when none is configured.
    pub const DEFAULT: GroupId = GroupId(1);
}

impl Default for GroupId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fingerprint of the replicated data set. Servers holding different
/// generations cannot exchange changes safely.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(pub u64);

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replication status a DS reports for itself.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    NotConnected,
    #[default]
    Normal,
    Degraded,
    FullUpdate,
    BadGenId,
}

/// Assured replication flavour requested by a DS.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssuredMode {
    #[default]
    SafeData,
    SafeRead,
}

/// Snapshot of a peer directory server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsInfo {
    pub ds_id: ServerId,
    /// RS the DS reports being connected to.
    pub attached_rs_id: ServerId,
    pub generation_id: GenerationId,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub assured: bool,
    #[serde(default)]
    pub assured_mode: AssuredMode,
    #[serde(default)]
    pub safe_data_level: u8,
    #[serde(default)]
    pub group_id: GroupId,
    #[serde(default)]
    pub referral_urls: Vec<String>,
    #[serde(default)]
    pub ecl_includes: BTreeSet<String>,
    #[serde(default)]
    pub protocol_version: u16,
}

impl DsInfo {
    /// DS snapshot with default status, group and assured settings.
    pub fn new(ds_id: ServerId, attached_rs_id: ServerId, generation_id: GenerationId) -> Self {
        Self {
            ds_id,
            attached_rs_id,
            generation_id,
            status: ServerStatus::default(),
            assured: false,
            assured_mode: AssuredMode::default(),
            safe_data_level: 0,
            group_id: GroupId::DEFAULT,
            referral_urls: Vec::new(),
            ecl_includes: BTreeSet::new(),
            protocol_version: 0,
        }
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = group_id;
        self
    }

    /// A snapshot the builder cannot use at all.
    pub fn is_malformed(&self) -> bool {
        self.ds_id.0 == 0
    }
}

/// Snapshot of a replication server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsInfo {
    pub rs_id: ServerId,
    /// `host:port` address the RS listens on.
    pub url: String,
    pub generation_id: GenerationId,
    #[serde(default)]
    pub group_id: GroupId,
    /// Configured share of DS connections. Non-negative by construction.
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Advertised freshness vector.
    #[serde(default)]
    pub server_state: ServerState,
}

fn default_weight() -> u32 {
    1
}

impl RsInfo {
    /// RS snapshot with default group, weight 1 and an empty freshness vector.
    pub fn new(rs_id: ServerId, url: impl Into<String>, generation_id: GenerationId) -> Self {
        Self {
            rs_id,
            url: url.into(),
            generation_id,
            group_id: GroupId::DEFAULT,
            weight: default_weight(),
            server_state: ServerState::new(),
        }
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_state(mut self, server_state: ServerState) -> Self {
        self.server_state = server_state;
        self
    }

    /// A snapshot the builder cannot use at all.
    pub fn is_malformed(&self) -> bool {
        self.rs_id.0 == 0
    }
}
