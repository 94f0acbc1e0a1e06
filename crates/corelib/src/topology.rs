//! Replication topology as seen by the local directory server.
//!
//! A [`Topology`] is rebuilt from scratch for every incoming update by a
//! [`TopologyBuilder`] and never mutated afterwards. Guarantees of every built
//! topology:
//!
//! - the local DS never appears among the peer DSs;
//! - when the local DS is attached to RS `r` and `r` is part of the topology,
//!   the local DS id is in `r`'s connected set (a DS never reports itself);
//! - an RS absent from the newest update is absent from the topology;
//! - the locally configured flag is recomputed from the configured addresses
//!   on every build.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LocalConfig;
use crate::network::ServerUrl;
use crate::node::{DsInfo, GenerationId, GroupId, RsInfo, ServerId};
use crate::state::ServerState;

/// Decoded topology announcement.
///
/// `ds_infos` is `None` when the announcement only refreshed replication
/// server data; the previously known peer DSs then stay in effect.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyUpdate {
    #[serde(default)]
    pub ds_infos: Option<Vec<DsInfo>>,
    #[serde(default)]
    pub rs_infos: Vec<RsInfo>,
}

impl TopologyUpdate {
    pub fn new(ds_infos: Vec<DsInfo>, rs_infos: Vec<RsInfo>) -> Self {
        Self {
            ds_infos: Some(ds_infos),
            rs_infos,
        }
    }

    /// Announcement carrying replication servers only.
    pub fn rs_only(rs_infos: Vec<RsInfo>) -> Self {
        Self {
            ds_infos: None,
            rs_infos,
        }
    }
}

/// A replication server plus what the local DS derived about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsView {
    info: RsInfo,
    url: String,
    connected_ds: BTreeSet<ServerId>,
    locally_configured: bool,
}

impl RsView {
    pub fn new(info: RsInfo, connected_ds: BTreeSet<ServerId>, locally_configured: bool) -> Self {
        let url = info.url.clone();
        Self {
            info,
            url,
            connected_ds,
            locally_configured,
        }
    }

    #[inline]
    pub fn id(&self) -> ServerId {
        self.info.rs_id
    }

    /// Snapshot as announced.
    pub fn info(&self) -> &RsInfo {
        &self.info
    }

    /// Address to connect to. Uses the locally configured spelling when the
    /// RS matched a configured address.
    pub fn url(&self) -> &str {
        &self.url
    }

    #[inline]
    pub fn weight(&self) -> u32 {
        self.info.weight
    }

    #[inline]
    pub fn group_id(&self) -> GroupId {
        self.info.group_id
    }

    #[inline]
    pub fn generation_id(&self) -> GenerationId {
        self.info.generation_id
    }

    pub fn server_state(&self) -> &ServerState {
        &self.info.server_state
    }

    /// DSs attached to this RS, ascending.
    pub fn connected_ds(&self) -> &BTreeSet<ServerId> {
        &self.connected_ds
    }

    #[inline]
    pub fn connected_ds_count(&self) -> usize {
        self.connected_ds.len()
    }

    #[inline]
    pub fn is_locally_configured(&self) -> bool {
        self.locally_configured
    }
}

/// Immutable topology snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    local_ds: ServerId,
    attached_rs: Option<ServerId>,
    peer_ds_by_id: BTreeMap<ServerId, DsInfo>,
    rs_by_id: BTreeMap<ServerId, RsView>,
}

impl Topology {
    /// Topology with no peers, used before the first update.
    pub fn empty(local_ds: ServerId) -> Self {
        Self {
            local_ds,
            attached_rs: None,
            peer_ds_by_id: BTreeMap::new(),
            rs_by_id: BTreeMap::new(),
        }
    }

    pub fn local_ds(&self) -> ServerId {
        self.local_ds
    }

    /// RS the local DS believed it was attached to when this snapshot was built.
    pub fn attached_rs(&self) -> Option<ServerId> {
        self.attached_rs
    }

    pub fn peer_ds(&self, ds_id: ServerId) -> Option<&DsInfo> {
        self.peer_ds_by_id.get(&ds_id)
    }

    pub fn peer_ds_iter(&self) -> impl Iterator<Item = &DsInfo> + '_ {
        self.peer_ds_by_id.values()
    }

    pub fn rs(&self, rs_id: ServerId) -> Option<&RsView> {
        self.rs_by_id.get(&rs_id)
    }

    /// Replication servers in ascending id order.
    pub fn rs_iter(&self) -> impl Iterator<Item = &RsView> + '_ {
        self.rs_by_id.values()
    }

    pub fn rs_ids(&self) -> impl Iterator<Item = ServerId> + '_ {
        self.rs_by_id.keys().copied()
    }

    pub fn rs_count(&self) -> usize {
        self.rs_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rs_by_id.is_empty()
    }

    /// One-line description for logs: `rs=[11{1,2} 12{}] peers=[2]`.
    pub fn summary(&self) -> String {
        let mut out = String::from("rs=[");
        for (i, rs) in self.rs_iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{}{{", rs.id());
            for (j, ds) in rs.connected_ds().iter().enumerate() {
                if j > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}", ds);
            }
            out.push('}');
        }
        out.push_str("] peers=[");
        for (i, ds) in self.peer_ds_by_id.keys().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}", ds);
        }
        out.push(']');
        out
    }
}

/// Builds [`Topology`] snapshots for one local DS.
///
/// # Example
///
/// ```rust
/// use corelib::node::{DsInfo, GenerationId, RsInfo, ServerId};
/// use corelib::topology::{TopologyBuilder, TopologyUpdate};
///
/// let update = TopologyUpdate::new(
///     vec![DsInfo::new(ServerId(2), ServerId(11), GenerationId(0))],
///     vec![RsInfo::new(ServerId(11), "rs1:8989", GenerationId(0))],
/// );
/// let topology = TopologyBuilder::new(ServerId(1))
///     .attached_to(Some(ServerId(11)))
///     .build(&update);
///
/// let rs = topology.rs(ServerId(11)).unwrap();
/// assert!(rs.connected_ds().contains(&ServerId(1)));
/// assert!(rs.connected_ds().contains(&ServerId(2)));
/// ```
#[derive(Clone, Debug)]
pub struct TopologyBuilder<'a> {
    local_ds: ServerId,
    attached_rs: Option<ServerId>,
    configured: Vec<(String, ServerUrl)>,
    previous: Option<&'a Topology>,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(local_ds: ServerId) -> Self {
        Self {
            local_ds,
            attached_rs: None,
            configured: Vec::new(),
            previous: None,
        }
    }

    /// Builder for the DS described by `config`, with its configured RS
    /// addresses. Unparsable addresses are skipped.
    pub fn from_config(config: &LocalConfig) -> Self {
        let mut builder = Self::new(config.server_id);
        for url in &config.replication_servers {
            builder = builder.locally_configured(url);
        }
        builder
    }

    /// Declare an RS address as locally configured.
    pub fn locally_configured(mut self, url: &str) -> Self {
        match ServerUrl::parse(url) {
            Ok(parsed) => self.configured.push((url.to_string(), parsed)),
            Err(err) => warn!(url, %err, "ignoring unparsable configured replication server"),
        }
        self
    }

    /// RS the local DS is currently attached to.
    pub fn attached_to(mut self, rs_id: Option<ServerId>) -> Self {
        self.attached_rs = rs_id;
        self
    }

    /// Topology the new one replaces; supplies peer DSs when an update omits them.
    pub fn previous(mut self, previous: &'a Topology) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Build a topology from `update`.
    ///
    /// Malformed or duplicate entries are dropped individually; building
    /// never fails.
    pub fn build(&self, update: &TopologyUpdate) -> Topology {
        let peer_ds_by_id = self.index_peer_ds(update);
        let rs_by_id = self.index_rs(&update.rs_infos, &peer_ds_by_id);

        if let Some(rs_id) = self.attached_rs {
            if !rs_by_id.contains_key(&rs_id) {
                debug!(local_ds = %self.local_ds, rs_id = %rs_id, "attached RS missing from topology update");
            }
        }

        Topology {
            local_ds: self.local_ds,
            attached_rs: self.attached_rs,
            peer_ds_by_id,
            rs_by_id,
        }
    }

    /// Rebuild `previous`'s content under this builder's settings, e.g. after
    /// the local attachment changed.
    pub fn rebuild(&self, previous: &Topology) -> Topology {
        let update = TopologyUpdate {
            ds_infos: Some(previous.peer_ds_iter().cloned().collect()),
            rs_infos: previous.rs_iter().map(|rs| rs.info().clone()).collect(),
        };
        self.build(&update)
    }

    fn index_peer_ds(&self, update: &TopologyUpdate) -> BTreeMap<ServerId, DsInfo> {
        let Some(ds_infos) = &update.ds_infos else {
            return self
                .previous
                .map(|prev| {
                    prev.peer_ds_by_id
                        .iter()
                        .filter(|(id, _)| **id != self.local_ds)
                        .map(|(id, ds)| (*id, ds.clone()))
                        .collect()
                })
                .unwrap_or_default();
        };

        let mut peers = BTreeMap::new();
        for ds in ds_infos {
            if ds.is_malformed() {
                warn!(?ds, "dropping malformed DS entry");
                continue;
            }
            if ds.ds_id == self.local_ds {
                continue;
            }
            if peers.contains_key(&ds.ds_id) {
                warn!(ds_id = %ds.ds_id, "dropping duplicate DS entry");
                continue;
            }
            peers.insert(ds.ds_id, ds.clone());
        }
        peers
    }

    fn index_rs(
        &self,
        rs_infos: &[RsInfo],
        peers: &BTreeMap<ServerId, DsInfo>,
    ) -> BTreeMap<ServerId, RsView> {
        let mut rs_by_id = BTreeMap::new();
        for info in rs_infos {
            if info.is_malformed() {
                warn!(?info, "dropping malformed RS entry");
                continue;
            }
            if rs_by_id.contains_key(&info.rs_id) {
                warn!(rs_id = %info.rs_id, "dropping duplicate RS entry");
                continue;
            }

            let mut connected_ds: BTreeSet<ServerId> = peers
                .values()
                .filter(|ds| ds.attached_rs_id == info.rs_id)
                .map(|ds| ds.ds_id)
                .collect();
            if self.attached_rs == Some(info.rs_id) {
                connected_ds.insert(self.local_ds);
            }

            let mut view = RsView::new(info.clone(), connected_ds, false);
            if let Some(configured) = self.match_configured(&info.url) {
                view.locally_configured = true;
                view.url = configured.to_string();
            }
            rs_by_id.insert(info.rs_id, view);
        }
        rs_by_id
    }

    fn match_configured(&self, url: &str) -> Option<&str> {
        let parsed = ServerUrl::parse(url).ok()?;
        self.configured
            .iter()
            .find(|(_, configured)| configured.is_equivalent_to(&parsed))
            .map(|(raw, _)| raw.as_str())
    }
}
