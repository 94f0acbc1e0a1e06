//! Single-writer topology publication.
//!
//! [`TopologyFeed`] is the only place a [`Topology`] is built. Every update is
//! turned into a new immutable snapshot and published through a
//! `tokio::sync::watch` channel, so readers always see a complete snapshot and
//! never a partially applied update.

use std::sync::Arc;

use corelib::config::LocalConfig;
use corelib::node::ServerId;
use corelib::topology::{Topology, TopologyBuilder, TopologyUpdate};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::StreamingError;
use crate::metrics::TOPOLOGY_RS_COUNT;

struct WriterState {
    attached_rs: Option<ServerId>,
    current: Arc<Topology>,
}

/// Writer side of the topology snapshot channel.
pub struct TopologyFeed {
    config: LocalConfig,
    // serializes build + publish so snapshots go out in build order
    writer: Mutex<WriterState>,
    snd: watch::Sender<Arc<Topology>>,
}

impl TopologyFeed {
    /// Feed for the local DS described by `config`, starting from an empty topology.
    pub fn new(config: LocalConfig) -> Self {
        let current = Arc::new(Topology::empty(config.server_id));
        let (snd, _) = watch::channel(Arc::clone(&current));
        Self {
            config,
            writer: Mutex::new(WriterState {
                attached_rs: None,
                current,
            }),
            snd,
        }
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    /// Build a snapshot from `update` and publish it.
    pub fn apply(&self, update: &TopologyUpdate) -> Arc<Topology> {
        let mut writer = self.writer.lock();
        let next = TopologyBuilder::from_config(&self.config)
            .attached_to(writer.attached_rs)
            .previous(&writer.current)
            .build(update);
        self.publish(&mut writer, next)
    }

    /// Record the RS the local DS is now attached to (or `None` after a
    /// disconnect) and republish the current topology accordingly.
    pub fn set_attachment(&self, rs_id: Option<ServerId>) -> Arc<Topology> {
        let mut writer = self.writer.lock();
        if writer.attached_rs == rs_id {
            return Arc::clone(&writer.current);
        }
        writer.attached_rs = rs_id;
        let next = TopologyBuilder::from_config(&self.config)
            .attached_to(rs_id)
            .rebuild(&writer.current);
        self.publish(&mut writer, next)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Topology> {
        self.snd.borrow().clone()
    }

    pub fn attached_rs(&self) -> Option<ServerId> {
        self.writer.lock().attached_rs
    }

    /// New reader positioned at the latest snapshot.
    pub fn reader(&self) -> TopologyReader {
        TopologyReader {
            rcv: self.snd.subscribe(),
        }
    }

    fn publish(&self, writer: &mut WriterState, next: Topology) -> Arc<Topology> {
        if *writer.current == next {
            return Arc::clone(&writer.current);
        }
        debug!(
            old = %writer.current.summary(),
            new = %next.summary(),
            "topology changed"
        );
        let next = Arc::new(next);
        writer.current = Arc::clone(&next);
        ::metrics::gauge!(TOPOLOGY_RS_COUNT).set(next.rs_count() as f64);
        // send_replace publishes even while nobody is subscribed
        self.snd.send_replace(Arc::clone(&next));
        next
    }
}

/// Read side of the topology snapshot channel. Cheap to clone.
#[derive(Clone)]
pub struct TopologyReader {
    rcv: watch::Receiver<Arc<Topology>>,
}

impl TopologyReader {
    pub fn snapshot(&self) -> Arc<Topology> {
        self.rcv.borrow().clone()
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> Result<Arc<Topology>, StreamingError> {
        self.rcv
            .changed()
            .await
            .map_err(|_| StreamingError::FeedClosed)?;
        Ok(self.rcv.borrow_and_update().clone())
    }
}
