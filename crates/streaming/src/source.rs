//! Transport seam for decoded topology updates.

use async_trait::async_trait;
use corelib::topology::TopologyUpdate;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::feed::TopologyFeed;

/// Async interface implemented by whatever decodes topology announcements.
#[async_trait]
pub trait TopologySource: Send {
    /// Next decoded update; `None` once the source is exhausted.
    async fn next_update(&mut self) -> Option<TopologyUpdate>;
}

/// Convenience trait-object alias for dynamic dispatch.
pub type DynTopologySource = Box<dyn TopologySource>;

/// Source fed through an in-process channel.
pub struct ChannelSource {
    rcv: mpsc::Receiver<TopologyUpdate>,
}

impl ChannelSource {
    /// Channel-backed source plus the sender feeding it.
    pub fn new(capacity: usize) -> (mpsc::Sender<TopologyUpdate>, Self) {
        let (snd, rcv) = mpsc::channel(capacity);
        (snd, Self { rcv })
    }
}

#[async_trait]
impl TopologySource for ChannelSource {
    async fn next_update(&mut self) -> Option<TopologyUpdate> {
        self.rcv.recv().await
    }
}

/// Apply every update from `source` to `feed` until the source ends.
///
/// Returns the number of updates applied.
pub async fn pump<S>(source: &mut S, feed: &TopologyFeed) -> usize
where
    S: TopologySource + ?Sized,
{
    let mut applied = 0;
    while let Some(update) = source.next_update().await {
        let topology = feed.apply(&update);
        applied += 1;
        debug!(rs_count = topology.rs_count(), "applied topology update");
    }
    info!(applied, "topology source closed");
    applied
}
