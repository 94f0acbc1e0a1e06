//! Replication-server selection.
//!
//! This crate decides which replication server the local directory server
//! should be attached to:
//! - First contact: freshness and consistency filters, then a load-based pick
//! - While attached: weighted load balancing that avoids reconnection yoyo
//! - An evaluation ledger explaining every candidate's outcome

pub mod error;
pub mod evaluation;
pub mod strategy;

pub use error::{Result, SelectionError};
pub use evaluation::{Evaluation, RsEvaluations, RsSelection};
pub use strategy::{CandidateFilter, FreshnessSelector, LoadBalancer, SelectionContext};

use corelib::config::LocalConfig;
use corelib::state::ServerState;
use corelib::topology::Topology;
use tracing::{debug, warn};

/// Select the replication server the local DS should use.
///
/// Without an attachment in `topology` this is a first-contact selection
/// over every known RS. With one, the local DS leaves an RS that no longer
/// matches its group or generation when another RS does; otherwise the load
/// balancer decides whether it stays. A result without a selected server then
/// means "disconnect and select again next cycle".
///
/// # Errors
///
/// Fails only if `config` does not pass [`LocalConfig::validate`].
pub fn select_replication_server(
    topology: &Topology,
    my_state: &ServerState,
    config: &LocalConfig,
) -> Result<RsSelection> {
    let config = config.validate()?;
    if topology.local_ds() != config.server_id() {
        warn!(
            topology_ds = %topology.local_ds(),
            config_ds = %config.server_id(),
            "topology was built for another local DS"
        );
    }

    let ctx = SelectionContext::new(&config, my_state);
    let selection = match topology.attached_rs() {
        None => FreshnessSelector.select(&ctx, topology.rs_iter()),
        Some(current) => FreshnessSelector
            .check_attached(&ctx, current, topology.rs_iter())
            .unwrap_or_else(|| LoadBalancer::reselect(topology, current, ctx.local_ds)),
    };

    debug!(
        local_ds = %ctx.local_ds,
        attached = ?topology.attached_rs(),
        selected = ?selection.selected(),
        topology = %topology.summary(),
        "replication server selection"
    );
    Ok(selection)
}
