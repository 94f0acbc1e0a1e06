//! Metric names recorded by the streaming layer.
//!
//! Only the `metrics` facade is used; installing a recorder/exporter is up to
//! the embedding process.

use ::metrics::{describe_counter, describe_gauge};

/// Reselection evaluations, labelled by `outcome`.
pub const EVALUATIONS_TOTAL: &str = "rs_selection_evaluations_total";

/// Replication servers in the latest published topology.
pub const TOPOLOGY_RS_COUNT: &str = "rs_selection_topology_rs_count";

/// Register descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        EVALUATIONS_TOTAL,
        "Replication server evaluations by outcome (stay, connect, disconnect, none)"
    );
    describe_gauge!(
        TOPOLOGY_RS_COUNT,
        "Replication servers in the latest published topology"
    );
}
