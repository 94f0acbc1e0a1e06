//! Weighted load balancing between replication servers.
//!
//! Each RS should carry a share of all DS attachments proportional to its
//! weight. With `W` the total weight and `D` the total number of attached DSs,
//! the target of an RS of weight `w` is `w * D / W`.
//!
//! # Algorithm
//!
//! While attached, the local DS computes `excess = floor(actual - target)` for
//! its current RS:
//!
//! 1. `excess < 1`: stay. A sub-unit imbalance cannot be corrected by moving
//!    a whole DS; moving would only shift it to another RS and back (yoyo).
//! 2. Otherwise the `excess` lowest DS ids attached to the RS must leave. If
//!    the local DS is one of them it disconnects without picking a
//!    destination; the next first-contact selection does that.
//!
//! Every DS on the RS computes the same set from the same snapshot, so no
//! more than `excess` DSs leave in one round without any coordination.
//!
//! All arithmetic is exact: values are scaled by `W` and kept in `i128`.

use corelib::node::ServerId;
use corelib::topology::{RsView, Topology};
use tracing::debug;

use super::Candidates;
use crate::evaluation::{Evaluation, RsEvaluations, RsSelection};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LoadRow {
    rs_id: ServerId,
    weight: i128,
    actual: i128,
}

/// Load figures for a set of replication servers.
#[derive(Clone, Debug)]
struct LoadSheet {
    // ascending RS id
    rows: Vec<LoadRow>,
    total_weight: i128,
    total_ds: i128,
}

impl LoadSheet {
    fn new<'a>(views: impl IntoIterator<Item = &'a RsView>) -> Self {
        let mut rows: Vec<LoadRow> = views
            .into_iter()
            .map(|rs| LoadRow {
                rs_id: rs.id(),
                weight: i128::from(rs.weight()),
                actual: rs.connected_ds_count() as i128,
            })
            .collect();
        rows.sort_by_key(|row| row.rs_id);

        let mut total_weight: i128 = rows.iter().map(|row| row.weight).sum();
        if total_weight == 0 {
            // no configured weights at all: share evenly
            for row in &mut rows {
                row.weight = 1;
            }
            total_weight = rows.len() as i128;
        }
        let total_ds = rows.iter().map(|row| row.actual).sum();

        Self {
            rows,
            total_weight,
            total_ds,
        }
    }

    fn row(&self, rs_id: ServerId) -> Option<&LoadRow> {
        self.rows.iter().find(|row| row.rs_id == rs_id)
    }

    /// `(target - actual) * W`.
    fn deficit(&self, row: &LoadRow) -> i128 {
        row.weight * self.total_ds - row.actual * self.total_weight
    }

    /// `floor(actual - target)`.
    fn excess(&self, row: &LoadRow) -> i128 {
        if self.total_weight == 0 {
            return 0;
        }
        (-self.deficit(row)).div_euclid(self.total_weight)
    }

    /// RS furthest below its target, ties to the lowest id. When every RS
    /// sits exactly on target the heaviest one wins.
    fn least_loaded(&self) -> Option<ServerId> {
        let mut best: Option<(&LoadRow, i128)> = None;
        let mut all_on_target = true;
        for row in &self.rows {
            let deficit = self.deficit(row);
            all_on_target &= deficit == 0;
            if best.map_or(true, |(_, d)| deficit > d) {
                best = Some((row, deficit));
            }
        }

        if all_on_target {
            let mut heaviest: Option<&LoadRow> = None;
            for row in &self.rows {
                if heaviest.map_or(true, |h| row.weight > h.weight) {
                    heaviest = Some(row);
                }
            }
            return heaviest.map(|row| row.rs_id);
        }
        best.map(|(row, _)| row.rs_id)
    }
}

/// Weighted, hysteresis-aware replication server balancing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadBalancer;

impl LoadBalancer {
    /// Pick among first-contact survivors by load only.
    ///
    /// Weights and attachment counts are taken over the candidates alone.
    pub fn bootstrap(candidates: &mut Candidates<'_>) {
        let sheet = LoadSheet::new(candidates.views().iter().copied());
        if let Some(best) = sheet.least_loaded() {
            debug!(rs_id = %best, "bootstrap pick by load");
            candidates.set_best(best, Evaluation::LessLoadedElsewhere);
        }
    }

    /// Decide whether `local_ds`, attached to `current`, stays or disconnects.
    ///
    /// Loads are computed over the whole topology. The result selects
    /// `current` (stay) or nothing (disconnect, or `current` is gone).
    pub fn reselect(topology: &Topology, current: ServerId, local_ds: ServerId) -> RsSelection {
        let sheet = LoadSheet::new(topology.rs_iter());
        let mut evaluations = RsEvaluations::new();

        let (Some(row), Some(view)) = (sheet.row(current), topology.rs(current)) else {
            debug!(%local_ds, rs_id = %current, "current replication server left the topology");
            evaluations.set(current, Evaluation::CurrentServerGone);
            return RsSelection::new(None, evaluations);
        };

        let excess = sheet.excess(row);
        let evaluation = if excess < 1 {
            if sheet.deficit(row) < 0 {
                Evaluation::AvoidYoyo
            } else {
                Evaluation::AcceptableLoad
            }
        } else {
            let movers = usize::try_from(excess).unwrap_or(usize::MAX);
            let must_move = view.connected_ds().iter().take(movers).any(|ds| *ds == local_ds);
            if must_move {
                Evaluation::DisconnectFromOverloaded
            } else {
                Evaluation::StayOnOverloaded
            }
        };

        for row in &sheet.rows {
            evaluations.set(row.rs_id, evaluation);
        }
        let selected = (evaluation != Evaluation::DisconnectFromOverloaded).then_some(current);

        debug!(
            %local_ds,
            rs_id = %current,
            actual = %row.actual,
            excess = %excess,
            %evaluation,
            "load balancing evaluation"
        );
        RsSelection::new(selected, evaluations)
    }
}
