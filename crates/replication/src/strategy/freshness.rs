//! First-contact selection.
//!
//! Used when the local DS is not attached to any replication server. The
//! candidates go through a cascade of filters, most important first:
//!
//! 1. locally configured and holding every change the local DS remembers making
//! 2. same group id as the local DS
//! 3. same generation id as the local DS
//! 4. holds every change the local DS remembers making
//! 5. locally configured
//! 6. holds the newest change made by the local DS
//!
//! Filters 4 and 6 only run if some candidate shares the local generation:
//! comparing change histories across generations is meaningless. Whatever
//! survives the cascade is handed to the load-based bootstrap pick.
//!
//! While attached, [`FreshnessSelector::check_attached`] re-runs the group and
//! generation filters so that a DS leaves an RS it no longer matches.

use corelib::csn::Csn;
use corelib::node::ServerId;
use corelib::topology::RsView;
use tracing::debug;

use super::{CandidateFilter, Candidates, LoadBalancer, SelectionContext};
use crate::evaluation::{Evaluation, RsSelection};

/// Newest change made by the local DS that `rs` has recorded.
fn local_change_on(rs: &RsView, ctx: &SelectionContext<'_>) -> Csn {
    rs.server_state().csn_or_zero(ctx.local_ds)
}

/// Newest change the local DS remembers making.
fn local_change(ctx: &SelectionContext<'_>) -> Csn {
    ctx.my_state.csn_or_zero(ctx.local_ds)
}

/// Keeps the locally configured candidates that are not behind the local DS.
pub struct LocalAndUpToDate;

impl CandidateFilter for LocalAndUpToDate {
    fn verdicts(&self, ctx: &SelectionContext<'_>, candidates: &[&RsView]) -> Vec<Option<Evaluation>> {
        let mine = local_change(ctx);
        candidates
            .iter()
            .map(|rs| {
                let accepted =
                    rs.is_locally_configured() && !local_change_on(rs, ctx).is_older_than(&mine);
                (!accepted).then_some(Evaluation::OnDifferentHost)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "LocalAndUpToDate"
    }
}

pub struct SameGroup;

impl CandidateFilter for SameGroup {
    fn verdicts(&self, ctx: &SelectionContext<'_>, candidates: &[&RsView]) -> Vec<Option<Evaluation>> {
        candidates
            .iter()
            .map(|rs| (rs.group_id() != ctx.group_id).then_some(Evaluation::DifferentGroupId))
            .collect()
    }

    fn name(&self) -> &'static str {
        "SameGroup"
    }
}

pub struct SameGeneration;

impl CandidateFilter for SameGeneration {
    fn verdicts(&self, ctx: &SelectionContext<'_>, candidates: &[&RsView]) -> Vec<Option<Evaluation>> {
        candidates
            .iter()
            .map(|rs| {
                (rs.generation_id() != ctx.generation_id).then_some(Evaluation::DifferentGenerationId)
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "SameGeneration"
    }
}

/// Rejects candidates missing changes the local DS made.
pub struct HasLocalChanges;

impl CandidateFilter for HasLocalChanges {
    fn verdicts(&self, ctx: &SelectionContext<'_>, candidates: &[&RsView]) -> Vec<Option<Evaluation>> {
        let mine = local_change(ctx);
        candidates
            .iter()
            .map(|rs| local_change_on(rs, ctx).is_older_than(&mine).then_some(Evaluation::BehindLocalDs))
            .collect()
    }

    fn name(&self) -> &'static str {
        "HasLocalChanges"
    }
}

pub struct LocallyConfigured;

impl CandidateFilter for LocallyConfigured {
    fn verdicts(&self, _: &SelectionContext<'_>, candidates: &[&RsView]) -> Vec<Option<Evaluation>> {
        candidates
            .iter()
            .map(|rs| (!rs.is_locally_configured()).then_some(Evaluation::OnDifferentHost))
            .collect()
    }

    fn name(&self) -> &'static str {
        "LocallyConfigured"
    }
}

/// Keeps the candidates holding the newest local-DS change.
///
/// An RS may know of local changes newer than the local DS itself does, e.g.
/// when the DS restarted before persisting its state.
pub struct LatestLocalChange;

impl CandidateFilter for LatestLocalChange {
    fn verdicts(&self, ctx: &SelectionContext<'_>, candidates: &[&RsView]) -> Vec<Option<Evaluation>> {
        let mine = local_change(ctx);
        let Some(latest) = candidates.iter().map(|rs| local_change_on(rs, ctx)).max() else {
            return Vec::new();
        };
        candidates
            .iter()
            .map(|rs| {
                let theirs = local_change_on(rs, ctx);
                if theirs == latest {
                    None
                } else if theirs.is_newer_than(&mine) {
                    Some(Evaluation::LaterButNotLatest)
                } else {
                    Some(Evaluation::MoreUpToDateElsewhere)
                }
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "LatestLocalChange"
    }
}

/// First-contact replication server selection.
///
/// # Example
///
/// ```rust
/// use corelib::node::{GenerationId, GroupId, RsInfo, ServerId};
/// use corelib::state::ServerState;
/// use corelib::topology::{TopologyBuilder, TopologyUpdate};
/// use replication::strategy::{FreshnessSelector, SelectionContext};
///
/// let update = TopologyUpdate::new(vec![], vec![RsInfo::new(ServerId(11), "rs:8989", GenerationId(7))]);
/// let topology = TopologyBuilder::new(ServerId(1)).build(&update);
/// let state = ServerState::new();
/// let ctx = SelectionContext {
///     local_ds: ServerId(1),
///     group_id: GroupId(1),
///     generation_id: GenerationId(7),
///     my_state: &state,
/// };
///
/// let selection = FreshnessSelector.select(&ctx, topology.rs_iter());
/// assert_eq!(selection.selected(), Some(ServerId(11)));
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct FreshnessSelector;

impl FreshnessSelector {
    pub fn select<'t>(
        &self,
        ctx: &SelectionContext<'_>,
        candidates: impl IntoIterator<Item = &'t RsView>,
    ) -> RsSelection {
        let mut candidates = Candidates::new(candidates);
        if candidates.is_empty() {
            debug!(local_ds = %ctx.local_ds, "no replication server to select from");
            return RsSelection::none();
        }
        if candidates.found_best() {
            return candidates.into_selection();
        }

        candidates.apply(&LocalAndUpToDate, ctx);
        candidates.apply(&SameGroup, ctx);
        let same_generation = candidates.apply(&SameGeneration, ctx);
        if same_generation {
            candidates.apply(&HasLocalChanges, ctx);
        }
        candidates.apply(&LocallyConfigured, ctx);
        if same_generation {
            candidates.apply(&LatestLocalChange, ctx);
        }

        if !candidates.found_best() {
            LoadBalancer::bootstrap(&mut candidates);
        }

        let selection = candidates.into_selection();
        debug!(
            local_ds = %ctx.local_ds,
            selected = ?selection.selected(),
            evaluations = ?selection.evaluations(),
            "first-contact selection"
        );
        selection
    }

    /// Group and generation check for a DS attached to `current`.
    ///
    /// Returns a result without selection when `current` fails the group or
    /// generation filter while another candidate passes it; `None` when the
    /// load balancer should decide.
    pub fn check_attached<'t>(
        &self,
        ctx: &SelectionContext<'_>,
        current: ServerId,
        candidates: impl IntoIterator<Item = &'t RsView>,
    ) -> Option<RsSelection> {
        let mut candidates = Candidates::new(candidates);
        if !candidates.contains(current) {
            return None;
        }
        candidates.apply(&SameGroup, ctx);
        candidates.apply(&SameGeneration, ctx);
        if candidates.contains(current) {
            return None;
        }

        debug!(
            local_ds = %ctx.local_ds,
            rs_id = %current,
            consistent = ?candidates.ids(),
            "current replication server no longer matches group or generation"
        );
        let mut evaluations = candidates.into_evaluations();
        evaluations.set(current, Evaluation::CurrentServerInconsistent);
        Some(RsSelection::new(None, evaluations))
    }
}
