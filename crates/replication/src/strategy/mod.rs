//! Replication-server selection strategies.
//!
//! Two strategies share the candidate bookkeeping defined here:
//!
//! - **FreshnessSelector**: first contact, a cascade of [`CandidateFilter`]s
//!   followed by a load-based bootstrap pick
//! - **LoadBalancer**: while attached, decides whether the local DS must
//!   leave its replication server
//!
//! A filter narrows the candidate set only if it accepts at least one
//! candidate. When it accepts none the set is left untouched and the next
//! filter runs, so a filter can down-rank but never exclude everybody.

pub mod freshness;
pub mod load_balance;

pub use freshness::FreshnessSelector;
pub use load_balance::LoadBalancer;

use corelib::config::ValidConfig;
use corelib::node::{GenerationId, GroupId, ServerId};
use corelib::state::ServerState;
use corelib::topology::RsView;
use tracing::trace;

use crate::evaluation::{Evaluation, RsEvaluations, RsSelection};

/// Local values a selection is evaluated against.
#[derive(Clone, Copy, Debug)]
pub struct SelectionContext<'a> {
    pub local_ds: ServerId,
    pub group_id: GroupId,
    pub generation_id: GenerationId,
    pub my_state: &'a ServerState,
}

impl<'a> SelectionContext<'a> {
    pub fn new(config: &ValidConfig<'_>, my_state: &'a ServerState) -> Self {
        Self {
            local_ds: config.server_id(),
            group_id: config.group_id(),
            generation_id: config.generation_id(),
            my_state,
        }
    }
}

/// One stage of the candidate cascade.
///
/// # Thread Safety
///
/// Filters are stateless and shared freely across threads.
pub trait CandidateFilter: Send + Sync + 'static {
    /// Verdict for each candidate, in order: `None` keeps it, `Some(reason)`
    /// rejects it.
    fn verdicts(&self, ctx: &SelectionContext<'_>, candidates: &[&RsView]) -> Vec<Option<Evaluation>>;

    /// Filter name (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// Candidates still in the running plus the evaluations of those dropped.
#[derive(Clone, Debug)]
pub struct Candidates<'t> {
    // ascending RS id
    views: Vec<&'t RsView>,
    evaluations: RsEvaluations,
}

impl<'t> Candidates<'t> {
    pub fn new(views: impl IntoIterator<Item = &'t RsView>) -> Self {
        let mut views: Vec<&'t RsView> = views.into_iter().collect();
        views.sort_by_key(|rs| rs.id());
        views.dedup_by_key(|rs| rs.id());
        Self {
            views,
            evaluations: RsEvaluations::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn views(&self) -> &[&'t RsView] {
        &self.views
    }

    pub fn ids(&self) -> Vec<ServerId> {
        self.views.iter().map(|rs| rs.id()).collect()
    }

    pub fn contains(&self, rs_id: ServerId) -> bool {
        self.views.iter().any(|rs| rs.id() == rs_id)
    }

    /// Evaluations recorded so far, dropping the remaining candidates.
    pub fn into_evaluations(self) -> RsEvaluations {
        self.evaluations
    }

    /// Exactly one candidate left.
    pub fn found_best(&self) -> bool {
        self.views.len() == 1
    }

    /// Run `filter` and narrow to the accepted candidates if there are any.
    ///
    /// Returns `true` if some candidate was accepted.
    pub fn apply(&mut self, filter: &dyn CandidateFilter, ctx: &SelectionContext<'_>) -> bool {
        let verdicts = filter.verdicts(ctx, &self.views);
        debug_assert_eq!(verdicts.len(), self.views.len());

        if verdicts.iter().all(Option::is_some) {
            trace!(filter = filter.name(), candidates = ?self.ids(), "no candidate accepted, keeping all");
            return false;
        }

        let mut kept = Vec::with_capacity(self.views.len());
        for (view, verdict) in self.views.iter().zip(verdicts) {
            match verdict {
                None => kept.push(*view),
                Some(reason) => self.evaluations.reject(view.id(), reason),
            }
        }
        self.views = kept;
        trace!(filter = filter.name(), candidates = ?self.ids(), "filter applied");
        true
    }

    /// Keep only `best`; every other candidate gets `others`.
    pub fn set_best(&mut self, best: ServerId, others: Evaluation) {
        for view in &self.views {
            if view.id() != best {
                self.evaluations.set(view.id(), others);
            }
        }
        self.views.retain(|rs| rs.id() == best);
    }

    /// Selection result: the single survivor wins, anything else is no selection.
    pub fn into_selection(mut self) -> RsSelection {
        match self.views.as_slice() {
            [best] => {
                let best = best.id();
                self.evaluations.set(best, Evaluation::BestServer);
                RsSelection::new(Some(best), self.evaluations)
            }
            _ => RsSelection::new(None, self.evaluations),
        }
    }
}
