//! Per-candidate evaluations produced by the selectors.
//!
//! Every replication server that took part in a selection ends up with one
//! [`Evaluation`] explaining why it won or why it was passed over. The ledger
//! is meant for logs and status reporting; selection itself never reads it
//! back.

use std::collections::BTreeMap;
use std::fmt;

use corelib::node::ServerId;
use serde::Serialize;

/// Why a replication server was or was not chosen.
///
/// First-contact rejections use `MoreUpToDateElsewhere`, `LaterButNotLatest`,
/// `DifferentGroupId`, `DifferentGenerationId` and `OnDifferentHost`, plus
/// `BehindLocalDs` for an RS missing changes the local DS made. Consumers
/// matching on the first five must handle `BehindLocalDs` too.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// Winner of a first-contact selection.
    BestServer,
    /// Not a candidate of the selection that produced the ledger.
    UnknownServer,
    /// Another RS holds more of the local DS's own changes.
    MoreUpToDateElsewhere,
    /// Holds newer local-DS changes than the local DS, but another RS holds newer still.
    LaterButNotLatest,
    DifferentGroupId,
    DifferentGenerationId,
    OnDifferentHost,
    /// Missing some of the changes the local DS made itself.
    BehindLocalDs,
    /// Another candidate is further below its target load.
    LessLoadedElsewhere,
    /// The local DS is among the DSs that must leave its overloaded RS.
    DisconnectFromOverloaded,
    /// The current RS is overloaded but other DSs leave first.
    StayOnOverloaded,
    /// The current RS is at or below its target load.
    AcceptableLoad,
    /// The current RS is overloaded by less than one DS.
    AvoidYoyo,
    /// The RS the local DS is attached to left the topology.
    CurrentServerGone,
    /// The RS the local DS is attached to no longer matches its group or
    /// generation while another RS does.
    CurrentServerInconsistent,
}

impl Evaluation {
    pub fn message(&self) -> &'static str {
        match self {
            Evaluation::BestServer => "best replication server",
            Evaluation::UnknownServer => "unknown replication server",
            Evaluation::MoreUpToDateElsewhere => "more up to date elsewhere",
            Evaluation::LaterButNotLatest => "later than local DS but not the latest",
            Evaluation::DifferentGroupId => "different group id",
            Evaluation::DifferentGenerationId => "different generation id",
            Evaluation::OnDifferentHost => "on a different host than the local DS",
            Evaluation::BehindLocalDs => "missing changes made by the local DS",
            Evaluation::LessLoadedElsewhere => "another replication server is less loaded",
            Evaluation::DisconnectFromOverloaded => {
                "local DS must disconnect from its overloaded replication server"
            }
            Evaluation::StayOnOverloaded => {
                "replication server overloaded but other DSs disconnect first"
            }
            Evaluation::AcceptableLoad => "replication server load is acceptable",
            Evaluation::AvoidYoyo => "moving would only shift the imbalance (yoyo)",
            Evaluation::CurrentServerGone => "current replication server left the topology",
            Evaluation::CurrentServerInconsistent => {
                "current replication server no longer matches the local group or generation"
            }
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Evaluations keyed by RS id, ascending.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RsEvaluations {
    by_rs: BTreeMap<ServerId, Evaluation>,
}

impl RsEvaluations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `evaluation` unless `rs_id` already has one. The first reason a
    /// candidate was dropped is the one reported.
    pub fn reject(&mut self, rs_id: ServerId, evaluation: Evaluation) {
        self.by_rs.entry(rs_id).or_insert(evaluation);
    }

    /// Record `evaluation`, replacing any earlier one.
    pub fn set(&mut self, rs_id: ServerId, evaluation: Evaluation) {
        self.by_rs.insert(rs_id, evaluation);
    }

    /// Evaluation of `rs_id`, [`Evaluation::UnknownServer`] if it never was a candidate.
    pub fn evaluation_for(&self, rs_id: ServerId) -> Evaluation {
        self.by_rs
            .get(&rs_id)
            .copied()
            .unwrap_or(Evaluation::UnknownServer)
    }

    pub fn contains(&self, rs_id: ServerId) -> bool {
        self.by_rs.contains_key(&rs_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ServerId, Evaluation)> + '_ {
        self.by_rs.iter().map(|(id, eval)| (*id, *eval))
    }

    pub fn len(&self) -> usize {
        self.by_rs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rs.is_empty()
    }
}

/// Outcome of one selection run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RsSelection {
    selected: Option<ServerId>,
    evaluations: RsEvaluations,
}

impl RsSelection {
    pub fn new(selected: Option<ServerId>, evaluations: RsEvaluations) -> Self {
        Self {
            selected,
            evaluations,
        }
    }

    /// Selection with no winner and no evaluations.
    pub fn none() -> Self {
        Self::new(None, RsEvaluations::new())
    }

    /// RS to connect to or stay on; `None` means no selection.
    pub fn selected(&self) -> Option<ServerId> {
        self.selected
    }

    pub fn is_none(&self) -> bool {
        self.selected.is_none()
    }

    pub fn evaluations(&self) -> &RsEvaluations {
        &self.evaluations
    }

    pub fn evaluation_for(&self, rs_id: ServerId) -> Evaluation {
        self.evaluations.evaluation_for(rs_id)
    }

    /// Every evaluated RS other than the selected one.
    pub fn rejections(&self) -> impl Iterator<Item = (ServerId, Evaluation)> + '_ {
        let selected = self.selected;
        self.evaluations
            .iter()
            .filter(move |(id, _)| Some(*id) != selected)
    }
}
