//! Freshness vectors.
//!
//! A [`ServerState`] records, for every origin server, the newest CSN seen
//! from it. It only ever moves forward: an update carrying an older or equal
//! CSN for an origin is ignored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::csn::Csn;
use crate::node::ServerId;

/// Per-origin map of the newest CSN seen.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Csn>", into = "Vec<Csn>")]
pub struct ServerState {
    // BTreeMap keeps iteration (and therefore Display/serde output) ordered by origin.
    csns: BTreeMap<ServerId, Csn>,
}

impl ServerState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `csn` if it is newer than what is held for its origin.
    ///
    /// Returns `true` if the state changed.
    pub fn update(&mut self, csn: Csn) -> bool {
        match self.csns.get(&csn.origin()) {
            Some(current) if !csn.is_newer_than(current) => false,
            _ => {
                self.csns.insert(csn.origin(), csn);
                true
            }
        }
    }

    /// Merge every entry of `other` into `self`, origin by origin.
    ///
    /// Returns `true` if any entry changed.
    pub fn update_all(&mut self, other: &ServerState) -> bool {
        let mut changed = false;
        for csn in other.iter() {
            changed |= self.update(*csn);
        }
        changed
    }

    /// Newest CSN seen from `origin`, if any.
    pub fn get(&self, origin: ServerId) -> Option<&Csn> {
        self.csns.get(&origin)
    }

    /// Newest CSN seen from `origin`, or [`Csn::zero`] when nothing was seen.
    pub fn csn_or_zero(&self, origin: ServerId) -> Csn {
        self.get(origin).copied().unwrap_or_else(|| Csn::zero(origin))
    }

    /// True if `self` has seen at least as much as `other` from every origin
    /// `other` knows about.
    pub fn covers(&self, other: &ServerState) -> bool {
        other.iter().all(|csn| self.covers_csn(csn))
    }

    /// True if `self` has seen `csn` or something newer from its origin.
    pub fn covers_csn(&self, csn: &Csn) -> bool {
        self.get(csn.origin())
            .map_or(false, |held| !held.is_older_than(csn))
    }

    pub fn is_empty(&self) -> bool {
        self.csns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.csns.len()
    }

    /// Entries in ascending origin order.
    pub fn iter(&self) -> impl Iterator<Item = &Csn> + '_ {
        self.csns.values()
    }

    /// Origins with an entry, ascending.
    pub fn origins(&self) -> impl Iterator<Item = ServerId> + '_ {
        self.csns.keys().copied()
    }
}

impl From<Vec<Csn>> for ServerState {
    fn from(csns: Vec<Csn>) -> Self {
        csns.into_iter().collect()
    }
}

impl From<ServerState> for Vec<Csn> {
    fn from(state: ServerState) -> Self {
        state.csns.into_values().collect()
    }
}

impl FromIterator<Csn> for ServerState {
    fn from_iter<I: IntoIterator<Item = Csn>>(iter: I) -> Self {
        let mut state = ServerState::new();
        for csn in iter {
            state.update(csn);
        }
        state
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, csn) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", csn)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
