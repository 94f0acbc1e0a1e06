//! Periodic replication server reselection.
//!
//! The [`Reselector`] re-runs selection on a timer and whenever the feed
//! publishes a new topology, and reports the resulting [`Decision`] to the
//! connection layer. It never changes the attachment itself: the connection
//! layer acts on the decision and then calls
//! [`TopologyFeed::set_attachment`](crate::feed::TopologyFeed::set_attachment).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use corelib::node::ServerId;
use corelib::state::ServerState;
use replication::{select_replication_server, RsSelection, SelectionError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StreamingError;
use crate::feed::TopologyFeed;
use crate::metrics::EVALUATIONS_TOTAL;

/// Default time between two evaluations without topology changes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// What the connection layer should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    /// Keep the session with this RS.
    Stay(ServerId),
    /// Not attached; open a session with this RS.
    Connect(ServerId),
    /// Close the session with this RS; the next evaluation picks a new one.
    Disconnect(ServerId),
    /// Not attached and nothing to connect to.
    NoSelection,
}

impl Decision {
    /// Interpret `selection` for a DS currently attached to `attached`.
    pub fn from_selection(attached: Option<ServerId>, selection: &RsSelection) -> Self {
        match (attached, selection.selected()) {
            (None, Some(rs_id)) => Decision::Connect(rs_id),
            (None, None) => Decision::NoSelection,
            (Some(current), Some(rs_id)) if current == rs_id => Decision::Stay(current),
            (Some(current), _) => Decision::Disconnect(current),
        }
    }

    /// Metric label.
    pub fn outcome(&self) -> &'static str {
        match self {
            Decision::Stay(_) => "stay",
            Decision::Connect(_) => "connect",
            Decision::Disconnect(_) => "disconnect",
            Decision::NoSelection => "none",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Stay(rs) => write!(f, "stay on {}", rs),
            Decision::Connect(rs) => write!(f, "connect to {}", rs),
            Decision::Disconnect(rs) => write!(f, "disconnect from {}", rs),
            Decision::NoSelection => f.write_str("no selection"),
        }
    }
}

/// A decision with the evaluations that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionEvent {
    pub decision: Decision,
    pub selection: RsSelection,
}

/// Repeats are suppressed, except disconnects, which stay pending until acted on.
fn should_emit(last: Option<&Decision>, next: &Decision) -> bool {
    matches!(next, Decision::Disconnect(_)) || last != Some(next)
}

/// Background task re-evaluating the replication server choice.
pub struct Reselector {
    feed: Arc<TopologyFeed>,
    my_state: watch::Receiver<ServerState>,
    interval: Duration,
    decisions: mpsc::Sender<DecisionEvent>,
    last: Option<Decision>,
}

impl Reselector {
    /// Reselector over `feed`, reading the local freshness vector from
    /// `my_state`. Decisions arrive on the returned receiver.
    ///
    /// # Errors
    ///
    /// Fails if the feed's configuration cannot be used for selection.
    pub fn new(
        feed: Arc<TopologyFeed>,
        my_state: watch::Receiver<ServerState>,
    ) -> Result<(Self, mpsc::Receiver<DecisionEvent>), StreamingError> {
        feed.config().validate().map_err(SelectionError::from)?;
        let (decisions, rcv) = mpsc::channel(16);
        let reselector = Self {
            feed,
            my_state,
            interval: DEFAULT_INTERVAL,
            decisions,
            last: None,
        };
        Ok((reselector, rcv))
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one selection against the latest snapshot.
    pub fn evaluate(&self) -> Result<DecisionEvent, StreamingError> {
        let topology = self.feed.snapshot();
        let my_state = self.my_state.borrow().clone();
        let selection = select_replication_server(&topology, &my_state, self.feed.config())?;
        let decision = Decision::from_selection(topology.attached_rs(), &selection);

        ::metrics::counter!(EVALUATIONS_TOTAL, "outcome" => decision.outcome()).increment(1);
        debug!(%decision, topology = %topology.summary(), "reselection");
        Ok(DecisionEvent {
            decision,
            selection,
        })
    }

    /// Spawn the reselector until `shutdown` is triggered or the decision
    /// receiver is dropped.
    pub fn spawn(mut self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            let mut topology = self.feed.reader();
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        info!("Reselector shutting down");
                        break;
                    }
                    _ = interval.tick() => {}
                    changed = topology.changed() => {
                        if changed.is_err() {
                            info!("Topology feed closed, reselector stopping");
                            break;
                        }
                    }
                }
                if !self.tick().await {
                    break;
                }
            }
        })
    }

    /// Returns `false` once nobody listens for decisions.
    async fn tick(&mut self) -> bool {
        let event = match self.evaluate() {
            Ok(event) => event,
            Err(err) => {
                warn!(%err, "replication server selection failed");
                return true;
            }
        };
        if !should_emit(self.last.as_ref(), &event.decision) {
            return true;
        }
        self.last = Some(event.decision);
        if self.decisions.send(event).await.is_err() {
            info!("Decision receiver dropped, reselector stopping");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::config::LocalConfig;
    use corelib::node::{DsInfo, GenerationId, RsInfo};
    use corelib::topology::TopologyUpdate;
    use replication::Evaluation;

    const GEN: GenerationId = GenerationId(0);

    fn feed() -> Arc<TopologyFeed> {
        let feed = TopologyFeed::new(LocalConfig::new(ServerId(1), GEN));
        feed.apply(&TopologyUpdate::new(
            vec![DsInfo::new(ServerId(2), ServerId(11), GEN)],
            vec![
                RsInfo::new(ServerId(11), "rs11:1", GEN),
                RsInfo::new(ServerId(12), "rs12:1", GEN),
            ],
        ));
        Arc::new(feed)
    }

    fn state() -> watch::Receiver<ServerState> {
        let (snd, rcv) = watch::channel(ServerState::new());
        // keep the value readable after the sender is gone
        drop(snd);
        rcv
    }

    #[test]
    fn test_should_emit() {
        let stay = Decision::Stay(ServerId(11));
        let leave = Decision::Disconnect(ServerId(11));
        assert!(should_emit(None, &stay));
        assert!(!should_emit(Some(&stay), &stay));
        assert!(should_emit(Some(&stay), &Decision::NoSelection));
        assert!(should_emit(Some(&leave), &leave));
    }

    #[test]
    fn test_from_selection() {
        let picked = RsSelection::new(Some(ServerId(12)), Default::default());
        let none = RsSelection::none();
        assert_eq!(Decision::from_selection(None, &picked), Decision::Connect(ServerId(12)));
        assert_eq!(Decision::from_selection(None, &none), Decision::NoSelection);
        assert_eq!(
            Decision::from_selection(Some(ServerId(12)), &picked),
            Decision::Stay(ServerId(12))
        );
        assert_eq!(
            Decision::from_selection(Some(ServerId(11)), &none),
            Decision::Disconnect(ServerId(11))
        );
    }

    #[tokio::test]
    async fn test_evaluate_follows_attachment() {
        let feed = feed();
        let (reselector, _rcv) = Reselector::new(Arc::clone(&feed), state()).unwrap();

        // RS 12 carries nobody yet
        let event = reselector.evaluate().unwrap();
        assert_eq!(event.decision, Decision::Connect(ServerId(12)));
        assert_eq!(event.selection.evaluation_for(ServerId(11)), Evaluation::LessLoadedElsewhere);

        feed.set_attachment(Some(ServerId(11)));
        let event = reselector.evaluate().unwrap();
        assert_eq!(event.decision, Decision::Disconnect(ServerId(11)));

        feed.set_attachment(Some(ServerId(12)));
        let event = reselector.evaluate().unwrap();
        assert_eq!(event.decision, Decision::Stay(ServerId(12)));
    }

    #[tokio::test]
    async fn test_invalid_config_refused() {
        let mut config = LocalConfig::new(ServerId(1), GEN);
        config.generation_id = None;
        let feed = Arc::new(TopologyFeed::new(config));
        assert!(matches!(
            Reselector::new(feed, state()),
            Err(StreamingError::Selection(_))
        ));
    }

    #[tokio::test]
    async fn test_spawned_reselector_reacts_to_publications() {
        let feed = feed();
        let (reselector, mut decisions) = Reselector::new(Arc::clone(&feed), state()).unwrap();
        let (shutdown_snd, shutdown) = watch::channel(false);
        let handle = reselector
            .with_interval(Duration::from_secs(3600))
            .spawn(shutdown);

        let first = decisions.recv().await.unwrap();
        assert_eq!(first.decision, Decision::Connect(ServerId(12)));

        feed.set_attachment(Some(ServerId(12)));
        let second = decisions.recv().await.unwrap();
        assert_eq!(second.decision, Decision::Stay(ServerId(12)));

        shutdown_snd.send(true).unwrap();
        handle.await.unwrap();
    }
}
