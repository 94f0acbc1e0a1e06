//! Integration tests for replication server selection.
//!
//! # Test Strategy
//!
//! 1. **First contact**: freshness, group, generation and locality filters
//! 2. **Bootstrap**: load-based pick among equally fresh candidates
//! 3. **While attached**: stay / disconnect decisions of the load balancer
//! 4. **Coordination**: only the N lowest DS ids leave an overloaded RS
//! 5. **Preconditions**: invalid configuration is refused

use corelib::csn::Csn;
use corelib::node::{DsInfo, GenerationId, GroupId, RsInfo, ServerId};
use corelib::state::ServerState;
use corelib::topology::{Topology, TopologyBuilder, TopologyUpdate};
use corelib::{ConfigError, LocalConfig};
use replication::{select_replication_server, Evaluation, RsSelection, SelectionError};

const GEN: GenerationId = GenerationId(0);
const ME: u16 = 1;

fn state(local_ts: Option<u64>) -> ServerState {
    local_ts
        .map(|ts| Csn::new(ts, 0, ServerId(ME)))
        .into_iter()
        .collect()
}

/// RS on a remote host holding local-DS changes up to `local_ts`.
fn fresh_rs(id: u16, local_ts: Option<u64>) -> RsInfo {
    RsInfo::new(ServerId(id), format!("host{}:{}", id, 8000 + id), GEN).with_state(state(local_ts))
}

fn config() -> LocalConfig {
    LocalConfig::new(ServerId(ME), GEN)
}

fn first_contact(rs: Vec<RsInfo>, my_ts: Option<u64>, config: &LocalConfig) -> RsSelection {
    let topology = TopologyBuilder::from_config(config).build(&TopologyUpdate::new(vec![], rs));
    select_replication_server(&topology, &state(my_ts), config).unwrap()
}

/// Topology where `rs` lists `(id, weight, attached DS ids)`. The local DS is
/// `local` and attached to `current`.
fn weighted(local: u16, current: Option<u16>, rs: &[(u16, u32, &[u16])]) -> Topology {
    let mut ds_infos = Vec::new();
    let mut rs_infos = Vec::new();
    for (rs_id, weight, attached) in rs {
        rs_infos.push(RsInfo::new(ServerId(*rs_id), format!("rs{}:1", rs_id), GEN).with_weight(*weight));
        for ds in attached.iter().filter(|ds| **ds != local) {
            ds_infos.push(DsInfo::new(ServerId(*ds), ServerId(*rs_id), GEN));
        }
    }
    TopologyBuilder::new(ServerId(local))
        .attached_to(current.map(ServerId))
        .build(&TopologyUpdate::new(ds_infos, rs_infos))
}

fn select_weighted(local: u16, current: Option<u16>, rs: &[(u16, u32, &[u16])]) -> RsSelection {
    let topology = weighted(local, current, rs);
    let config = LocalConfig::new(ServerId(local), GEN);
    select_replication_server(&topology, &ServerState::new(), &config).unwrap()
}

// ============================================================================
// First Contact
// ============================================================================

#[test]
fn test_single_candidate_wins_without_reasons() {
    let selection = first_contact(vec![fresh_rs(11, None)], None, &config());
    assert_eq!(selection.selected(), Some(ServerId(11)));
    assert_eq!(selection.rejections().count(), 0);
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::BestServer);
}

#[test]
fn test_single_late_candidate_still_wins() {
    let selection = first_contact(vec![fresh_rs(11, Some(0))], Some(1), &config());
    assert_eq!(selection.selected(), Some(ServerId(11)));
    assert_eq!(selection.rejections().count(), 0);
}

#[test]
fn test_no_candidates() {
    let selection = first_contact(vec![], Some(1), &config());
    assert!(selection.is_none());
    assert!(selection.evaluations().is_empty());
}

#[test]
fn test_more_up_to_date_elsewhere() {
    let selection = first_contact(vec![fresh_rs(11, Some(1)), fresh_rs(12, Some(2))], Some(1), &config());
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::MoreUpToDateElsewhere);
}

#[test]
fn test_later_but_not_latest() {
    let selection = first_contact(
        vec![fresh_rs(11, Some(1)), fresh_rs(12, Some(2)), fresh_rs(13, Some(3))],
        Some(1),
        &config(),
    );
    assert_eq!(selection.selected(), Some(ServerId(13)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::MoreUpToDateElsewhere);
    assert_eq!(selection.evaluation_for(ServerId(12)), Evaluation::LaterButNotLatest);
}

#[test]
fn test_group_beats_freshness() {
    let selection = first_contact(
        vec![
            fresh_rs(11, Some(1)),
            fresh_rs(12, Some(2)).with_group(GroupId(2)),
            fresh_rs(13, Some(3)),
        ],
        Some(1),
        &config(),
    );
    assert_eq!(selection.selected(), Some(ServerId(13)));
    assert_eq!(selection.evaluation_for(ServerId(12)), Evaluation::DifferentGroupId);
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::MoreUpToDateElsewhere);
}

#[test]
fn test_other_group_still_eligible() {
    let selection = first_contact(
        vec![
            fresh_rs(11, Some(1)).with_group(GroupId(2)),
            fresh_rs(12, Some(2)).with_group(GroupId(2)),
        ],
        Some(1),
        &config(),
    );
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::MoreUpToDateElsewhere);
}

#[test]
fn test_group_ranks_above_generation() {
    // 12 has the right group but the wrong generation, 11 the reverse
    let mut wrong_group = fresh_rs(11, Some(4)).with_group(GroupId(2));
    wrong_group.generation_id = GEN;
    let mut wrong_generation = fresh_rs(12, Some(1));
    wrong_generation.generation_id = GenerationId(9);
    let mut both_wrong = fresh_rs(13, Some(4)).with_group(GroupId(3));
    both_wrong.generation_id = GenerationId(9);

    let selection = first_contact(vec![wrong_group, wrong_generation, both_wrong], Some(4), &config());
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::DifferentGroupId);
    assert_eq!(selection.evaluation_for(ServerId(13)), Evaluation::DifferentGroupId);
}

#[test]
fn test_generation_filter() {
    let mut stale = fresh_rs(11, Some(9));
    stale.generation_id = GenerationId(7);
    let selection = first_contact(vec![stale, fresh_rs(12, Some(1))], Some(4), &config());
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::DifferentGenerationId);
}

#[test]
fn test_locally_configured_preferred_when_up_to_date() {
    let config = config().with_replication_server("host12:8012");
    let selection = first_contact(
        vec![fresh_rs(11, Some(4)), fresh_rs(12, Some(4)), fresh_rs(13, Some(4))],
        Some(4),
        &config,
    );
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::OnDifferentHost);
    assert_eq!(selection.evaluation_for(ServerId(13)), Evaluation::OnDifferentHost);
}

#[test]
fn test_up_to_date_remote_beats_late_local() {
    let config = config().with_replication_server("host11:8011");
    let selection = first_contact(
        vec![fresh_rs(11, Some(3)), fresh_rs(12, Some(4)), fresh_rs(13, Some(3))],
        Some(4),
        &config,
    );
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::BehindLocalDs);
    assert_eq!(selection.evaluation_for(ServerId(13)), Evaluation::BehindLocalDs);
}

#[test]
fn test_local_wins_when_everybody_is_late() {
    let config = config().with_replication_server("host12:8012");
    let selection = first_contact(
        vec![fresh_rs(11, Some(2)), fresh_rs(12, Some(3)), fresh_rs(13, Some(3))],
        Some(4),
        &config,
    );
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::OnDifferentHost);
}

#[test]
fn test_up_to_date_local_beats_matching_remote() {
    let config = config().with_replication_server("host11:8011");

    let other_group = first_contact(
        vec![fresh_rs(11, Some(4)).with_group(GroupId(2)), fresh_rs(12, Some(4))],
        Some(4),
        &config,
    );
    assert_eq!(other_group.selected(), Some(ServerId(11)));
    assert_eq!(other_group.evaluation_for(ServerId(12)), Evaluation::OnDifferentHost);

    let mut other_generation = fresh_rs(11, Some(4));
    other_generation.generation_id = GenerationId(9);
    let selection = first_contact(vec![other_generation, fresh_rs(12, Some(4))], Some(4), &config);
    assert_eq!(selection.selected(), Some(ServerId(11)));
    assert_eq!(selection.evaluation_for(ServerId(12)), Evaluation::OnDifferentHost);
}

#[test]
fn test_group_decides_among_local_servers() {
    let config = config()
        .with_replication_server("host11:8011")
        .with_replication_server("host12:8012");
    let selection = first_contact(
        vec![
            fresh_rs(11, Some(4)).with_group(GroupId(2)),
            fresh_rs(12, Some(4)),
            fresh_rs(13, Some(9)),
        ],
        Some(4),
        &config,
    );
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::DifferentGroupId);
    assert_eq!(selection.evaluation_for(ServerId(13)), Evaluation::OnDifferentHost);
}

#[test]
fn test_rs_ahead_of_local_ds_is_chosen() {
    let selection = first_contact(
        vec![fresh_rs(11, Some(4)), fresh_rs(12, Some(5)), fresh_rs(13, Some(4))],
        Some(4),
        &config(),
    );
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::MoreUpToDateElsewhere);
    assert_eq!(selection.evaluation_for(ServerId(13)), Evaluation::MoreUpToDateElsewhere);
}

// ============================================================================
// Bootstrap
// ============================================================================

#[test]
fn test_bootstrap_ties_go_to_lowest_id() {
    let selection = select_weighted(ME, None, &[(12, 1, &[]), (11, 1, &[])]);
    assert_eq!(selection.selected(), Some(ServerId(11)));
    assert_eq!(selection.evaluation_for(ServerId(12)), Evaluation::LessLoadedElsewhere);
}

#[test]
fn test_bootstrap_greatest_deficit() {
    let selection = select_weighted(ME, None, &[(11, 1, &[2]), (12, 1, &[])]);
    assert_eq!(selection.selected(), Some(ServerId(12)));

    let selection = select_weighted(ME, None, &[(11, 1, &[2, 3]), (12, 1, &[101])]);
    assert_eq!(selection.selected(), Some(ServerId(12)));

    let selection = select_weighted(ME, None, &[(11, 1, &[2]), (12, 2, &[101])]);
    assert_eq!(selection.selected(), Some(ServerId(12)));

    let selection = select_weighted(
        ME,
        None,
        &[(11, 5, &[2, 3, 4]), (12, 3, &[101, 102, 103, 104, 105]), (13, 2, &[201])],
    );
    assert_eq!(selection.selected(), Some(ServerId(11)));
}

#[test]
fn test_bootstrap_balanced_prefers_heaviest() {
    let selection = select_weighted(ME, None, &[(11, 1, &[2]), (12, 1, &[101])]);
    assert_eq!(selection.selected(), Some(ServerId(11)));

    let selection = select_weighted(ME, None, &[(11, 1, &[2]), (12, 2, &[101, 102])]);
    assert_eq!(selection.selected(), Some(ServerId(12)));

    let selection = select_weighted(
        ME,
        None,
        &[(11, 1, &[2]), (12, 2, &[101, 102]), (13, 3, &[201, 202, 203])],
    );
    assert_eq!(selection.selected(), Some(ServerId(13)));
}

// ============================================================================
// While Attached
// ============================================================================

#[test]
fn test_two_on_one_rs_lowest_id_moves() {
    let rs: &[(u16, u32, &[u16])] = &[(11, 1, &[1, 2]), (12, 1, &[])];

    let selection = select_weighted(1, Some(11), rs);
    assert!(selection.is_none());
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::DisconnectFromOverloaded);

    let selection = select_weighted(2, Some(11), rs);
    assert_eq!(selection.selected(), Some(ServerId(11)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::StayOnOverloaded);
}

#[test]
fn test_balanced_load_stays() {
    let selection = select_weighted(101, Some(12), &[(11, 1, &[1]), (12, 1, &[101])]);
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(12)), Evaluation::AcceptableLoad);
}

#[test]
fn test_exact_target_stays() {
    // W = 10, D = 20: the weight-4 RS targets exactly 8
    let selection = select_weighted(
        101,
        Some(12),
        &[
            (11, 3, &[1, 2, 3, 4]),
            (12, 4, &[101, 102, 103, 104, 105, 106, 107, 108]),
            (13, 1, &[201, 202]),
            (14, 2, &[301, 302, 303, 304, 305, 306]),
        ],
    );
    assert_eq!(selection.selected(), Some(ServerId(12)));
    assert_eq!(selection.evaluation_for(ServerId(12)), Evaluation::AcceptableLoad);
}

#[test]
fn test_sub_unit_imbalance_never_moves() {
    // weight 1 of 3, 2 DSs of 4 attached: target 4/3, excess 2/3
    let rs: &[(u16, u32, &[u16])] = &[(11, 1, &[1, 2]), (12, 1, &[3]), (13, 1, &[4])];
    for local in [1, 2] {
        let selection = select_weighted(local, Some(11), rs);
        assert_eq!(selection.selected(), Some(ServerId(11)), "DS {local} must stay");
        assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::AvoidYoyo);
    }

    let rs: &[(u16, u32, &[u16])] = &[(11, 1, &[1, 2]), (12, 1, &[3])];
    for local in [1, 2] {
        let selection = select_weighted(local, Some(11), rs);
        assert_eq!(selection.selected(), Some(ServerId(11)), "DS {local} must stay");
    }

    let rs: &[(u16, u32, &[u16])] = &[(11, 1, &[1, 2, 3]), (12, 1, &[4, 5]), (13, 1, &[6, 7])];
    let selection = select_weighted(1, Some(11), rs);
    assert_eq!(selection.selected(), Some(ServerId(11)));
}

#[test]
fn test_underloaded_rs_empty_elsewhere() {
    let rs: &[(u16, u32, &[u16])] = &[(11, 1, &[1, 2]), (12, 1, &[3]), (13, 1, &[])];
    assert!(select_weighted(1, Some(11), rs).is_none());
    assert_eq!(select_weighted(2, Some(11), rs).selected(), Some(ServerId(11)));
    assert_eq!(select_weighted(3, Some(12), rs).selected(), Some(ServerId(12)));
}

#[test]
fn test_leaves_rs_of_another_generation() {
    let update = TopologyUpdate::new(
        vec![DsInfo::new(ServerId(2), ServerId(12), GEN)],
        vec![
            RsInfo::new(ServerId(11), "rs11:1", GenerationId(9)),
            RsInfo::new(ServerId(12), "rs12:1", GEN),
        ],
    );
    let topology = TopologyBuilder::from_config(&config())
        .attached_to(Some(ServerId(11)))
        .build(&update);

    // load alone would keep DS 1 on 11
    let selection = select_replication_server(&topology, &ServerState::new(), &config()).unwrap();
    assert!(selection.is_none());
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::CurrentServerInconsistent);
}

#[test]
fn test_leaves_rs_of_another_group() {
    let update = TopologyUpdate::new(
        vec![],
        vec![
            RsInfo::new(ServerId(11), "rs11:1", GEN).with_group(GroupId(2)),
            RsInfo::new(ServerId(12), "rs12:1", GEN),
        ],
    );
    let topology = TopologyBuilder::from_config(&config())
        .attached_to(Some(ServerId(11)))
        .build(&update);

    let selection = select_replication_server(&topology, &ServerState::new(), &config()).unwrap();
    assert!(selection.is_none());
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::CurrentServerInconsistent);
}

#[test]
fn test_stays_when_no_rs_matches_generation() {
    let update = TopologyUpdate::new(
        vec![
            DsInfo::new(ServerId(2), ServerId(12), GEN),
            DsInfo::new(ServerId(3), ServerId(12), GEN),
        ],
        vec![
            RsInfo::new(ServerId(11), "rs11:1", GenerationId(9)),
            RsInfo::new(ServerId(12), "rs12:1", GenerationId(9)),
        ],
    );
    let topology = TopologyBuilder::from_config(&config())
        .attached_to(Some(ServerId(11)))
        .build(&update);

    let selection = select_replication_server(&topology, &ServerState::new(), &config()).unwrap();
    assert_eq!(selection.selected(), Some(ServerId(11)));
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::AcceptableLoad);
}

#[test]
fn test_current_rs_gone() {
    let first = weighted(1, Some(11), &[(11, 1, &[1]), (12, 1, &[])]);
    let topology = TopologyBuilder::new(ServerId(1))
        .attached_to(Some(ServerId(11)))
        .previous(&first)
        .build(&TopologyUpdate::new(vec![], vec![RsInfo::new(ServerId(12), "rs12:1", GEN)]));

    let selection = select_replication_server(&topology, &ServerState::new(), &config()).unwrap();
    assert!(selection.is_none());
    assert_eq!(selection.evaluation_for(ServerId(11)), Evaluation::CurrentServerGone);
}

// ============================================================================
// Coordination
// ============================================================================

#[test]
fn test_only_lowest_ids_leave() {
    // weight 2 of 10, 6 of 20 DSs attached: target 4, excess 2
    let ds: Vec<u16> = vec![306, 305, 304, 303, 302, 301];
    let rs: &[(u16, u32, &[u16])] = &[
        (11, 3, &[1, 2, 3, 4]),
        (12, 4, &[101, 102, 103, 104, 105, 106, 107, 108]),
        (13, 1, &[201, 202]),
        (14, 2, &ds[..]),
    ];

    let mut movers: Vec<u16> = ds
        .iter()
        .copied()
        .filter(|local| select_weighted(*local, Some(14), rs).is_none())
        .collect();
    movers.sort_unstable();
    assert_eq!(movers, vec![301, 302]);
}

#[test]
fn test_heavily_overloaded_rs() {
    // weight 4 of 10, 13 of 20 DSs attached: target 8, excess 5
    let ds: Vec<u16> = (101..=113).collect();
    let rs: &[(u16, u32, &[u16])] = &[
        (11, 3, &[1, 2, 3, 4]),
        (12, 4, &ds[..]),
        (13, 1, &[201, 202]),
        (14, 2, &[301]),
    ];

    let movers: Vec<u16> = ds
        .iter()
        .copied()
        .filter(|local| select_weighted(*local, Some(12), rs).is_none())
        .collect();
    assert_eq!(movers, vec![101, 102, 103, 104, 105]);
}

// ============================================================================
// Preconditions
// ============================================================================

#[test]
fn test_unknown_generation_refused() {
    let topology = weighted(ME, None, &[(11, 1, &[])]);
    let mut config = config();
    config.generation_id = None;

    let err = select_replication_server(&topology, &ServerState::new(), &config).unwrap_err();
    assert_eq!(err, SelectionError::InvalidConfig(ConfigError::UnknownGenerationId));
}
