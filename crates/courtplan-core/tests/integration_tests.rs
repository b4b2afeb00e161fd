// Integration tests for the optimization core.
//
// These drive `courtplan_core::optimize` end-to-end through the public API:
// catalog and fixture ingestion, projection, squad selection, transfer
// planning and result aggregation.

use std::collections::BTreeMap;

use courtplan_core::catalog::{Position, RawPlayer, RawTeam, StatValue};
use courtplan_core::config::LeagueRules;
use courtplan_core::error::{Constraint, Stage};
use courtplan_core::fixtures::RawFixture;
use courtplan_core::projection::ScoringMetric;
use courtplan_core::protocol::{OptimizationResult, OptimizeRequest};
use courtplan_core::squad::RawPick;
use courtplan_core::transfers::TransferState;
use courtplan_core::{optimize, OptimizeError, Snapshot};

// ===========================================================================
// Test helpers
// ===========================================================================

fn raw_player(id: u32, element_type: u8, team: u32, now_cost: u32, form: f64) -> RawPlayer {
    RawPlayer {
        id,
        element_type,
        team,
        now_cost,
        points_per_game: StatValue::Text(format!("{:.1}", form / 2.0)),
        form: StatValue::Text(format!("{form:.1}")),
        status: "a".into(),
        web_name: format!("Player{id}"),
        first_name: "First".into(),
        second_name: format!("Last{id}"),
    }
}

fn raw_team(id: u32) -> RawTeam {
    RawTeam {
        id,
        name: format!("Team {id}"),
        short_name: format!("T{id:02}"),
    }
}

fn fixture(id: u32, event: u32, home: u32, away: u32) -> RawFixture {
    RawFixture {
        id,
        event: Some(event),
        team_h: home,
        team_a: away,
    }
}

/// Twelve players at a flat price of 10.0, so the cap of 100.0 buys exactly
/// ten. Back Court 1-6 have form 10..60, Front Court 7-12 have form 15..65.
/// Teams 1 and 2 meet on gamedays 1 and 3; gameday 2 is blank.
fn flat_snapshot() -> Snapshot {
    let players = (1..=12)
        .map(|id| {
            if id <= 6 {
                raw_player(id, 1, 1 + id % 2, 100, f64::from(id * 10))
            } else {
                raw_player(id, 2, 1 + id % 2, 100, f64::from((id - 6) * 10 + 5))
            }
        })
        .collect();
    Snapshot {
        players,
        teams: vec![raw_team(1), raw_team(2)],
        fixtures: vec![fixture(1, 1, 1, 2), fixture(2, 3, 2, 1), fixture(3, 9, 1, 2)],
    }
}

/// A fuller league: 24 players across 6 teams with varied prices and form.
fn league_snapshot() -> Snapshot {
    let players = (1..=24)
        .map(|id| {
            let element_type = if id <= 12 { 1 } else { 2 };
            let team = (id - 1) % 6 + 1;
            let cost = 60 + (id * 37) % 90;
            let form = 10.0 + f64::from((id * 53) % 40) + f64::from(cost) / 20.0;
            raw_player(id, element_type, team, cost, form)
        })
        .collect();
    Snapshot {
        players,
        teams: (1..=6).map(raw_team).collect(),
        fixtures: vec![
            fixture(1, 1, 1, 2),
            fixture(2, 1, 3, 4),
            fixture(3, 1, 5, 6),
            fixture(4, 2, 1, 3),
            fixture(5, 2, 2, 5),
            fixture(6, 3, 4, 6),
            fixture(7, 3, 1, 5),
            fixture(8, 3, 2, 3),
        ],
    }
}

fn request(gamedays: &[u32]) -> OptimizeRequest {
    OptimizeRequest {
        gamedays: gamedays.to_vec(),
        ..OptimizeRequest::default()
    }
}

fn picks(ids: &[u32], captain: u32, vice: u32) -> Vec<RawPick> {
    ids.iter()
        .enumerate()
        .map(|(i, &id)| RawPick {
            element: id,
            position: i as u32 + 1,
            selling_price: Some(100),
            purchase_price: Some(95),
            multiplier: if id == captain { 2 } else { 1 },
            is_captain: id == captain,
            is_vice_captain: id == vice,
        })
        .collect()
}

fn squad_ids(result: &OptimizationResult) -> Vec<u32> {
    let mut ids: Vec<u32> = result.squad.iter().map(|e| e.id).collect();
    ids.sort_unstable();
    ids
}

fn assert_ledger_invariant(result: &OptimizationResult) {
    let summary = &result.transfer_summary;
    let points = &result.points;
    assert_eq!(
        summary.points_gained - summary.points_lost - points.transfer_penalty,
        points.adjusted_points - points.raw_points
    );
}

const TARGET: [u32; 10] = [2, 3, 4, 5, 6, 8, 9, 10, 11, 12];

// ===========================================================================
// Squad selection
// ===========================================================================

#[test]
fn fresh_squad_respects_quotas_and_cap() {
    let rules = LeagueRules::default();
    let result = optimize(&league_snapshot(), &request(&[1, 2, 3]), ScoringMetric::Form, &rules).unwrap();

    assert_eq!(result.squad.len(), 10);
    let back = result
        .squad
        .iter()
        .filter(|e| e.position == Position::BackCourt)
        .count();
    assert_eq!(back, 5);
    assert!(result.total_cost <= rules.salary_cap);
    assert_eq!(result.squad.iter().filter(|e| e.is_captain).count(), 1);
    assert_eq!(result.squad.iter().filter(|e| e.is_vice_captain).count(), 1);
    assert_eq!(result.points.transfer_penalty, 0);
    assert!(result.transfer_summary.transfers.is_empty());
}

#[test]
fn flat_prices_pick_the_best_five_per_position() {
    let result = optimize(&flat_snapshot(), &request(&[1, 2, 3]), ScoringMetric::Form, &LeagueRules::default()).unwrap();
    assert_eq!(squad_ids(&result), TARGET.to_vec());
    assert_eq!(result.total_cost, 1000);
}

#[test]
fn force_include_of_eleven_is_infeasible() {
    let mut req = request(&[1]);
    req.force_include = Some((1..=11).collect());
    let err = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &LeagueRules::default()).unwrap_err();
    match err {
        OptimizeError::Infeasible { stage, constraint } => {
            assert_eq!(stage, Stage::Selection);
            assert_eq!(
                constraint,
                Constraint::ForceIncludeExceedsRoster {
                    count: 11,
                    squad_size: 10
                }
            );
        }
        other => panic!("expected Infeasible, got: {other}"),
    }
}

#[test]
fn force_exclude_removes_a_player() {
    let mut req = request(&[1, 3]);
    req.force_exclude = Some(vec![12]);
    let result = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &LeagueRules::default()).unwrap();
    let ids = squad_ids(&result);
    assert!(!ids.contains(&12));
    assert!(ids.contains(&7));
}

// ===========================================================================
// Lineups and aggregation
// ===========================================================================

#[test]
fn blank_gameday_has_no_starters_and_no_points() {
    let result = optimize(&flat_snapshot(), &request(&[1, 2, 3]), ScoringMetric::Form, &LeagueRules::default()).unwrap();

    assert!(result.daily_starters[&2].is_empty());
    assert_eq!(result.scoring_days, 2);

    let with_blank = result.points.raw_points;
    let without = optimize(&flat_snapshot(), &request(&[1, 3]), ScoringMetric::Form, &LeagueRules::default())
        .unwrap()
        .points
        .raw_points;
    assert_eq!(with_blank, without);

    // 12 (x2) + 11 + 10 from Front Court, 6 + 5 from Back Court, twice.
    assert_eq!(with_blank, 2 * (650 * 2 + 550 + 450 + 600 + 500));
    assert_eq!(result.average_points_per_day, with_blank / 2);
    assert_eq!(result.total_games, 10);
}

#[test]
fn double_gameday_doubles_projected_scores() {
    let rules = LeagueRules::default();
    let single = optimize(&flat_snapshot(), &request(&[1]), ScoringMetric::Form, &rules).unwrap();
    let double = optimize(&flat_snapshot(), &request(&[9]), ScoringMetric::Form, &rules).unwrap();

    let mut snapshot = flat_snapshot();
    snapshot.fixtures.push(fixture(4, 9, 2, 1));
    let doubled = optimize(&snapshot, &request(&[9]), ScoringMetric::Form, &rules).unwrap();

    assert_eq!(single.points.raw_points, double.points.raw_points);
    assert_eq!(doubled.points.raw_points, 2 * double.points.raw_points);

    let starter = doubled.daily_starters[&9]
        .iter()
        .find(|s| s.id == 11)
        .unwrap();
    assert_eq!(starter.fixtures, 2);
    assert_eq!(starter.points, 1100);
}

#[test]
fn points_per_game_metric_changes_the_projection() {
    let rules = LeagueRules::default();
    let form = optimize(&flat_snapshot(), &request(&[1]), ScoringMetric::Form, &rules).unwrap();
    let ppg = optimize(&flat_snapshot(), &request(&[1]), ScoringMetric::PointsPerGame, &rules).unwrap();
    assert_eq!(ppg.points.raw_points * 2, form.points.raw_points);
}

#[test]
fn transfers_by_event_lists_every_gameday() {
    let result = optimize(&flat_snapshot(), &request(&[1, 2, 3]), ScoringMetric::Form, &LeagueRules::default()).unwrap();
    let days: Vec<u32> = result.transfers_by_event.keys().copied().collect();
    assert_eq!(days, vec![1, 2, 3]);
    assert!(result
        .transfers_by_event
        .values()
        .all(|e| e.incoming.is_empty() && e.outgoing.is_empty()));
}

#[test]
fn identical_input_gives_identical_output() {
    let mut req = request(&[1, 2, 3]);
    req.picks = picks(&[1, 2, 3, 4, 5, 8, 9, 10, 11, 12], 12, 11);
    req.transfers = Some(TransferState {
        bank: 0,
        limit: Some(1),
        ..TransferState::default()
    });
    let rules = LeagueRules::default();
    let fresh = request(&[1, 2, 3]);
    let first = optimize(&league_snapshot(), &fresh, ScoringMetric::Form, &rules).unwrap();
    let second = optimize(&league_snapshot(), &fresh, ScoringMetric::Form, &rules).unwrap();
    assert_eq!(first, second);

    let a = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &rules).unwrap();
    let b = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &rules).unwrap();
    assert_eq!(a.transfer_summary.total, 1);
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

// ===========================================================================
// Transfers
// ===========================================================================

#[test]
fn current_squad_equal_to_target_needs_no_transfers() {
    let mut req = request(&[1, 2, 3]);
    req.picks = picks(&TARGET, 12, 11);
    req.transfers = Some(TransferState {
        bank: 0,
        limit: Some(0),
        ..TransferState::default()
    });
    let result = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &LeagueRules::default()).unwrap();

    assert!(result.transfer_summary.transfers.is_empty());
    assert_eq!(result.points.transfer_penalty, 0);
    assert_eq!(result.points.raw_points, result.points.adjusted_points);
    let captain = result.squad.iter().find(|e| e.is_captain).unwrap();
    assert_eq!(captain.id, 12);
    assert_eq!(captain.selling_price, 100);
    assert_eq!(captain.purchase_price, 95);
}

#[test]
fn free_transfer_upgrades_the_squad() {
    let mut req = request(&[1, 2, 3]);
    req.picks = picks(&[1, 2, 3, 4, 5, 8, 9, 10, 11, 12], 12, 11);
    req.transfers = Some(TransferState {
        bank: 0,
        limit: Some(1),
        ..TransferState::default()
    });
    let result = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &LeagueRules::default()).unwrap();

    let summary = &result.transfer_summary;
    assert_eq!(summary.total, 1);
    assert_eq!(summary.free, 1);
    let t = &summary.transfers[0];
    assert_eq!((t.player_out, t.player_in), (1, 6));
    assert_eq!(t.gameday, 1);
    // Back Court 6 replaces 4 in both lineups: +200 per scoring day.
    assert_eq!(t.points_gained - t.points_lost, 400);
    assert_eq!(result.points.adjusted_points - result.points.raw_points, 400);
    assert_eq!(squad_ids(&result), TARGET.to_vec());
    assert_ledger_invariant(&result);

    let event = &result.transfers_by_event[&1];
    assert_eq!(event.incoming[0].id, 6);
    assert_eq!(event.outgoing[0].id, 1);
}

#[test]
fn small_gain_is_not_worth_a_penalty() {
    let mut req = request(&[1, 2, 3]);
    req.picks = picks(&[1, 2, 3, 4, 5, 8, 9, 10, 11, 12], 12, 11);
    req.transfers = Some(TransferState {
        bank: 0,
        limit: Some(1),
        made: 1,
        ..TransferState::default()
    });
    let result = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &LeagueRules::default()).unwrap();
    assert!(result.transfer_summary.transfers.is_empty());
    assert!(squad_ids(&result).contains(&1));
}

#[test]
fn forced_transfer_pays_the_penalty_and_keeps_the_ledger_consistent() {
    let mut req = request(&[1, 2, 3]);
    req.picks = picks(&[1, 2, 3, 4, 5, 8, 9, 10, 11, 12], 12, 11);
    req.force_include = Some(vec![6]);
    req.transfers = Some(TransferState {
        bank: 0,
        limit: Some(0),
        ..TransferState::default()
    });
    let rules = LeagueRules::default();
    let result = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &rules).unwrap();

    assert_eq!(result.transfer_summary.penalized, 1);
    assert_eq!(result.points.transfer_penalty, rules.transfer_penalty);
    assert_eq!(
        result.points.adjusted_points,
        result.points.raw_points + 400 - rules.transfer_penalty
    );
    assert_ledger_invariant(&result);
}

#[test]
fn unaffordable_forced_exclusion_is_infeasible() {
    let mut req = request(&[1, 2, 3]);
    let mut current = picks(&[1, 2, 3, 4, 5, 8, 9, 10, 11, 12], 12, 11);
    current[9].selling_price = Some(50);
    req.picks = current;
    req.force_exclude = Some(vec![12]);
    req.transfers = Some(TransferState {
        bank: 0,
        limit: Some(1),
        ..TransferState::default()
    });

    let err = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &LeagueRules::default()).unwrap_err();
    match err {
        OptimizeError::Infeasible {
            stage,
            constraint: Constraint::ForcedPlayerNotApplied { player, .. },
        } => {
            assert_eq!(stage, Stage::Planning);
            assert_eq!(player, 12);
        }
        other => panic!("expected ForcedPlayerNotApplied, got: {other}"),
    }
}

#[test]
fn missing_limit_means_no_free_transfers() {
    let current = picks(&[1, 2, 3, 4, 5, 8, 9, 10, 11, 12], 12, 11);
    let rules = LeagueRules::default();
    let run = |transfers: Option<TransferState>| {
        let mut req = request(&[1, 2, 3]);
        req.picks = current.clone();
        req.force_include = Some(vec![6]);
        req.transfers = transfers;
        optimize(&flat_snapshot(), &req, ScoringMetric::Form, &rules).unwrap()
    };

    let omitted = run(None);
    let partial = run(Some(serde_json::from_str(r#"{"bank":0}"#).unwrap()));
    assert_eq!(omitted.transfer_summary.free, 0);
    assert_eq!(partial.transfer_summary.free, 0);
    assert_eq!(omitted.points, partial.points);

    let wildcard = run(Some(serde_json::from_str(r#"{"bank":0,"limit":null}"#).unwrap()));
    assert_eq!(wildcard.transfer_summary.free, 1);
    assert_eq!(wildcard.points.transfer_penalty, 0);
}

#[test]
fn ledger_invariant_holds_across_a_busy_plan() {
    let snapshot = league_snapshot();
    let rules = LeagueRules::default();

    // Start from the cheapest legal squad and let the planner work.
    let mut by_position: BTreeMap<bool, Vec<(u32, u32)>> = BTreeMap::new();
    for p in &snapshot.players {
        by_position
            .entry(p.element_type == 1)
            .or_default()
            .push((p.now_cost, p.id));
    }
    let mut current = Vec::new();
    for players in by_position.values_mut() {
        players.sort_unstable();
        current.extend(players.iter().take(5).map(|&(_, id)| id));
    }

    let mut req = request(&[1, 2, 3]);
    req.picks = picks(&current, current[0], current[1]);
    req.transfers = Some(TransferState {
        bank: 50,
        limit: Some(2),
        ..TransferState::default()
    });
    let result = optimize(&snapshot, &req, ScoringMetric::Form, &rules).unwrap();

    assert_ledger_invariant(&result);
    assert_eq!(result.squad.len(), 10);
    assert!(result.transfer_summary.bank_after >= 0);
    for t in &result.transfer_summary.transfers {
        assert_eq!(t.free, t.penalty == 0);
    }
}

#[test]
fn absurd_form_is_a_scoring_error_not_a_panic() {
    let mut snapshot = flat_snapshot();
    snapshot.players[11].form = StatValue::Text("1e17".into());
    let err = optimize(&snapshot, &request(&[1]), ScoringMetric::Form, &LeagueRules::default()).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Scoring));

    snapshot.players[11].form = StatValue::Text("1e30".into());
    let err = optimize(&snapshot, &request(&[1]), ScoringMetric::Form, &LeagueRules::default()).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Catalog));
}

// ===========================================================================
// Request validation
// ===========================================================================

#[test]
fn bad_requests_are_rejected_with_their_stage() {
    let rules = LeagueRules::default();

    let err = optimize(&flat_snapshot(), &request(&[]), ScoringMetric::Form, &rules).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Request));

    let mut req = request(&[1]);
    req.picks = picks(&[1, 2, 3], 1, 2);
    let err = optimize(&flat_snapshot(), &req, ScoringMetric::Form, &rules).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Request));

    let mut snapshot = flat_snapshot();
    snapshot.players[0].team = 99;
    let err = optimize(&snapshot, &request(&[1]), ScoringMetric::Form, &rules).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Catalog));
}
