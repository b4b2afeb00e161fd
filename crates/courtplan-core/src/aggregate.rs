// Result aggregator: turns the final squad and the transfer ledger into the
// result document.

use std::collections::BTreeMap;

use tracing::debug;

use crate::catalog::{Player, PlayerId};
use crate::lineup::{evaluate, ScoringContext};
use crate::protocol::{
    EventTransfers, OptimizationResult, PointsBreakdown, SquadEntry, StarterEntry, TransferPlayer,
    TransferSummary,
};
use crate::squad::Squad;
use crate::transfers::Ledger;

/// Assemble the result for `squad` after the swaps in `ledger`.
///
/// `raw_points` is the lineup total the squad would have scored without the
/// ledger's swaps and `adjusted_points` is the final lineup total less
/// transfer penalties, so that
/// `points_gained - points_lost - penalty == adjusted - raw` always holds.
pub fn aggregate(squad: &Squad, ctx: &ScoringContext<'_>, ledger: &Ledger) -> OptimizationResult {
    let catalog = ctx.catalog;
    let projections = ctx.projections;
    let summary = evaluate(squad, ctx);

    let mut members: Vec<(&Player, _)> = squad
        .members()
        .iter()
        .filter_map(|m| catalog.player(m.id).map(|p| (p, m)))
        .collect();
    members.sort_by(|(a, _), (b, _)| {
        a.position
            .cmp(&b.position)
            .then(projections.horizon_total(b.id).cmp(&projections.horizon_total(a.id)))
            .then(a.id.cmp(&b.id))
    });

    let squad_entries: Vec<SquadEntry> = members
        .iter()
        .enumerate()
        .map(|(i, (player, member))| SquadEntry {
            slot: i + 1,
            id: player.id,
            name: player.name.clone(),
            team: player.team_short.clone(),
            position: player.position,
            cost: player.cost,
            points: summary.contribution(player.id),
            projected_points: projections.horizon_total(player.id),
            points_per_game: player.points_per_game,
            form: player.form,
            games: projections.horizon_games(player.id),
            status: player.status,
            selling_price: member.selling_price,
            purchase_price: member.purchase_price,
            is_captain: member.is_captain,
            is_vice_captain: member.is_vice_captain,
        })
        .collect();

    let daily_starters: BTreeMap<_, Vec<StarterEntry>> = summary
        .days
        .iter()
        .map(|day| {
            let starters = day
                .starters
                .iter()
                .filter_map(|s| {
                    catalog.player(s.id).map(|p| StarterEntry {
                        id: s.id,
                        name: p.name.clone(),
                        team: p.team_short.clone(),
                        position: s.position,
                        points: s.points,
                        multiplier: s.multiplier,
                        fixtures: s.fixtures,
                    })
                })
                .collect();
            (day.gameday, starters)
        })
        .collect();

    let transfer_player = |id: PlayerId, points: i64| {
        catalog.player(id).map(|p| TransferPlayer {
            id,
            name: p.name.clone(),
            team_short: p.team_short.clone(),
            position: p.position,
            cost: p.cost,
            points,
        })
    };

    let mut transfers_by_event: BTreeMap<_, EventTransfers> = projections
        .gamedays()
        .iter()
        .map(|&gd| (gd, EventTransfers::default()))
        .collect();
    for t in &ledger.transfers {
        let event = transfers_by_event.entry(t.gameday).or_default();
        event.incoming.extend(transfer_player(t.player_in, t.points_gained));
        event.outgoing.extend(transfer_player(t.player_out, t.points_lost));
    }

    let penalty = ledger.penalty_total();
    let net_gain = ledger.points_gained() - ledger.points_lost();
    let points = PointsBreakdown {
        adjusted_points: summary.total - penalty,
        raw_points: summary.total - net_gain,
        transfer_penalty: penalty,
    };

    let average_points_per_day = if summary.scoring_days > 0 {
        (points.adjusted_points as f64 / f64::from(summary.scoring_days)).round() as i64
    } else {
        0
    };

    debug!(
        adjusted = points.adjusted_points,
        raw = points.raw_points,
        penalty,
        scoring_days = summary.scoring_days,
        "aggregated result"
    );

    OptimizationResult {
        squad: squad_entries,
        daily_starters,
        points,
        total_cost: squad.total_cost(catalog),
        average_points_per_day,
        total_games: summary.games,
        scoring_days: summary.scoring_days,
        transfer_summary: TransferSummary {
            total: ledger.transfers.len(),
            free: ledger.free_count(),
            penalized: ledger.penalized_count(),
            penalty,
            points_gained: ledger.points_gained(),
            points_lost: ledger.points_lost(),
            bank_before: ledger.bank_before,
            bank_after: ledger.bank_after,
            transfers: ledger.transfers.clone(),
            skipped: ledger.skipped.clone(),
        },
        transfers_by_event,
    }
}
