// Optimization pipeline: request validation, catalog, fixtures, projections,
// selection, transfer planning and aggregation, wired in that order.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::catalog::{build_catalog, PlayerId, RawPlayer, RawTeam};
use crate::config::LeagueRules;
use crate::error::{OptimizeError, Stage};
use crate::fixtures::{build_fixture_index, RawFixture};
use crate::lineup::ScoringContext;
use crate::projection::{project_all, ScoringMetric};
use crate::protocol::{OptimizationResult, OptimizeRequest};
use crate::selection::{select_squad, SelectionConstraints};
use crate::squad::Squad;
use crate::transfers::{plan_transfers, ForcedPlayers};

/// Raw upstream data for one optimization: every player, team and fixture.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub players: Vec<RawPlayer>,
    pub teams: Vec<RawTeam>,
    pub fixtures: Vec<RawFixture>,
}

/// Run the whole pipeline for one request.
///
/// Pure and synchronous: the same snapshot, request, metric and rules always
/// produce the same result.
pub fn optimize(
    snapshot: &Snapshot,
    request: &OptimizeRequest,
    metric: ScoringMetric,
    rules: &LeagueRules,
) -> Result<OptimizationResult, OptimizeError> {
    validate_request(request)?;
    info!(
        gamedays = ?request.gamedays,
        metric = metric.as_str(),
        picks = request.picks.len(),
        "optimizing squad"
    );

    let catalog = build_catalog(&snapshot.players, &snapshot.teams)?;
    let index = build_fixture_index(&snapshot.fixtures, &request.gamedays)?;
    debug!(players = catalog.len(), fixtures = snapshot.fixtures.len(), "catalog built");

    let projections = project_all(&catalog, &index, metric)?;
    let ctx = ScoringContext {
        catalog: &catalog,
        projections: &projections,
        rules,
    };

    let current = Squad::from_picks(&request.picks, &catalog, rules)?;
    let incumbents: BTreeSet<PlayerId> = current.ids().collect();
    let force_include = id_set(request.force_include.as_deref());
    let force_exclude = id_set(request.force_exclude.as_deref());

    let selection = select_squad(
        &catalog,
        &projections,
        &SelectionConstraints {
            rules,
            force_include: &force_include,
            force_exclude: &force_exclude,
            incumbents: &incumbents,
        },
    )?;

    let target = Squad::from_selection(&selection.players, &catalog);
    let state = request.transfers.clone().unwrap_or_default();
    let plan = plan_transfers(
        &current,
        &target,
        &state,
        &ctx,
        &ForcedPlayers {
            include: &force_include,
            exclude: &force_exclude,
        },
    )?;

    let result = aggregate(&plan.final_squad, &ctx, &plan.ledger);
    info!(
        adjusted_points = result.points.adjusted_points,
        transfers = result.transfer_summary.total,
        total_cost = result.total_cost,
        "optimization complete"
    );
    Ok(result)
}

fn id_set(ids: Option<&[PlayerId]>) -> BTreeSet<PlayerId> {
    ids.unwrap_or_default().iter().copied().collect()
}

fn validate_request(request: &OptimizeRequest) -> Result<(), OptimizeError> {
    if request.gamedays.is_empty() {
        return Err(OptimizeError::validation(
            Stage::Request,
            "gamedays must not be empty",
        ));
    }
    if let Some(pair) = request.gamedays.windows(2).find(|w| w[0] >= w[1]) {
        return Err(OptimizeError::validation(
            Stage::Request,
            format!(
                "gamedays must be strictly increasing, found {} before {}",
                pair[0], pair[1]
            ),
        ));
    }
    Ok(())
}
