// Daily lineup selection and squad evaluation over the horizon.
//
// On each gameday the best eligible squad members start, subject to the
// lineup size and the per-position minimums. The captain (or, when the
// captain does not start, the vice-captain) scores with the multiplier.

use std::collections::BTreeMap;

use crate::catalog::{Catalog, PlayerId, Position};
use crate::config::LeagueRules;
use crate::fixtures::Gameday;
use crate::projection::Projections;
use crate::squad::Squad;

/// Shared read-only inputs for everything that scores a squad.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub catalog: &'a Catalog,
    pub projections: &'a Projections,
    pub rules: &'a LeagueRules,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Starter {
    pub id: PlayerId,
    pub position: Position,
    /// Projected score before the captaincy multiplier.
    pub base_points: i64,
    pub multiplier: i64,
    pub points: i64,
    pub fixtures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyLineup {
    pub gameday: Gameday,
    pub starters: Vec<Starter>,
}

impl DailyLineup {
    pub fn total(&self) -> i64 {
        self.starters.iter().map(|s| s.points).sum()
    }
}

/// A squad's projected lineups over every gameday of the horizon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineupSummary {
    pub days: Vec<DailyLineup>,
    pub total: i64,
    /// Fixtures played by starters.
    pub games: u32,
    /// Gamedays on which at least one player started.
    pub scoring_days: u32,
    contributions: BTreeMap<PlayerId, i64>,
}

impl LineupSummary {
    /// Points a player contributed as a starter across the horizon.
    pub fn contribution(&self, id: PlayerId) -> i64 {
        self.contributions.get(&id).copied().unwrap_or(0)
    }
}

/// Pick the starters for the gameday at index `day`.
///
/// Eligible players have at least one fixture that day and are not injured.
/// Each position first gets its minimum from its own best players, then the
/// remaining slots go to the best leftovers without breaking a position's
/// maximum. Ties go to the lower player id. Starters come out ordered by
/// score, highest first.
pub fn pick_starters(squad: &Squad, ctx: &ScoringContext<'_>, day: usize) -> DailyLineup {
    let projections = ctx.projections;
    let rules = ctx.rules;
    let gameday = projections.gamedays().get(day).copied().unwrap_or_default();

    let mut eligible: Vec<(PlayerId, Position, i64)> = squad
        .ids()
        .filter(|&id| projections.fixtures(id, day) > 0 && projections.can_start(id))
        .filter_map(|id| {
            ctx.catalog
                .player(id)
                .map(|p| (id, p.position, projections.score(id, day)))
        })
        .collect();
    eligible.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    let mut chosen = vec![false; eligible.len()];
    let mut per_position = [0usize; 2];
    let mut count = 0;

    for pos in Position::ALL {
        let minimum = rules.lineup_minimum.get(pos);
        for (i, &(_, p, _)) in eligible.iter().enumerate() {
            if count == rules.lineup_size || per_position[pos.index()] == minimum {
                break;
            }
            if p == pos {
                chosen[i] = true;
                per_position[pos.index()] += 1;
                count += 1;
            }
        }
    }

    for (i, &(_, pos, _)) in eligible.iter().enumerate() {
        if count == rules.lineup_size {
            break;
        }
        if chosen[i] || per_position[pos.index()] >= rules.lineup_maximum(pos) {
            continue;
        }
        chosen[i] = true;
        per_position[pos.index()] += 1;
        count += 1;
    }

    let starting: Vec<(PlayerId, Position, i64)> = eligible
        .into_iter()
        .zip(chosen)
        .filter_map(|(entry, picked)| picked.then_some(entry))
        .collect();

    let starts = |id: Option<PlayerId>| id.filter(|id| starting.iter().any(|s| s.0 == *id));
    let armband = starts(squad.captain()).or_else(|| starts(squad.vice_captain()));

    let starters = starting
        .iter()
        .map(|&(id, position, base_points)| {
            let multiplier = if Some(id) == armband {
                rules.captain_multiplier
            } else {
                1
            };
            Starter {
                id,
                position,
                base_points,
                multiplier,
                points: base_points * multiplier,
                fixtures: projections.fixtures(id, day),
            }
        })
        .collect();

    DailyLineup { gameday, starters }
}

/// Evaluate a squad over the whole horizon.
pub fn evaluate(squad: &Squad, ctx: &ScoringContext<'_>) -> LineupSummary {
    let mut summary = LineupSummary::default();

    for day in 0..ctx.projections.gamedays().len() {
        let lineup = pick_starters(squad, ctx, day);
        if !lineup.starters.is_empty() {
            summary.scoring_days += 1;
        }
        for starter in &lineup.starters {
            summary.total += starter.points;
            summary.games += starter.fixtures;
            *summary.contributions.entry(starter.id).or_insert(0) += starter.points;
        }
        summary.days.push(lineup);
    }

    summary
}
