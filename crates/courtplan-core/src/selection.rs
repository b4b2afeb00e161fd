// Squad selector: exact constrained selection under the salary cap.
//
// Each position is solved as its own 0/1 knapsack over (picks, spend), the
// best value for every exact pick count and exact spend. The two position
// tables are then merged under the total budget. Keep-bits are stored in a
// packed table so the chosen players can be walked back out.
//
// Ties are resolved deterministically: higher value, then lower total cost,
// then more retained incumbents. Within a position table candidates are
// visited in id order and only strict improvements replace a stored state,
// so among equal states the earliest-found (lower ids) wins.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use bitvec::prelude::*;
use tracing::debug;

use crate::catalog::{Catalog, PlayerId, Position};
use crate::config::LeagueRules;
use crate::error::{Constraint, OptimizeError, Stage};
use crate::projection::Projections;

/// Constraints the selector works under.
#[derive(Debug, Clone, Copy)]
pub struct SelectionConstraints<'a> {
    pub rules: &'a LeagueRules,
    pub force_include: &'a BTreeSet<PlayerId>,
    pub force_exclude: &'a BTreeSet<PlayerId>,
    /// Current squad members, preferred when everything else ties.
    pub incumbents: &'a BTreeSet<PlayerId>,
}

/// The squad the selector settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Chosen player ids, ascending.
    pub players: Vec<PlayerId>,
    pub total_value: i64,
    pub total_cost: i64,
    /// How many of the chosen players are incumbents.
    pub retained: usize,
}

// ---------------------------------------------------------------------------
// Per-position knapsack table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: PlayerId,
    cost: usize,
    value: i64,
    retained: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Score {
    value: i64,
    retained: usize,
}

impl Score {
    fn beats(&self, other: &Score) -> bool {
        (self.value, self.retained) > (other.value, other.retained)
    }
}

/// Best score for each exact (picks, spend) pair of one position.
struct PositionTable {
    candidates: Vec<Candidate>,
    max_picks: usize,
    budget: usize,
    best: Vec<Option<Score>>,
    keep: BitVec,
}

impl PositionTable {
    fn solve(candidates: Vec<Candidate>, max_picks: usize, budget: usize) -> Self {
        let width = budget + 1;
        let layer = (max_picks + 1) * width;
        let mut best: Vec<Option<Score>> = vec![None; layer];
        let mut keep: BitVec = BitVec::repeat(false, candidates.len() * layer);
        best[0] = Some(Score { value: 0, retained: 0 });

        for (i, cand) in candidates.iter().enumerate() {
            for k in (1..=max_picks).rev() {
                for c in (cand.cost..=budget).rev() {
                    let Some(prev) = best[(k - 1) * width + c - cand.cost] else {
                        continue;
                    };
                    let next = Score {
                        value: prev.value + cand.value,
                        retained: prev.retained + usize::from(cand.retained),
                    };
                    let slot = &mut best[k * width + c];
                    if slot.map_or(true, |cur| next.beats(&cur)) {
                        *slot = Some(next);
                        keep.set(i * layer + k * width + c, true);
                    }
                }
            }
        }

        PositionTable {
            candidates,
            max_picks,
            budget,
            best,
            keep,
        }
    }

    fn get(&self, picks: usize, spend: usize) -> Option<Score> {
        if picks > self.max_picks || spend > self.budget {
            return None;
        }
        self.best[picks * (self.budget + 1) + spend]
    }

    fn reconstruct(&self, mut picks: usize, mut spend: usize) -> Vec<PlayerId> {
        let width = self.budget + 1;
        let layer = (self.max_picks + 1) * width;
        let mut chosen = Vec::with_capacity(picks);
        for (i, cand) in self.candidates.iter().enumerate().rev() {
            if picks == 0 {
                break;
            }
            if self.keep[i * layer + picks * width + spend] {
                chosen.push(cand.id);
                picks -= 1;
                spend -= cand.cost;
            }
        }
        chosen
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Choose the squad that maximizes projected value.
///
/// Forced players are pinned first and their cost comes off the budget; the
/// remaining slots of each position are filled by the knapsack. Fails with
/// an `Infeasible` error naming the violated constraint.
pub fn select_squad(
    catalog: &Catalog,
    projections: &Projections,
    constraints: &SelectionConstraints<'_>,
) -> Result<Selection, OptimizeError> {
    let rules = constraints.rules;

    if constraints.force_include.len() > rules.squad_size {
        return Err(OptimizeError::infeasible(
            Stage::Selection,
            Constraint::ForceIncludeExceedsRoster {
                count: constraints.force_include.len(),
                squad_size: rules.squad_size,
            },
        ));
    }

    let overlap: Vec<PlayerId> = constraints
        .force_include
        .intersection(constraints.force_exclude)
        .copied()
        .collect();
    if !overlap.is_empty() {
        return Err(OptimizeError::infeasible(
            Stage::Selection,
            Constraint::ForceOverlap { players: overlap },
        ));
    }

    let mut forced_count = [0usize; 2];
    let mut forced_cost = 0i64;
    let mut forced_value = 0i64;
    let mut forced_retained = 0usize;
    for &id in constraints.force_include {
        let player = catalog.player(id).ok_or_else(|| {
            OptimizeError::validation(
                Stage::Selection,
                format!("force_include references unknown player {id}"),
            )
        })?;
        forced_count[player.position.index()] += 1;
        forced_cost += player.cost;
        forced_value += projections.selection_value(id);
        forced_retained += usize::from(constraints.incumbents.contains(&id));
    }

    for pos in Position::ALL {
        let forced = forced_count[pos.index()];
        let max = rules.squad_quota.get(pos).max;
        if forced > max {
            return Err(OptimizeError::infeasible(
                Stage::Selection,
                Constraint::PositionQuota {
                    position: pos,
                    forced,
                    max,
                },
            ));
        }
    }

    if forced_cost > rules.salary_cap {
        return Err(OptimizeError::infeasible(
            Stage::Selection,
            Constraint::ForcedCostExceedsCap {
                forced_cost,
                salary_cap: rules.salary_cap,
            },
        ));
    }

    let no_solution = || {
        OptimizeError::infeasible(
            Stage::Selection,
            Constraint::NoFeasibleSquad {
                salary_cap: rules.salary_cap,
            },
        )
    };

    let budget = usize::try_from(rules.salary_cap - forced_cost).map_err(|_| no_solution())?;
    let free_slots = rules.squad_size - constraints.force_include.len();

    // Pick-count range and knapsack table for each position.
    let tables: Vec<(usize, usize, PositionTable)> = Position::ALL
        .iter()
        .map(|&pos| {
            let quota = rules.squad_quota.get(pos);
            let forced = forced_count[pos.index()];
            let lo = quota.min.saturating_sub(forced);
            let hi = (quota.max - forced).min(free_slots);
            let candidates: Vec<Candidate> = catalog
                .players()
                .filter(|p| p.position == pos)
                .filter(|p| {
                    !constraints.force_include.contains(&p.id) && !constraints.force_exclude.contains(&p.id)
                })
                .filter_map(|p| {
                    let cost = usize::try_from(p.cost).ok().filter(|&c| c <= budget)?;
                    Some(Candidate {
                        id: p.id,
                        cost,
                        value: projections.selection_value(p.id),
                        retained: constraints.incumbents.contains(&p.id),
                    })
                })
                .collect();
            debug!(
                position = %pos,
                candidates = candidates.len(),
                min_picks = lo,
                max_picks = hi,
                "solving position table"
            );
            (lo, hi, PositionTable::solve(candidates, hi, budget))
        })
        .collect();

    let (bc_lo, bc_hi, back) = &tables[0];
    let (fc_lo, fc_hi, front) = &tables[1];

    // (value, lower cost, retained) compared lexicographically.
    type Key = (i64, Reverse<usize>, usize);
    let mut best: Option<(Key, [usize; 4])> = None;

    for bc_picks in *bc_lo..=(*bc_hi).min(free_slots) {
        let fc_picks = free_slots - bc_picks;
        if fc_picks < *fc_lo || fc_picks > *fc_hi {
            continue;
        }
        for bc_spend in 0..=budget {
            let Some(a) = back.get(bc_picks, bc_spend) else {
                continue;
            };
            for fc_spend in 0..=(budget - bc_spend) {
                let Some(b) = front.get(fc_picks, fc_spend) else {
                    continue;
                };
                let key: Key = (
                    a.value + b.value,
                    Reverse(bc_spend + fc_spend),
                    a.retained + b.retained,
                );
                if best.as_ref().map_or(true, |(cur, _)| key > *cur) {
                    best = Some((key, [bc_picks, bc_spend, fc_picks, fc_spend]));
                }
            }
        }
    }

    let ((value, Reverse(spend), retained), [bc_picks, bc_spend, fc_picks, fc_spend]) =
        best.ok_or_else(no_solution)?;

    let mut players: Vec<PlayerId> = constraints.force_include.iter().copied().collect();
    players.extend(back.reconstruct(bc_picks, bc_spend));
    players.extend(front.reconstruct(fc_picks, fc_spend));
    players.sort_unstable();

    let total_cost = forced_cost + spend as i64;
    debug!(
        players = players.len(),
        total_cost,
        total_value = forced_value + value,
        "squad selected"
    );

    Ok(Selection {
        players,
        total_value: forced_value + value,
        total_cost,
        retained: forced_retained + retained,
    })
}
