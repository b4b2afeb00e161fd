// Transfer planner: moves the current squad toward the selected target one
// same-position swap at a time, paying attention to the bank, the salary cap
// and the free-transfer allowance.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{PlayerId, Position};
use crate::error::{Constraint, OptimizeError, Stage};
use crate::fixtures::Gameday;
use crate::lineup::{evaluate, ScoringContext};
use crate::squad::{Squad, SquadMember};

// ---------------------------------------------------------------------------
// Transfer state and ledger types
// ---------------------------------------------------------------------------

/// The manager's transfer situation as reported upstream.
///
/// Only an explicit `limit: null` means unlimited free transfers (wildcard
/// or pre-season). A missing `limit`, like a missing object, means none.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransferState {
    #[serde(default)]
    pub bank: i64,
    #[serde(default = "no_free_transfers", deserialize_with = "limit_or_unlimited")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub made: u32,
    #[serde(default)]
    pub cost: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub value: i64,
}

fn no_free_transfers() -> Option<u32> {
    Some(0)
}

/// Only reached when the key is present, so `null` reads as unlimited.
fn limit_or_unlimited<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<u32>::deserialize(deserializer)
}

impl Default for TransferState {
    fn default() -> Self {
        TransferState {
            bank: 0,
            limit: no_free_transfers(),
            made: 0,
            cost: 0,
            status: String::new(),
            value: 0,
        }
    }
}

impl TransferState {
    /// Free transfers left this phase, `None` when unlimited.
    pub fn free_remaining(&self) -> Option<u32> {
        self.limit.map(|limit| limit.saturating_sub(self.made))
    }
}

/// One committed swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub gameday: Gameday,
    pub player_out: PlayerId,
    pub player_in: PlayerId,
    pub position: Position,
    pub sell_price: i64,
    pub buy_price: i64,
    pub points_gained: i64,
    pub points_lost: i64,
    pub free: bool,
    pub penalty: i64,
}

/// A swap the planner wanted but could not make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSwap {
    pub player_out: PlayerId,
    pub player_in: PlayerId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    pub transfers: Vec<Transfer>,
    pub skipped: Vec<SkippedSwap>,
    pub bank_before: i64,
    pub bank_after: i64,
}

impl Ledger {
    pub fn points_gained(&self) -> i64 {
        self.transfers.iter().map(|t| t.points_gained).sum()
    }

    pub fn points_lost(&self) -> i64 {
        self.transfers.iter().map(|t| t.points_lost).sum()
    }

    pub fn penalty_total(&self) -> i64 {
        self.transfers.iter().map(|t| t.penalty).sum()
    }

    pub fn free_count(&self) -> usize {
        self.transfers.iter().filter(|t| t.free).count()
    }

    pub fn penalized_count(&self) -> usize {
        self.transfers.len() - self.free_count()
    }
}

/// Players the request pins into or out of the squad. Swaps that serve
/// them are mandatory.
#[derive(Debug, Clone, Copy)]
pub struct ForcedPlayers<'a> {
    pub include: &'a BTreeSet<PlayerId>,
    pub exclude: &'a BTreeSet<PlayerId>,
}

#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub final_squad: Squad,
    pub ledger: Ledger,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

struct Candidate {
    out: PlayerId,
    incoming: PlayerId,
    position: Position,
    sell: i64,
    buy: i64,
    delta: i64,
    gained: i64,
    mandatory: bool,
    after: Squad,
}

/// Plan the swaps that take `current` toward `target`.
///
/// An empty current squad adopts the target outright. Otherwise each round
/// evaluates every same-position swap between the two squads over the whole
/// horizon and commits the best one that is affordable, stays under the cap
/// and is worth its penalty. Rounds repeat until nothing is committed.
///
/// Fails when a forced player is still on the wrong side of the squad once
/// no more swaps can be made, naming the swap that blocked it.
pub fn plan_transfers(
    current: &Squad,
    target: &Squad,
    state: &TransferState,
    ctx: &ScoringContext<'_>,
    forced: &ForcedPlayers<'_>,
) -> Result<TransferPlan, OptimizeError> {
    let captaincy_value = |id: PlayerId| ctx.projections.selection_value(id);
    let mut ledger = Ledger {
        bank_before: state.bank,
        bank_after: state.bank,
        ..Ledger::default()
    };

    if current.is_empty() {
        let mut squad = target.clone();
        squad.repair_captaincy(captaincy_value);
        debug!(players = squad.len(), "no current squad, adopting selection");
        return Ok(TransferPlan {
            final_squad: squad,
            ledger,
        });
    }

    let gameday = ctx.projections.gamedays().first().copied().unwrap_or_default();
    let mut squad = current.clone();
    squad.repair_captaincy(captaincy_value);
    let mut free_left = state.free_remaining();
    let mut skipped_pairs: BTreeSet<(PlayerId, PlayerId)> = BTreeSet::new();

    loop {
        let before = evaluate(&squad, ctx).total;
        let outs: Vec<PlayerId> = squad.ids().filter(|id| !target.contains(*id)).collect();
        let ins: Vec<PlayerId> = target.ids().filter(|id| !squad.contains(*id)).collect();
        if outs.is_empty() || ins.is_empty() {
            break;
        }

        let mut candidates = Vec::new();
        for &out in &outs {
            let (Some(out_player), Some(member)) = (ctx.catalog.player(out), squad.member(out)) else {
                continue;
            };
            for &incoming in &ins {
                let Some(in_player) = ctx.catalog.player(incoming) else {
                    continue;
                };
                if in_player.position != out_player.position {
                    continue;
                }
                let mut after = squad.clone();
                after.swap(out, SquadMember::bought(incoming, in_player.cost));
                after.repair_captaincy(captaincy_value);
                let summary = evaluate(&after, ctx);
                candidates.push(Candidate {
                    out,
                    incoming,
                    position: in_player.position,
                    sell: member.selling_price,
                    buy: in_player.cost,
                    delta: summary.total - before,
                    gained: summary.contribution(incoming),
                    mandatory: forced.include.contains(&incoming) || forced.exclude.contains(&out),
                    after,
                });
            }
        }

        candidates.sort_by_key(|c| {
            (
                Reverse(c.mandatory),
                Reverse(c.delta),
                c.buy - c.sell,
                c.out,
                c.incoming,
            )
        });

        let squad_cost = squad.total_cost(ctx.catalog);
        let mut committed = None;
        for cand in candidates {
            let spend = cand.buy - cand.sell;
            if spend > ledger.bank_after {
                let err = OptimizeError::InsufficientBudget {
                    player_out: cand.out,
                    player_in: cand.incoming,
                    shortfall: spend - ledger.bank_after,
                };
                if skipped_pairs.insert((cand.out, cand.incoming)) {
                    warn!(%err, "skipping swap");
                    ledger.skipped.push(SkippedSwap {
                        player_out: cand.out,
                        player_in: cand.incoming,
                        reason: err.to_string(),
                    });
                }
                continue;
            }

            let out_cost = ctx.catalog.player(cand.out).map_or(0, |p| p.cost);
            let total_cost = squad_cost - out_cost + cand.buy;
            if cand.buy > out_cost && total_cost > ctx.rules.salary_cap {
                let err = OptimizeError::infeasible(
                    Stage::Planning,
                    Constraint::SalaryCap {
                        total_cost,
                        salary_cap: ctx.rules.salary_cap,
                    },
                );
                if skipped_pairs.insert((cand.out, cand.incoming)) {
                    warn!(%err, player_out = cand.out, player_in = cand.incoming, "skipping swap");
                    ledger.skipped.push(SkippedSwap {
                        player_out: cand.out,
                        player_in: cand.incoming,
                        reason: err.to_string(),
                    });
                }
                continue;
            }

            let free = free_left.map_or(true, |n| n > 0);
            let penalty = if free { 0 } else { ctx.rules.transfer_penalty };
            if !cand.mandatory && cand.delta - penalty <= 0 {
                continue;
            }

            committed = Some((cand, free, penalty));
            break;
        }

        let Some((cand, free, penalty)) = committed else {
            break;
        };

        if free {
            free_left = free_left.map(|n| n - 1);
        }
        ledger.bank_after += cand.sell - cand.buy;
        debug!(
            player_out = cand.out,
            player_in = cand.incoming,
            delta = cand.delta,
            penalty,
            "transfer committed"
        );
        ledger.transfers.push(Transfer {
            gameday,
            player_out: cand.out,
            player_in: cand.incoming,
            position: cand.position,
            sell_price: cand.sell,
            buy_price: cand.buy,
            points_gained: cand.gained,
            points_lost: cand.gained - cand.delta,
            free,
            penalty,
        });
        squad = cand.after;
    }

    // Swaps that went through in a later round are no longer skipped.
    ledger
        .skipped
        .retain(|s| squad.contains(s.player_out) && !squad.contains(s.player_in));

    if let Some(err) = unmet_force(&squad, &ledger, forced) {
        return Err(err);
    }

    Ok(TransferPlan {
        final_squad: squad,
        ledger,
    })
}

/// The first forced player the final squad still violates, with the reason
/// its swap was skipped.
fn unmet_force(squad: &Squad, ledger: &Ledger, forced: &ForcedPlayers<'_>) -> Option<OptimizeError> {
    let still_in = forced
        .exclude
        .iter()
        .copied()
        .find(|&id| squad.contains(id))
        .map(|id| (id, ledger.skipped.iter().find(|s| s.player_out == id)));
    let still_out = forced
        .include
        .iter()
        .copied()
        .find(|&id| !squad.contains(id))
        .map(|id| (id, ledger.skipped.iter().find(|s| s.player_in == id)));

    let (player, skip) = still_in.or(still_out)?;
    let reason = skip.map_or_else(
        || "no same-position swap is available".to_string(),
        |s| s.reason.clone(),
    );
    Some(OptimizeError::infeasible(
        Stage::Planning,
        Constraint::ForcedPlayerNotApplied { player, reason },
    ))
}
