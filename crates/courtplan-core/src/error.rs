// Error taxonomy for the optimization pipeline.
//
// Every error carries the pipeline stage that raised it so that upstream data
// problems (unknown team ids, stale fixture lists) can be traced back to the
// component that rejected them.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::catalog::{PlayerId, Position};

// ---------------------------------------------------------------------------
// Stage attribution
// ---------------------------------------------------------------------------

/// The pipeline component an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Request,
    Catalog,
    Fixtures,
    Scoring,
    Selection,
    Planning,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Request => "request",
            Stage::Catalog => "catalog",
            Stage::Fixtures => "fixtures",
            Stage::Scoring => "scoring",
            Stage::Selection => "selection",
            Stage::Planning => "planning",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Violated constraints
// ---------------------------------------------------------------------------

/// A specific constraint that made a request (or a single swap) infeasible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// More forced players than roster slots.
    ForceIncludeExceedsRoster { count: usize, squad_size: usize },
    /// The same players appear in both force-include and force-exclude.
    ForceOverlap { players: Vec<PlayerId> },
    /// Forced players of one position exceed that position's maximum.
    PositionQuota {
        position: Position,
        forced: usize,
        max: usize,
    },
    /// Forced players alone cost more than the salary cap.
    ForcedCostExceedsCap { forced_cost: i64, salary_cap: i64 },
    /// No squad satisfies the quotas within the budget.
    NoFeasibleSquad { salary_cap: i64 },
    /// A swap would push the squad's total cost above the cap.
    SalaryCap { total_cost: i64, salary_cap: i64 },
    /// A forced player could not be moved into or out of the current squad.
    ForcedPlayerNotApplied { player: PlayerId, reason: String },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::ForceIncludeExceedsRoster { count, squad_size } => write!(
                f,
                "force_include lists {count} players but the squad holds {squad_size}"
            ),
            Constraint::ForceOverlap { players } => {
                write!(f, "players both forced in and out: {players:?}")
            }
            Constraint::PositionQuota {
                position,
                forced,
                max,
            } => write!(
                f,
                "{forced} forced {position} players exceed the maximum of {max}"
            ),
            Constraint::ForcedCostExceedsCap {
                forced_cost,
                salary_cap,
            } => write!(
                f,
                "forced players cost {forced_cost} which exceeds the salary cap of {salary_cap}"
            ),
            Constraint::NoFeasibleSquad { salary_cap } => write!(
                f,
                "no squad satisfies the position quotas within a salary cap of {salary_cap}"
            ),
            Constraint::SalaryCap {
                total_cost,
                salary_cap,
            } => write!(
                f,
                "squad cost {total_cost} would exceed the salary cap of {salary_cap}"
            ),
            Constraint::ForcedPlayerNotApplied { player, reason } => {
                write!(f, "forced player {player} could not be applied: {reason}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// OptimizeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum OptimizeError {
    /// Malformed or inconsistent input. Fatal for the request.
    #[error("[{stage}] validation failed: {message}")]
    Validation { stage: Stage, message: String },

    /// The constraints cannot be satisfied.
    #[error("[{stage}] infeasible request: {constraint}")]
    Infeasible { stage: Stage, constraint: Constraint },

    /// A single swap cannot be paid for from the bank. Recoverable: the
    /// planner records it and moves on to the next candidate.
    #[error(
        "[planning] insufficient budget to swap {player_out} for {player_in}: short by {shortfall}"
    )]
    InsufficientBudget {
        player_out: PlayerId,
        player_in: PlayerId,
        shortfall: i64,
    },

    /// The optimization exceeded the caller's time budget.
    #[error("optimization exceeded the time budget of {}s", .limit.as_secs())]
    Timeout { limit: Duration },
}

impl OptimizeError {
    pub(crate) fn validation(stage: Stage, message: impl Into<String>) -> Self {
        OptimizeError::Validation {
            stage,
            message: message.into(),
        }
    }

    pub(crate) fn infeasible(stage: Stage, constraint: Constraint) -> Self {
        OptimizeError::Infeasible { stage, constraint }
    }

    /// The stage this error is attributed to. Timeouts belong to no single
    /// stage and report `None`.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            OptimizeError::Validation { stage, .. } | OptimizeError::Infeasible { stage, .. } => {
                Some(*stage)
            }
            OptimizeError::InsufficientBudget { .. } => Some(Stage::Planning),
            OptimizeError::Timeout { .. } => None,
        }
    }

    /// Short machine-readable error kind used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            OptimizeError::Validation { .. } => "validation",
            OptimizeError::Infeasible { .. } => "infeasible",
            OptimizeError::InsufficientBudget { .. } => "insufficient_budget",
            OptimizeError::Timeout { .. } => "timeout",
        }
    }
}
