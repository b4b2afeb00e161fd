// Wire types for the optimize endpoint: request body and result document.
//
// All money and points are integer tenths.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{PlayerId, Position, Status};
use crate::fixtures::Gameday;
use crate::projection::ScoringMetric;
use crate::squad::RawPick;
use crate::transfers::{SkippedSwap, Transfer, TransferState};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OptimizeRequest {
    /// Horizon to optimize over, strictly increasing.
    pub gamedays: Vec<Gameday>,
    #[serde(default)]
    pub picks: Vec<RawPick>,
    #[serde(default)]
    pub transfers: Option<TransferState>,
    #[serde(default)]
    pub force_include: Option<Vec<PlayerId>>,
    #[serde(default)]
    pub force_exclude: Option<Vec<PlayerId>>,
    /// Body copy of the `points_column` query parameter.
    #[serde(default)]
    pub points_column: Option<ScoringMetric>,
}

/// Query string of `POST /optimize`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OptimizeQuery {
    #[serde(default)]
    pub points_column: Option<ScoringMetric>,
}

impl OptimizeQuery {
    /// The metric to score with: query string first, then body, then `form`.
    pub fn metric(&self, request: &OptimizeRequest) -> ScoringMetric {
        self.points_column
            .or(request.points_column)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SquadEntry {
    /// 1-based display slot.
    pub slot: usize,
    pub id: PlayerId,
    pub name: String,
    pub team: String,
    pub position: Position,
    pub cost: i64,
    /// Lineup contribution over the horizon.
    pub points: i64,
    /// Projected score over the horizon, whether or not the player starts.
    pub projected_points: i64,
    pub points_per_game: i64,
    pub form: i64,
    pub games: u32,
    pub status: Status,
    pub selling_price: i64,
    pub purchase_price: i64,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StarterEntry {
    pub id: PlayerId,
    pub name: String,
    pub team: String,
    pub position: Position,
    pub points: i64,
    pub multiplier: i64,
    pub fixtures: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PointsBreakdown {
    pub adjusted_points: i64,
    pub raw_points: i64,
    pub transfer_penalty: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferPlayer {
    pub id: PlayerId,
    pub name: String,
    pub team_short: String,
    pub position: Position,
    pub cost: i64,
    pub points: i64,
}

/// Players moving in and out on one gameday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventTransfers {
    #[serde(rename = "in")]
    pub incoming: Vec<TransferPlayer>,
    #[serde(rename = "out")]
    pub outgoing: Vec<TransferPlayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub total: usize,
    pub free: usize,
    pub penalized: usize,
    pub penalty: i64,
    pub points_gained: i64,
    pub points_lost: i64,
    pub bank_before: i64,
    pub bank_after: i64,
    pub transfers: Vec<Transfer>,
    pub skipped: Vec<SkippedSwap>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationResult {
    pub squad: Vec<SquadEntry>,
    pub daily_starters: BTreeMap<Gameday, Vec<StarterEntry>>,
    pub points: PointsBreakdown,
    pub total_cost: i64,
    pub average_points_per_day: i64,
    pub total_games: u32,
    pub scoring_days: u32,
    pub transfer_summary: TransferSummary,
    pub transfers_by_event: BTreeMap<Gameday, EventTransfers>,
}
