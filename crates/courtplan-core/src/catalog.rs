// Player catalog: normalizes raw upstream player and team metadata.
//
// Upstream delivers `form` and `points_per_game` as decimal strings ("45.3")
// while costs are already integer tenths. Everything is converted to i64
// fixed-point tenths here so no floating point leaks into the optimizer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OptimizeError, Stage};

pub type PlayerId = u32;
pub type TeamId = u32;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// The two court roles a player can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    #[serde(rename = "Back Court")]
    BackCourt,
    #[serde(rename = "Front Court")]
    FrontCourt,
}

impl Position {
    pub const ALL: [Position; 2] = [Position::BackCourt, Position::FrontCourt];

    /// Map the upstream `element_type` field to a position.
    pub fn from_element_type(element_type: u8) -> Option<Self> {
        match element_type {
            1 => Some(Position::BackCourt),
            2 => Some(Position::FrontCourt),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::BackCourt => "Back Court",
            Position::FrontCourt => "Front Court",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Position::BackCourt => 0,
            Position::FrontCourt => 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Availability status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "a")]
    Available,
    #[serde(rename = "i")]
    Injured,
    #[serde(rename = "d")]
    Doubtful,
    #[serde(rename = "u")]
    Unknown,
}

impl Status {
    /// Anything other than the four upstream codes reads as `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "a" => Status::Available,
            "i" => Status::Injured,
            "d" => Status::Doubtful,
            _ => Status::Unknown,
        }
    }

    /// Whether a player with this status may be put in a starting lineup.
    pub fn can_start(&self) -> bool {
        !matches!(self, Status::Injured)
    }
}

// ---------------------------------------------------------------------------
// Raw upstream shapes
// ---------------------------------------------------------------------------

/// A scoring stat as upstream sends it: usually a decimal string, sometimes
/// a bare number.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Text(String),
    Number(f64),
}

impl Default for StatValue {
    fn default() -> Self {
        StatValue::Number(0.0)
    }
}

impl StatValue {
    /// Convert to fixed-point tenths. Returns `None` for non-numeric,
    /// non-finite, or values whose tenths do not fit in an `i64`. Empty
    /// strings are zero.
    pub fn to_tenths(&self) -> Option<i64> {
        let value = match self {
            StatValue::Text(s) if s.trim().is_empty() => 0.0,
            StatValue::Text(s) => s.trim().parse::<f64>().ok()?,
            StatValue::Number(n) => *n,
        };
        let tenths = (value * 10.0).round();
        // `as` saturates, so range-check first. i64::MAX is not exact in f64.
        if !tenths.is_finite() || tenths.abs() >= i64::MAX as f64 {
            return None;
        }
        Some(tenths as i64)
    }
}

/// One entry of the upstream `elements` array. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPlayer {
    pub id: PlayerId,
    pub element_type: u8,
    pub team: TeamId,
    pub now_cost: u32,
    #[serde(default)]
    pub points_per_game: StatValue,
    #[serde(default)]
    pub form: StatValue,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub second_name: String,
}

/// One entry of the upstream `teams` array.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTeam {
    pub id: TeamId,
    pub name: String,
    pub short_name: String,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team: TeamId,
    pub team_short: String,
    pub position: Position,
    /// Current price in tenths.
    pub cost: i64,
    /// Trailing-window average, tenths.
    pub form: i64,
    /// Season average, tenths.
    pub points_per_game: i64,
    pub status: Status,
}

/// Immutable per-request snapshot of every player and team.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    players: BTreeMap<PlayerId, Player>,
    teams: BTreeMap<TeamId, Team>,
}

impl Catalog {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.get(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    /// All players in ascending id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Build the catalog from raw upstream data.
///
/// Rejects duplicate player or team ids, players on unknown teams, unknown
/// `element_type` values, and stats that do not parse as finite decimals.
pub fn build_catalog(raw_players: &[RawPlayer], raw_teams: &[RawTeam]) -> Result<Catalog, OptimizeError> {
    let mut teams = BTreeMap::new();
    for raw in raw_teams {
        let team = Team {
            id: raw.id,
            name: raw.name.trim().to_string(),
            short_name: raw.short_name.trim().to_string(),
        };
        if teams.insert(raw.id, team).is_some() {
            return Err(OptimizeError::validation(
                Stage::Catalog,
                format!("duplicate team id {}", raw.id),
            ));
        }
    }

    let mut players = BTreeMap::new();
    for raw in raw_players {
        let team = teams.get(&raw.team).ok_or_else(|| {
            OptimizeError::validation(
                Stage::Catalog,
                format!("player {} references unknown team {}", raw.id, raw.team),
            )
        })?;
        let position = Position::from_element_type(raw.element_type).ok_or_else(|| {
            OptimizeError::validation(
                Stage::Catalog,
                format!(
                    "player {} has unknown element_type {}",
                    raw.id, raw.element_type
                ),
            )
        })?;
        let form = raw.form.to_tenths().ok_or_else(|| {
            OptimizeError::validation(
                Stage::Catalog,
                format!("player {} has non-numeric or out-of-range form {:?}", raw.id, raw.form),
            )
        })?;
        let points_per_game = raw.points_per_game.to_tenths().ok_or_else(|| {
            OptimizeError::validation(
                Stage::Catalog,
                format!(
                    "player {} has non-numeric or out-of-range points_per_game {:?}",
                    raw.id, raw.points_per_game
                ),
            )
        })?;

        let player = Player {
            id: raw.id,
            name: display_name(raw),
            team: raw.team,
            team_short: team.short_name.clone(),
            position,
            cost: i64::from(raw.now_cost),
            form,
            points_per_game,
            status: Status::from_code(&raw.status),
        };
        if players.insert(raw.id, player).is_some() {
            return Err(OptimizeError::validation(
                Stage::Catalog,
                format!("duplicate player id {}", raw.id),
            ));
        }
    }

    Ok(Catalog { players, teams })
}

/// Prefer the short web name, falling back to the full name, then the id.
fn display_name(raw: &RawPlayer) -> String {
    let web = raw.web_name.trim();
    if !web.is_empty() {
        return web.to_string();
    }
    let full = format!("{} {}", raw.first_name.trim(), raw.second_name.trim());
    let full = full.trim();
    if full.is_empty() {
        format!("#{}", raw.id)
    } else {
        full.to_string()
    }
}
