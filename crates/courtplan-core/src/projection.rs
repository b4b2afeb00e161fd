// Scoring projector: projected score per player per gameday.
//
// Projected score = base metric (form or points per game, tenths) times the
// number of fixtures the player's team has that day. No fixture means zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Player, PlayerId};
use crate::error::{OptimizeError, Stage};
use crate::fixtures::{FixtureIndex, Gameday};

/// Which catalog column drives the projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMetric {
    /// Trailing ~30 day average.
    #[default]
    Form,
    /// Season average.
    PointsPerGame,
}

impl ScoringMetric {
    pub fn base_value(&self, player: &Player) -> i64 {
        match self {
            ScoringMetric::Form => player.form,
            ScoringMetric::PointsPerGame => player.points_per_game,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMetric::Form => "form",
            ScoringMetric::PointsPerGame => "points_per_game",
        }
    }
}

/// Project one player's score for a gameday on which the player's team
/// plays `fixture_count` games.
pub fn project_score(player: &Player, metric: ScoringMetric, fixture_count: u32) -> Result<i64, OptimizeError> {
    if fixture_count == 0 {
        return Ok(0);
    }
    metric
        .base_value(player)
        .checked_mul(i64::from(fixture_count))
        .ok_or_else(|| overflow(player.id, metric))
}

/// Largest horizon projection accepted for one player, in tenths. Squad,
/// lineup and knapsack sums stay far from `i64` overflow below it.
pub const MAX_HORIZON_TENTHS: i64 = 1_000_000_000_000;

fn overflow(id: PlayerId, metric: ScoringMetric) -> OptimizeError {
    OptimizeError::validation(
        Stage::Scoring,
        format!(
            "projected {} for player {id} exceeds {MAX_HORIZON_TENTHS} tenths",
            metric.as_str()
        ),
    )
}

// ---------------------------------------------------------------------------
// Projection table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct PlayerProjection {
    scores: Vec<i64>,
    fixtures: Vec<u32>,
    total: i64,
    games: u32,
    can_start: bool,
}

/// Projected scores for every catalog player over the horizon.
#[derive(Debug, Clone, Default)]
pub struct Projections {
    gamedays: Vec<Gameday>,
    metric: ScoringMetric,
    players: BTreeMap<PlayerId, PlayerProjection>,
}

impl Projections {
    pub fn gamedays(&self) -> &[Gameday] {
        &self.gamedays
    }

    pub fn metric(&self) -> ScoringMetric {
        self.metric
    }

    /// Projected score on the gameday at `day` (an index into `gamedays()`).
    pub fn score(&self, id: PlayerId, day: usize) -> i64 {
        self.players
            .get(&id)
            .and_then(|p| p.scores.get(day))
            .copied()
            .unwrap_or(0)
    }

    /// Fixture count on the gameday at `day`.
    pub fn fixtures(&self, id: PlayerId, day: usize) -> u32 {
        self.players
            .get(&id)
            .and_then(|p| p.fixtures.get(day))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of projected scores across the horizon.
    pub fn horizon_total(&self, id: PlayerId) -> i64 {
        self.players.get(&id).map_or(0, |p| p.total)
    }

    /// Number of fixtures across the horizon.
    pub fn horizon_games(&self, id: PlayerId) -> u32 {
        self.players.get(&id).map_or(0, |p| p.games)
    }

    /// Whether the player may be put in a starting lineup at all.
    pub fn can_start(&self, id: PlayerId) -> bool {
        self.players.get(&id).is_some_and(|p| p.can_start)
    }

    /// The value the squad selector maximizes: horizon total for players
    /// who can start, zero for those who cannot.
    pub fn selection_value(&self, id: PlayerId) -> i64 {
        match self.players.get(&id) {
            Some(p) if p.can_start => p.total,
            _ => 0,
        }
    }
}

/// Project every catalog player over the index's horizon.
pub fn project_all(catalog: &Catalog, index: &FixtureIndex, metric: ScoringMetric) -> Result<Projections, OptimizeError> {
    let gamedays = index.gamedays().to_vec();
    let mut players = BTreeMap::new();

    for player in catalog.players() {
        let fixtures: Vec<u32> = gamedays
            .iter()
            .map(|&gd| index.count(player.team, gd))
            .collect();
        let scores = fixtures
            .iter()
            .map(|&count| project_score(player, metric, count))
            .collect::<Result<Vec<i64>, _>>()?;
        let total = scores
            .iter()
            .try_fold(0i64, |acc, &s| acc.checked_add(s))
            .filter(|t| t.abs() <= MAX_HORIZON_TENTHS)
            .ok_or_else(|| overflow(player.id, metric))?;

        players.insert(
            player.id,
            PlayerProjection {
                total,
                games: fixtures.iter().sum(),
                scores,
                fixtures,
                can_start: player.status.can_start(),
            },
        );
    }

    Ok(Projections {
        gamedays,
        metric,
        players,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{build_catalog, RawPlayer, RawTeam, StatValue};
    use crate::fixtures::{build_fixture_index, RawFixture};

    fn raw_player(id: PlayerId, team: u32, form: &str, ppg: &str, status: &str) -> RawPlayer {
        RawPlayer {
            id,
            element_type: 1,
            team,
            now_cost: 50,
            points_per_game: StatValue::Text(ppg.into()),
            form: StatValue::Text(form.into()),
            status: status.into(),
            web_name: format!("P{id}"),
            first_name: String::new(),
            second_name: String::new(),
        }
    }

    fn teams() -> Vec<RawTeam> {
        (1..=3)
            .map(|id| RawTeam {
                id,
                name: format!("Team {id}"),
                short_name: format!("T{id}"),
            })
            .collect()
    }

    fn fixture(event: Gameday, home: u32, away: u32) -> RawFixture {
        RawFixture {
            id: 0,
            event: Some(event),
            team_h: home,
            team_a: away,
        }
    }

    #[test]
    fn zero_fixtures_project_zero() {
        let catalog = build_catalog(&[raw_player(1, 1, "40.0", "35.0", "a")], &teams()).unwrap();
        let player = catalog.player(1).unwrap();
        assert_eq!(project_score(player, ScoringMetric::Form, 0).unwrap(), 0);
        assert_eq!(project_score(player, ScoringMetric::Form, 1).unwrap(), 400);
        assert_eq!(project_score(player, ScoringMetric::PointsPerGame, 1).unwrap(), 350);
    }

    #[test]
    fn double_gameday_doubles_score() {
        let catalog = build_catalog(&[raw_player(1, 1, "40.0", "35.0", "a")], &teams()).unwrap();
        let index = build_fixture_index(&[fixture(2, 1, 2), fixture(2, 3, 1)], &[1, 2]).unwrap();
        let projections = project_all(&catalog, &index, ScoringMetric::Form).unwrap();

        assert_eq!(projections.score(1, 0), 0);
        assert_eq!(projections.score(1, 1), 800);
        assert_eq!(projections.fixtures(1, 1), 2);
        assert_eq!(projections.horizon_total(1), 800);
        assert_eq!(projections.horizon_games(1), 2);
    }

    #[test]
    fn injured_players_have_no_selection_value() {
        let catalog = build_catalog(
            &[
                raw_player(1, 1, "40.0", "35.0", "i"),
                raw_player(2, 1, "40.0", "35.0", "d"),
            ],
            &teams(),
        )
        .unwrap();
        let index = build_fixture_index(&[fixture(1, 1, 2)], &[1]).unwrap();
        let projections = project_all(&catalog, &index, ScoringMetric::PointsPerGame).unwrap();

        assert_eq!(projections.horizon_total(1), 350);
        assert_eq!(projections.selection_value(1), 0);
        assert!(!projections.can_start(1));
        assert_eq!(projections.selection_value(2), 350);
    }

    #[test]
    fn absurd_metric_overflow_is_rejected() {
        let catalog = build_catalog(&[raw_player(1, 1, "1e17", "35.0", "a")], &teams()).unwrap();
        let index = build_fixture_index(&[fixture(1, 1, 2), fixture(1, 1, 3)], &[1]).unwrap();
        let err = project_all(&catalog, &index, ScoringMetric::Form).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Scoring));
    }

    #[test]
    fn absurd_metric_on_a_single_fixture_is_rejected() {
        let catalog = build_catalog(&[raw_player(1, 1, "1e17", "35.0", "a")], &teams()).unwrap();
        let index = build_fixture_index(&[fixture(1, 1, 2)], &[1]).unwrap();
        let err = project_all(&catalog, &index, ScoringMetric::Form).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Scoring));
        assert!(err.to_string().contains("exceeds"));

        // The season average is still fine for the same player.
        let ok = project_all(&catalog, &index, ScoringMetric::PointsPerGame).unwrap();
        assert_eq!(ok.horizon_total(1), 350);
    }

    #[test]
    fn unknown_player_reads_as_zero() {
        let projections = Projections::default();
        assert_eq!(projections.score(77, 0), 0);
        assert_eq!(projections.horizon_total(77), 0);
    }

    #[test]
    fn metric_parses_from_query_strings() {
        let m: ScoringMetric = serde_json::from_str("\"points_per_game\"").unwrap();
        assert_eq!(m, ScoringMetric::PointsPerGame);
        assert_eq!(ScoringMetric::default().as_str(), "form");
    }
}
