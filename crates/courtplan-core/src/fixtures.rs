// Fixture participation index: how many games each team plays on each
// gameday of the requested horizon.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::TeamId;
use crate::error::{OptimizeError, Stage};

pub type Gameday = u32;

/// One entry of the upstream fixtures list. `event` is null for fixtures
/// that have not been scheduled into a gameday yet.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFixture {
    #[serde(default)]
    pub id: u32,
    pub event: Option<Gameday>,
    pub team_h: TeamId,
    pub team_a: TeamId,
}

/// Per-team, per-gameday fixture counts over a fixed horizon.
#[derive(Debug, Clone, Default)]
pub struct FixtureIndex {
    gamedays: Vec<Gameday>,
    counts: HashMap<TeamId, HashMap<Gameday, u32>>,
}

impl FixtureIndex {
    /// Number of fixtures `team` plays on `gameday`. Anything missing from
    /// the index, including gamedays outside the horizon, is zero.
    pub fn count(&self, team: TeamId, gameday: Gameday) -> u32 {
        self.counts
            .get(&team)
            .and_then(|days| days.get(&gameday))
            .copied()
            .unwrap_or(0)
    }

    /// Total fixtures for `team` across the horizon.
    pub fn horizon_count(&self, team: TeamId) -> u32 {
        self.counts
            .get(&team)
            .map(|days| days.values().sum())
            .unwrap_or(0)
    }

    pub fn gamedays(&self) -> &[Gameday] {
        &self.gamedays
    }
}

/// Build the index for the given horizon.
///
/// Fixtures outside the horizon or without a gameday are ignored. A fixture
/// listing the same team on both sides is rejected.
pub fn build_fixture_index(raw_fixtures: &[RawFixture], gamedays: &[Gameday]) -> Result<FixtureIndex, OptimizeError> {
    let horizon: BTreeSet<Gameday> = gamedays.iter().copied().collect();
    let mut counts: HashMap<TeamId, HashMap<Gameday, u32>> = HashMap::new();

    for fixture in raw_fixtures {
        if fixture.team_h == fixture.team_a {
            return Err(OptimizeError::validation(
                Stage::Fixtures,
                format!(
                    "fixture {} lists team {} as both home and away",
                    fixture.id, fixture.team_h
                ),
            ));
        }
        let Some(event) = fixture.event else {
            continue;
        };
        if !horizon.contains(&event) {
            continue;
        }
        for team in [fixture.team_h, fixture.team_a] {
            *counts.entry(team).or_default().entry(event).or_insert(0) += 1;
        }
    }

    Ok(FixtureIndex {
        gamedays: gamedays.to_vec(),
        counts,
    })
}
