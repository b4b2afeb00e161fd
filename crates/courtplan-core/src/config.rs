// Configuration loading and parsing (league.toml, server.toml).

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::catalog::Position;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("could not seed config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueRules,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// league.toml holds a single `[league]` table.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueRules,
}

/// A value kept separately for each court position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PerPosition<T> {
    pub back_court: T,
    pub front_court: T,
}

impl<T: Copy> PerPosition<T> {
    pub fn get(&self, position: Position) -> T {
        match position {
            Position::BackCourt => self.back_court,
            Position::FrontCourt => self.front_court,
        }
    }
}

/// Inclusive bounds on how many squad members may hold a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Quota {
    pub min: usize,
    pub max: usize,
}

/// Game rules the optimizer works under. All money and points are tenths.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LeagueRules {
    pub name: String,
    pub squad_size: usize,
    pub salary_cap: i64,
    pub lineup_size: usize,
    pub captain_multiplier: i64,
    /// Points deducted per transfer beyond the free allowance.
    pub transfer_penalty: i64,
    pub squad_quota: PerPosition<Quota>,
    pub lineup_minimum: PerPosition<usize>,
}

impl Default for LeagueRules {
    fn default() -> Self {
        LeagueRules {
            name: "NBA Fantasy".into(),
            squad_size: 10,
            salary_cap: 1000,
            lineup_size: 5,
            captain_multiplier: 2,
            transfer_penalty: 1000,
            squad_quota: PerPosition {
                back_court: Quota { min: 5, max: 5 },
                front_court: Quota { min: 5, max: 5 },
            },
            lineup_minimum: PerPosition {
                back_court: 2,
                front_court: 2,
            },
        }
    }
}

impl LeagueRules {
    /// Most starters a position may supply while leaving room for every other
    /// position's minimum.
    pub fn lineup_maximum(&self, position: Position) -> usize {
        let others: usize = Position::ALL
            .iter()
            .filter(|&&p| p != position)
            .map(|&p| self.lineup_minimum.get(p))
            .sum();
        self.lineup_size.saturating_sub(others)
    }
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ServerFile {
    server: ServerConfig,
    upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub optimize_timeout_secs: u64,
}

impl ServerConfig {
    pub fn optimize_timeout(&self) -> Duration {
        Duration::from_secs(self.optimize_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// When set, player/team/fixture data is read from CSV files in this
    /// directory instead of the live API.
    #[serde(default)]
    pub snapshot_dir: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Files the server reads from `config/`, each seeded from `defaults/`.
const CONFIG_FILES: [&str; 2] = ["league.toml", "server.toml"];

/// Read and validate `config/league.toml` and `config/server.toml` under
/// `base_dir`. Missing files are an error here; see [`load_config`] for the
/// variant that seeds them first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");
    let LeagueFile { league } = read_toml(&config_dir.join("league.toml"))?;
    let ServerFile { server, upstream } = read_toml(&config_dir.join("server.toml"))?;

    let config = Config {
        league,
        server,
        upstream,
    };
    validate(&config)?;
    Ok(config)
}

/// Seed `config/` with any of the known files it lacks, taken from
/// `defaults/`. Existing files are never overwritten. Returns what was
/// written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(seed_error(format!(
            "{} has no defaults/ to seed config/ from",
            base_dir.display()
        )));
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| seed_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut seeded = Vec::new();
    for name in CONFIG_FILES {
        let source = defaults_dir.join(name);
        let target = config_dir.join(name);
        if !source.is_file() {
            continue;
        }
        let content = std::fs::read(&source)
            .map_err(|e| seed_error(format!("cannot read {}: {e}", source.display())))?;

        // create_new keeps a file written by a concurrent start intact.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                dest.write_all(&content)
                    .map_err(|e| seed_error(format!("cannot write {}: {e}", target.display())))?;
                seeded.push(target);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(seed_error(format!("cannot create {}: {e}", target.display())));
            }
        }
    }
    Ok(seeded)
}

/// Load config relative to the working directory, seeding defaults first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir()
        .map_err(|e| seed_error(format!("cannot resolve working directory: {e}")))?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

fn seed_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check league rules for internal consistency.
pub fn validate_rules(rules: &LeagueRules) -> Result<(), ConfigError> {
    if rules.squad_size == 0 {
        return Err(invalid("league.squad_size", "must be greater than 0"));
    }
    if rules.salary_cap <= 0 {
        return Err(invalid("league.salary_cap", "must be greater than 0"));
    }
    if rules.lineup_size == 0 || rules.lineup_size > rules.squad_size {
        return Err(invalid(
            "league.lineup_size",
            format!(
                "must be between 1 and squad_size ({}), got {}",
                rules.squad_size, rules.lineup_size
            ),
        ));
    }
    if rules.captain_multiplier < 1 {
        return Err(invalid(
            "league.captain_multiplier",
            format!("must be >= 1, got {}", rules.captain_multiplier),
        ));
    }
    if rules.transfer_penalty < 0 {
        return Err(invalid(
            "league.transfer_penalty",
            format!("must be >= 0, got {}", rules.transfer_penalty),
        ));
    }

    let mut min_total = 0;
    let mut max_total = 0;
    for position in Position::ALL {
        let quota = rules.squad_quota.get(position);
        if quota.min > quota.max {
            return Err(invalid(
                &format!("league.squad_quota.{}", position_key(position)),
                format!("min ({}) must not exceed max ({})", quota.min, quota.max),
            ));
        }
        min_total += quota.min;
        max_total += quota.max;
    }
    if min_total > rules.squad_size || max_total < rules.squad_size {
        return Err(invalid(
            "league.squad_quota",
            format!(
                "quotas allow between {min_total} and {max_total} players but squad_size is {}",
                rules.squad_size
            ),
        ));
    }

    let lineup_min_total: usize = Position::ALL
        .iter()
        .map(|&p| rules.lineup_minimum.get(p))
        .sum();
    if lineup_min_total > rules.lineup_size {
        return Err(invalid(
            "league.lineup_minimum",
            format!(
                "minimums total {lineup_min_total} but lineup_size is {}",
                rules.lineup_size
            ),
        ));
    }

    Ok(())
}

fn position_key(position: Position) -> &'static str {
    match position {
        Position::BackCourt => "back_court",
        Position::FrontCourt => "front_court",
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_rules(&config.league)?;

    if config.server.optimize_timeout_secs == 0 {
        return Err(invalid("server.optimize_timeout_secs", "must be > 0"));
    }
    if config.upstream.request_timeout_secs == 0 {
        return Err(invalid("upstream.request_timeout_secs", "must be > 0"));
    }
    if config.upstream.base_url.trim().is_empty() && config.upstream.snapshot_dir.is_none() {
        return Err(invalid(
            "upstream.base_url",
            "must be set when no snapshot_dir is configured",
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
