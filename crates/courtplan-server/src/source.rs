// Catalog sources: where the raw player, team and fixture snapshot comes from.
//
// `UpstreamClient` fetches it live from the fantasy API on every request.
// `SnapshotSource` reads a directory of CSV files once at start-up and serves
// the same snapshot until the process exits.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use courtplan_core::catalog::{RawPlayer, RawTeam, StatValue};
use courtplan_core::config::UpstreamConfig;
use courtplan_core::fixtures::RawFixture;
use courtplan_core::Snapshot;

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn snapshot(&self) -> anyhow::Result<Snapshot>;
}

/// Pick the source the config asks for: the CSV snapshot when
/// `snapshot_dir` is set, the live API otherwise.
pub fn from_config(config: &UpstreamConfig) -> anyhow::Result<Arc<dyn CatalogSource>> {
    match &config.snapshot_dir {
        Some(dir) => {
            let source = SnapshotSource::load(Path::new(dir))
                .with_context(|| format!("failed to load snapshot from {dir}"))?;
            Ok(Arc::new(source))
        }
        None => Ok(Arc::new(UpstreamClient::new(config)?)),
    }
}

// ---------------------------------------------------------------------------
// Live upstream
// ---------------------------------------------------------------------------

/// The parts of `bootstrap-static` the optimizer needs.
#[derive(Debug, Deserialize)]
struct BootstrapStatic {
    elements: Vec<RawPlayer>,
    teams: Vec<RawTeam>,
}

pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("courtplan/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(UpstreamClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> anyhow::Result<T> {
        let url = format!("{}/{endpoint}/", self.base_url);
        debug!(%url, "fetching upstream");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned an error status"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode response from {url}"))
    }
}

#[async_trait]
impl CatalogSource for UpstreamClient {
    async fn snapshot(&self) -> anyhow::Result<Snapshot> {
        let (bootstrap, fixtures) = tokio::try_join!(
            self.get_json::<BootstrapStatic>("bootstrap-static"),
            self.get_json::<Vec<RawFixture>>("fixtures"),
        )?;
        info!(
            players = bootstrap.elements.len(),
            teams = bootstrap.teams.len(),
            fixtures = fixtures.len(),
            "fetched upstream snapshot"
        );
        Ok(Snapshot {
            players: bootstrap.elements,
            teams: bootstrap.teams,
            fixtures,
        })
    }
}

// ---------------------------------------------------------------------------
// CSV snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("validation error: {0}")]
    Validation(String),
}

/// A snapshot held in memory and handed out unchanged on every request.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        SnapshotSource { snapshot }
    }

    /// Load `players.csv`, `teams.csv` and `fixtures.csv` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, SnapshotError> {
        let snapshot = load_snapshot(dir)?;
        info!(
            dir = %dir.display(),
            players = snapshot.players.len(),
            teams = snapshot.teams.len(),
            fixtures = snapshot.fixtures.len(),
            "loaded CSV snapshot"
        );
        Ok(SnapshotSource { snapshot })
    }
}

#[async_trait]
impl CatalogSource for SnapshotSource {
    async fn snapshot(&self) -> anyhow::Result<Snapshot> {
        Ok(self.snapshot.clone())
    }
}

/// players.csv row. Stats stay as text so the catalog parses them the same
/// way it parses the API's decimal strings.
#[derive(Debug, Deserialize)]
struct PlayerRow {
    id: u32,
    element_type: u8,
    team: u32,
    now_cost: u32,
    #[serde(default)]
    points_per_game: String,
    #[serde(default)]
    form: String,
    #[serde(default)]
    status: String,
    web_name: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    second_name: String,
}

impl From<PlayerRow> for RawPlayer {
    fn from(row: PlayerRow) -> Self {
        RawPlayer {
            id: row.id,
            element_type: row.element_type,
            team: row.team,
            now_cost: row.now_cost,
            points_per_game: StatValue::Text(row.points_per_game),
            form: StatValue::Text(row.form),
            status: row.status,
            web_name: row.web_name,
            first_name: row.first_name,
            second_name: row.second_name,
        }
    }
}

/// Deserialize every well-formed row, skipping the rest with a warning.
fn rows_from_reader<R: Read, T: DeserializeOwned>(rdr: R, kind: &str) -> Result<Vec<T>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) if e.is_io_error() => return Err(e),
            Err(e) => warn!("skipping malformed {} row: {}", kind, e),
        }
    }
    Ok(rows)
}

fn players_from_reader<R: Read>(rdr: R) -> Result<Vec<RawPlayer>, csv::Error> {
    let rows: Vec<PlayerRow> = rows_from_reader(rdr, "player")?;
    Ok(rows.into_iter().map(RawPlayer::from).collect())
}

fn teams_from_reader<R: Read>(rdr: R) -> Result<Vec<RawTeam>, csv::Error> {
    rows_from_reader(rdr, "team")
}

fn fixtures_from_reader<R: Read>(rdr: R) -> Result<Vec<RawFixture>, csv::Error> {
    rows_from_reader(rdr, "fixture")
}

fn load_file<T>(
    path: &Path,
    load: fn(std::fs::File) -> Result<Vec<T>, csv::Error>,
) -> Result<Vec<T>, SnapshotError> {
    let file = std::fs::File::open(path).map_err(|e| SnapshotError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load(file).map_err(|e| SnapshotError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Read a full snapshot from a directory of CSV files. An empty players or
/// teams file is an error; an empty fixtures file is not.
pub fn load_snapshot(dir: &Path) -> Result<Snapshot, SnapshotError> {
    let players = load_file(&dir.join("players.csv"), players_from_reader)?;
    let teams = load_file(&dir.join("teams.csv"), teams_from_reader)?;
    let fixtures = load_file(&dir.join("fixtures.csv"), fixtures_from_reader)?;

    if players.is_empty() {
        return Err(SnapshotError::Validation(format!(
            "no players found in {}",
            dir.join("players.csv").display()
        )));
    }
    if teams.is_empty() {
        return Err(SnapshotError::Validation(format!(
            "no teams found in {}",
            dir.join("teams.csv").display()
        )));
    }

    Ok(Snapshot {
        players,
        teams,
        fixtures,
    })
}
