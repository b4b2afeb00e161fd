// courtplan entry point.
//
// Startup sequence:
// 1. Initialize tracing (stdout)
// 2. Load config (copying defaults on first run)
// 3. Pick the catalog source (live API or CSV snapshot)
// 4. Serve HTTP until Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use courtplan_core::config;
use courtplan_server::http::{self, AppState};
use courtplan_server::source;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("courtplan starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} players, {} salary cap (tenths)",
        config.league.name, config.league.squad_size, config.league.salary_cap
    );

    // 3. Catalog source
    let source = source::from_config(&config.upstream).context("failed to set up catalog source")?;
    match &config.upstream.snapshot_dir {
        Some(dir) => info!("Serving CSV snapshot from {dir}"),
        None => info!("Fetching live data from {}", config.upstream.base_url),
    }

    // 4. Serve
    let bind = config.server.bind.clone();
    let state = Arc::new(AppState { config, source });
    let app = http::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("Listening on {bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("courtplan shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {e}");
    }
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("courtplan=info,courtplan_core=info,courtplan_server=info,tower_http=info,warn")),
        )
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
