use std::sync::Arc;

use anyhow::Context;

use anamnesis::config::IntakeConfig;
use anamnesis::server::sessions::EVICTION_INTERVAL;
use anamnesis::server::{AppState, app_routes};
use anamnesis::store::{LibSqlStore, MemoryStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = IntakeConfig::from_env().context("Invalid configuration")?;

    eprintln!("Anamnesis v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://{}", config.bind);
    eprintln!("   Policy: {}", config.advance_policy);
    eprintln!("   Database: {}", config.db_path);

    // ── Store ───────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = if config.db_path == ":memory:" {
        Arc::new(MemoryStore::new())
    } else {
        let path = std::path::Path::new(&config.db_path);
        Arc::new(
            LibSqlStore::new_local(path)
                .await
                .with_context(|| format!("Failed to open database at {}", config.db_path))?,
        )
    };

    // ── Services + HTTP ─────────────────────────────────────────────────
    let state = AppState::from_config(&config, store)?;
    state
        .sessions
        .clone()
        .spawn_eviction(EVICTION_INTERVAL, config.session_idle_timeout);
    let app = app_routes(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, "Intake server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
