mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use rollcall_api::auth::AppStateInner;
use rollcall_api::build_router;
use rollcall_db::Database;
use rollcall_sync::{Engine, EngineConfig, SqliteAttendanceStore};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall=debug,rollcall_sync=debug,rollcall_sources=debug,rollcall_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    let store = Arc::new(SqliteAttendanceStore::new(db));
    info!("Attendance store at {}", config.db_path.display());

    let engine = Engine::new(
        store,
        EngineConfig {
            refresh_interval: config.refresh_interval,
            max_pages: config.max_pages,
        },
    );

    // Register and start polling every configured event
    let http = reqwest::Client::new();
    for event in &config.events {
        let source = config.build_source(&event.source, &http)?;
        engine.register(&event.id, source)?;
        engine.start(&event.id)?;
    }
    if config.events.is_empty() {
        info!("No events configured (set ROLLCALL_EVENTS)");
    }

    let state = AppStateInner::new(engine.clone(), config.operator_key.clone());
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Rollcall listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await;

    engine.shutdown();
    if let Err(e) = &served {
        error!("Server error: {}", e);
    }
    served?;

    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then cancels `token` so open live streams
/// end and the server can drain.
async fn shutdown_signal(token: CancellationToken) {
    wait_for_signal().await;
    token.cancel();
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
