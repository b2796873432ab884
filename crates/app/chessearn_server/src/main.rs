//! ChessEarn API server binary.
//!
//! Loads configuration from the environment (and `.env`), migrates the
//! database, starts the revocation pruner and serves the HTTP API until
//! Ctrl-C.

use std::net::SocketAddr;
use std::time::Duration;

use chessearn_api::config::ApiConfig;
use chessearn_api::maintenance::start_revocation_pruner;
use chessearn_api::{AppState, router};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server. Flags override environment config.
#[derive(Parser, Debug)]
#[command(name = "chessearn_server", about = "ChessEarn API server")]
struct Args {
    /// Address to listen on, e.g. `0.0.0.0:5000`.
    #[arg(long, env = "BIND_ADDR")]
    bind: Option<String>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 10)]
    max_connections: u32,

    /// Skip running migrations at startup.
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutdown requested");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "info,chessearn_api=debug,chessearn_core=debug",
                )
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!(
        bind = %config.bind_addr,
        environment = ?config.environment,
        max_connections = args.max_connections,
        "starting chessearn_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    if args.skip_migrations {
        warn!("skipping database migrations");
    } else {
        info!("running database migrations");
        chessearn_api::migrate(&pool).await?;
    }

    let state = AppState::with_postgres(config.clone(), pool);
    let shutdown = CancellationToken::new();

    let pruner = start_revocation_pruner(
        state.ledger.clone(),
        state.login_limiter.clone(),
        Duration::from_secs(config.prune_interval_secs.max(1)),
        chrono::Duration::days(config.revocation_retention_days),
        shutdown.clone(),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    tokio::spawn(shutdown_signal(shutdown.clone()));

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move { shutdown.cancelled().await }
        })
        .await;

    // Stop the pruner whether the server exited cleanly or not.
    shutdown.cancel();
    let _ = pruner.await;

    serve_result?;
    info!("server stopped");
    Ok(())
}
