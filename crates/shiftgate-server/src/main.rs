//! SHIFTGATE Server — Application entry point.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use shiftgate_db::repository::{
    SurrealAuditRepository, SurrealQuotaRepository, SurrealSessionRepository,
};
use shiftgate_db::{DbConfig, DbManager};
use shiftgate_engine::{GovernanceConfig, GovernanceEngine, MeanEstimator, sweeper};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shiftgate-server", about = "Session and quota governance engine")]
struct Args {
    /// SurrealDB WebSocket address.
    #[arg(long, default_value = "127.0.0.1:8000")]
    db_url: String,

    /// SurrealDB namespace.
    #[arg(long, default_value = "shiftgate")]
    db_namespace: String,

    /// SurrealDB database name.
    #[arg(long, default_value = "main")]
    db_name: String,

    /// SurrealDB root username.
    #[arg(long, default_value = "root")]
    db_user: String,

    /// SurrealDB root password.
    #[arg(long, default_value = "root")]
    db_password: String,

    /// Background sweep interval in seconds.
    #[arg(long, default_value_t = 300)]
    sweep_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("shiftgate=info".parse().unwrap()),
        )
        .json()
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!(error = %e, "SHIFTGATE server failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    tracing::info!("Starting SHIFTGATE server...");

    let db = DbManager::connect(&DbConfig {
        url: args.db_url,
        namespace: args.db_namespace,
        database: args.db_name,
        username: args.db_user,
        password: args.db_password,
    })
    .await?;
    shiftgate_db::run_migrations(db.client()).await?;

    let config = GovernanceConfig {
        sweep_interval_secs: args.sweep_interval_secs,
        ..Default::default()
    };
    let sweep_interval = std::time::Duration::from_secs(config.sweep_interval_secs);

    let estimator = Arc::new(MeanEstimator::new());
    let engine = Arc::new(GovernanceEngine::new(
        SurrealSessionRepository::new(db.client().clone()),
        SurrealQuotaRepository::new(db.client().clone()),
        SurrealAuditRepository::new(db.client().clone()),
        estimator.clone(),
        estimator,
        config,
    ));

    let sweeper = sweeper::spawn(engine, sweep_interval);

    tracing::info!("SHIFTGATE server running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    sweeper.shutdown().await;

    tracing::info!("SHIFTGATE server stopped.");
    Ok(())
}
