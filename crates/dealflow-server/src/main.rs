//! Dealflow Server: application entry point.
//!
//! Connects to SurrealDB, applies migrations, and builds the deal service
//! with the configured stage catalog.

use std::error::Error;

use dealflow_db::repository::{
    SurrealActivityRepository, SurrealDealRepository, SurrealPipelineStageRepository,
};
use dealflow_db::{DbConfig, DbManager};
use dealflow_engine::{DealService, EngineConfig, StageCatalog};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

const STAGE_CATALOG_ENV: &str = "DEALFLOW_STAGE_CATALOG";

fn load_catalog() -> Result<StageCatalog, Box<dyn Error>> {
    let Ok(path) = std::env::var(STAGE_CATALOG_ENV) else {
        return Ok(StageCatalog::builtin());
    };
    let raw = std::fs::read_to_string(&path)?;
    let catalog = StageCatalog::from_json(&raw)?;
    info!(
        path = %path,
        version = catalog.version,
        stages = catalog.default_stages.len(),
        "Loaded stage catalog"
    );
    Ok(catalog)
}

async fn run() -> Result<(), Box<dyn Error>> {
    let db_config = DbConfig::from_env();
    let manager = DbManager::connect(&db_config).await?;
    let db = manager.client().clone();
    dealflow_db::run_migrations(&db).await?;

    let config = EngineConfig::with_catalog(load_catalog()?);
    let _service = DealService::new(
        SurrealDealRepository::new(db.clone()),
        SurrealPipelineStageRepository::new(db.clone()),
        SurrealActivityRepository::new(db),
        config,
    )?;
    info!("Dealflow engine ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::from_default_env().add_directive(
        "dealflow=info"
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into()),
    );
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting Dealflow server...");
    if let Err(e) = run().await {
        error!(error = %e, "Dealflow server failed");
        std::process::exit(1);
    }
    info!("Dealflow server stopped.");
}
