mod activities;
mod bootstrap;
mod problem;
mod router;
mod telemetry;

use tracing::info;
use reactivities_storage::Database;
use reactivities_util::{load_env_file, AppConfig};

use crate::bootstrap::Bootstrap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::open(&config.database_url)?;
    let state = router::AppState::new(metrics, database.clone());

    info!(stage = "app", addr = %config.bind_addr, env = %config.environment.as_str(), "bootstrapping");
    Bootstrap::new(database)
        .run(config.bind_addr, router::app_router(state))
        .await?;
    Ok(())
}
