use std::{fmt, net::SocketAddr, sync::Arc};

use axum::Router;
use chrono::{DateTime, Utc};
use metrics::counter;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use reactivities_storage::{seed_activities, Database, SeedOutcome};

/// Startup stages, visited strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    Init,
    Seed,
    Listen,
    Terminal,
}

/// Outcome of a single bootstrap step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// The step ran and found nothing to do.
    Skipped,
    NotAttempted,
    Failed(String),
}

impl StepOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::NotAttempted => "not_attempted",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(detail) => write!(f, "failed: {detail}"),
            other => f.write_str(other.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub migration: StepOutcome,
    pub seed: StepOutcome,
    pub stage: BootstrapStage,
}

/// Errors that stop the process. Migration and seed failures never do.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to bind HTTP listener: {0}")]
    Bind(std::io::Error),
    #[error("HTTP server terminated with error: {0}")]
    Serve(std::io::Error),
}

/// Runs migrate, seed and listen once per process.
pub struct Bootstrap {
    database: Database,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl Bootstrap {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            clock: Arc::new(Utc::now),
        }
    }

    /// Overrides the clock used to date the seed records.
    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Executes the Init and Seed stages.
    ///
    /// Failures are logged and recorded in the report; the returned stage is
    /// always [`BootstrapStage::Listen`].
    pub async fn prepare(&self) -> BootstrapReport {
        let mut report = BootstrapReport {
            migration: StepOutcome::NotAttempted,
            seed: StepOutcome::NotAttempted,
            stage: BootstrapStage::Init,
        };

        loop {
            report.stage = match report.stage {
                BootstrapStage::Init => {
                    report.migration = self.migrate().await;
                    if report.migration.is_failed() {
                        BootstrapStage::Listen
                    } else {
                        BootstrapStage::Seed
                    }
                }
                BootstrapStage::Seed => {
                    report.seed = self.seed().await;
                    BootstrapStage::Listen
                }
                BootstrapStage::Listen | BootstrapStage::Terminal => break,
            };
        }

        report
    }

    /// Prepares the store, then binds `bind_addr` and serves `app` until the
    /// server stops.
    pub async fn run(
        self,
        bind_addr: SocketAddr,
        app: Router,
    ) -> Result<BootstrapStage, BootstrapError> {
        let report = self.prepare().await;
        info!(
            stage = "bootstrap",
            migration = %report.migration,
            seed = %report.seed,
            "bootstrap finished"
        );

        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(BootstrapError::Bind)?;
        serve(listener, app).await
    }

    async fn migrate(&self) -> StepOutcome {
        let outcome = match self.database.run_migrations().await {
            Ok(()) => StepOutcome::Completed,
            Err(err) => {
                error!(stage = "bootstrap", step = "migrate", error = %err, "an error occurred during migration");
                StepOutcome::Failed(err.to_string())
            }
        };
        counter!("bootstrap_steps_total", "step" => "migrate", "result" => outcome.label())
            .increment(1);
        outcome
    }

    async fn seed(&self) -> StepOutcome {
        let now = (self.clock)();
        let outcome = match seed_activities(&self.database, now).await {
            Ok(SeedOutcome::Inserted(count)) => {
                info!(stage = "bootstrap", step = "seed", inserted = count, "seeded activities");
                StepOutcome::Completed
            }
            Ok(SeedOutcome::AlreadyPopulated) => StepOutcome::Skipped,
            Err(err) => {
                error!(stage = "bootstrap", step = "seed", error = %err, "an error occurred while seeding activities");
                StepOutcome::Failed(err.to_string())
            }
        };
        counter!("bootstrap_steps_total", "step" => "seed", "result" => outcome.label())
            .increment(1);
        outcome
    }
}

/// Serves `app` on an already bound listener until the server stops.
pub async fn serve(listener: TcpListener, app: Router) -> Result<BootstrapStage, BootstrapError> {
    let addr = listener.local_addr().map_err(BootstrapError::Bind)?;
    info!(stage = "app", %addr, "starting HTTP server");

    axum::serve(listener, app)
        .await
        .map_err(BootstrapError::Serve)?;

    info!(stage = "app", "HTTP server stopped");
    Ok(BootstrapStage::Terminal)
}
