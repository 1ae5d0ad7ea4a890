use std::{str::FromStr, time::Duration};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use thiserror::Error;

mod activities;
pub mod seed;

pub use activities::{ActivityError, ActivityRepository};
pub use seed::{sample_activities, seed_activities, SeedOutcome};

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Top-level database handle that owns the SQLite connection pool.
///
/// Created once at startup and cloned into every collaborator that needs
/// store access.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Builds a lazily connecting pool for the provided connection string.
    ///
    /// Only an unparsable connection string is rejected here. Whether the
    /// store is reachable is discovered by the first operation, typically
    /// [`Database::run_migrations`].
    pub fn open(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StorageError::InvalidUrl)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    ///
    /// Already applied versions are skipped, so running this against a
    /// current schema is a no-op.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle to the `activities` table.
    pub fn activities(&self) -> ActivityRepository {
        ActivityRepository::new(self.pool.clone())
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// General storage level errors.
///
/// Both variants mean the store could not be brought into a usable state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid database url: {0}")]
    InvalidUrl(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
}

/// Drops the sub-millisecond digits that the `date` column cannot hold.
fn stored_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(3)
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn schema_snapshot(db: &Database) -> Vec<(String, Option<String>)> {
        sqlx::query_as(
            "SELECT name, sql FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("read schema")
    }

    #[tokio::test]
    async fn migrations_apply() {
        let db = Database::open("sqlite::memory:").expect("open");
        db.run_migrations().await.expect("migrations");

        let tables: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'activities'",
        )
        .fetch_one(db.pool())
        .await
        .expect("fetch tables");
        assert_eq!(tables.0, 1, "expected activities table to be created");
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Database::open("sqlite::memory:").expect("open");
        db.run_migrations().await.expect("first run");
        let before = schema_snapshot(&db).await;
        let (applied_before,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(db.pool())
            .await
            .expect("count migrations");

        db.run_migrations().await.expect("second run");
        let after = schema_snapshot(&db).await;
        let (applied_after,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(db.pool())
            .await
            .expect("count migrations");

        assert_eq!(before, after);
        assert_eq!(applied_before, applied_after);
    }

    #[tokio::test]
    async fn migrations_fail_when_history_diverges() {
        let db = Database::open("sqlite::memory:").expect("open");
        db.run_migrations().await.expect("migrations");
        sqlx::query("UPDATE _sqlx_migrations SET checksum = X'00'")
            .execute(db.pool())
            .await
            .expect("tamper checksum");

        let err = db.run_migrations().await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Migration(MigrateError::VersionMismatch(_))
        ));
    }

    #[tokio::test]
    async fn migrations_fail_when_store_unreachable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join("reactivities.db");
        let db = Database::open(&format!("sqlite://{}", path.display())).expect("open is lazy");

        let err = db.run_migrations().await.unwrap_err();
        assert!(matches!(err, StorageError::Migration(_)));
    }

    #[test]
    fn open_rejects_invalid_url() {
        let err = Database::open("sqlite://reactivities.db?mode=bogus").err();
        assert!(matches!(err, Some(StorageError::InvalidUrl(_))));
    }

    #[test]
    fn rfc3339_uses_millis_and_zulu() {
        let value = DateTime::parse_from_rfc3339("2024-02-03T04:05:06.789123Z")
            .expect("parse")
            .with_timezone(&Utc);
        assert_eq!(to_rfc3339(value), "2024-02-03T04:05:06.789Z");
        assert_eq!(to_rfc3339(stored_precision(value)), to_rfc3339(value));
        assert_eq!(stored_precision(value).timestamp_subsec_nanos(), 789_000_000);
    }
}
