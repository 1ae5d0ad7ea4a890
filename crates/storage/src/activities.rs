use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use reactivities_core::types::{Activity, NewActivity};

use crate::{stored_precision, to_rfc3339};

/// Repository responsible for interacting with the `activities` table.
#[derive(Clone)]
pub struct ActivityRepository {
    pool: SqlitePool,
}

impl ActivityRepository {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns `true` when at least one activity is stored.
    pub async fn has_any(&self) -> Result<bool, ActivityError> {
        let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM activities)")
            .fetch_one(&self.pool)
            .await
            .map_err(ActivityError::Unavailable)?;
        Ok(exists != 0)
    }

    pub async fn count(&self) -> Result<u64, ActivityError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities")
            .fetch_one(&self.pool)
            .await
            .map_err(ActivityError::Unavailable)?;
        Ok(count as u64)
    }

    /// Lists every activity ordered by date, oldest first.
    pub async fn list(&self) -> Result<Vec<Activity>, ActivityError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, title, date, description, category, city, venue \
             FROM activities ORDER BY date ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ActivityError::Unavailable)?;

        Ok(rows.into_iter().map(ActivityRow::into_domain).collect())
    }

    /// Loads a single activity by identifier.
    pub async fn fetch(&self, id: &str) -> Result<Option<Activity>, ActivityError> {
        let row = sqlx::query_as::<_, ActivityRow>(
            "SELECT id, title, date, description, category, city, venue \
             FROM activities WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ActivityError::Unavailable)?;

        Ok(row.map(ActivityRow::into_domain))
    }

    /// Inserts a single activity and returns it with its assigned identifier.
    pub async fn insert(&self, record: NewActivity) -> Result<Activity, ActivityError> {
        insert_row(&self.pool, record)
            .await
            .map_err(ActivityError::Write)
    }

    /// Stages every record inside one transaction and commits it.
    ///
    /// Either all records are persisted or none are.
    pub async fn add_range(
        &self,
        records: Vec<NewActivity>,
    ) -> Result<Vec<Activity>, ActivityError> {
        let mut tx = self.pool.begin().await.map_err(ActivityError::Write)?;

        let mut staged = Vec::with_capacity(records.len());
        for record in records {
            let activity = insert_row(&mut *tx, record)
                .await
                .map_err(ActivityError::Write)?;
            staged.push(activity);
        }

        tx.commit().await.map_err(ActivityError::Write)?;
        Ok(staged)
    }

    /// Replaces every field of an existing activity.
    ///
    /// Returns `None` when no activity carries the identifier.
    pub async fn update(
        &self,
        id: &str,
        mut record: NewActivity,
    ) -> Result<Option<Activity>, ActivityError> {
        record.date = stored_precision(record.date);
        let result = sqlx::query(
            "UPDATE activities \
             SET title = ?, date = ?, description = ?, category = ?, city = ?, venue = ? \
             WHERE id = ?",
        )
        .bind(&record.title)
        .bind(to_rfc3339(record.date))
        .bind(&record.description)
        .bind(&record.category)
        .bind(&record.city)
        .bind(&record.venue)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(ActivityError::Write)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(record.into_activity(id.to_string())))
    }

    /// Removes an activity, returning whether a row was deleted.
    pub async fn delete(&self, id: &str) -> Result<bool, ActivityError> {
        let result = sqlx::query("DELETE FROM activities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ActivityError::Write)?;
        Ok(result.rows_affected() > 0)
    }
}

async fn insert_row<'e, E>(executor: E, mut record: NewActivity) -> Result<Activity, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    record.date = stored_precision(record.date);
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO activities (id, title, date, description, category, city, venue) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&record.title)
    .bind(to_rfc3339(record.date))
    .bind(&record.description)
    .bind(&record.category)
    .bind(&record.city)
    .bind(&record.venue)
    .execute(executor)
    .await?;

    Ok(record.into_activity(id))
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: String,
    title: String,
    date: DateTime<Utc>,
    description: String,
    category: String,
    city: String,
    venue: String,
}

impl ActivityRow {
    fn into_domain(self) -> Activity {
        Activity {
            id: self.id,
            title: self.title,
            date: self.date,
            description: self.description,
            category: self.category,
            city: self.city,
            venue: self.venue,
        }
    }
}

/// Errors raised by the activity repository.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// The store could not be reached or queried.
    #[error("activity store unavailable: {0}")]
    Unavailable(sqlx::Error),
    /// A write or its commit failed; nothing from the write was persisted.
    #[error("failed to write activities: {0}")]
    Write(sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::TimeZone;

    async fn setup_db() -> Database {
        let db = Database::open("sqlite::memory:").expect("open");
        db.run_migrations().await.expect("migrations");
        db
    }

    fn activity(title: &str, day: u32) -> NewActivity {
        NewActivity {
            title: title.to_string(),
            date: Utc.with_ymd_and_hms(2024, 4, day, 18, 30, 0).unwrap(),
            description: format!("{title} description"),
            category: "music".to_string(),
            city: "Lisbon".to_string(),
            venue: "Hall".to_string(),
        }
    }

    #[tokio::test]
    async fn has_any_reflects_table_contents() {
        let db = setup_db().await;
        let repo = db.activities();
        assert!(!repo.has_any().await.expect("query"));

        repo.insert(activity("Concert", 3)).await.expect("insert");
        assert!(repo.has_any().await.expect("query"));
        assert_eq!(repo.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn add_range_assigns_unique_ids() {
        let db = setup_db().await;
        let repo = db.activities();

        let stored = repo
            .add_range(vec![activity("First", 1), activity("Second", 2)])
            .await
            .expect("commit");
        assert_eq!(stored.len(), 2);
        assert_ne!(stored[0].id, stored[1].id);
        assert_eq!(repo.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn add_range_rolls_back_when_any_insert_fails() {
        let db = setup_db().await;
        sqlx::query(
            "CREATE TRIGGER reject_second BEFORE INSERT ON activities \
             WHEN NEW.title = 'Second' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .execute(db.pool())
        .await
        .expect("create trigger");
        let repo = db.activities();

        let err = repo
            .add_range(vec![activity("First", 1), activity("Second", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, ActivityError::Write(_)));
        assert_eq!(repo.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn queries_report_unavailable_when_table_missing() {
        let db = Database::open("sqlite::memory:").expect("open");
        let err = db.activities().has_any().await.unwrap_err();
        assert!(matches!(err, ActivityError::Unavailable(_)));
    }

    #[tokio::test]
    async fn list_orders_by_date() {
        let db = setup_db().await;
        let repo = db.activities();
        repo.insert(activity("Later", 20)).await.expect("insert");
        repo.insert(activity("Earlier", 5)).await.expect("insert");

        let titles: Vec<String> = repo
            .list()
            .await
            .expect("list")
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["Earlier", "Later"]);
    }

    #[tokio::test]
    async fn fetch_update_delete_round() {
        let db = setup_db().await;
        let repo = db.activities();
        let created = repo.insert(activity("Draft", 9)).await.expect("insert");

        let loaded = repo.fetch(&created.id).await.expect("fetch");
        assert_eq!(loaded, Some(created.clone()));

        let mut changes = activity("Final", 10);
        changes.venue = "Park".to_string();
        let updated = repo
            .update(&created.id, changes)
            .await
            .expect("update")
            .expect("activity exists");
        assert_eq!(updated.id, created.id);
        let reloaded = repo.fetch(&created.id).await.expect("fetch").expect("exists");
        assert_eq!(reloaded.title, "Final");
        assert_eq!(reloaded.venue, "Park");

        assert!(repo.delete(&created.id).await.expect("delete"));
        assert!(!repo.delete(&created.id).await.expect("delete again"));
        assert_eq!(repo.fetch(&created.id).await.expect("fetch"), None);
    }

    #[tokio::test]
    async fn returned_activity_matches_stored_precision() {
        let db = setup_db().await;
        let repo = db.activities();
        let mut record = activity("Sunrise run", 1);
        record.date = DateTime::parse_from_rfc3339("2024-05-01T07:30:00.123456Z")
            .expect("parse")
            .with_timezone(&Utc);

        let created = repo.insert(record.clone()).await.expect("insert");
        let fetched = repo.fetch(&created.id).await.expect("fetch").expect("exists");
        assert_eq!(created, fetched);
        assert_eq!(created.date.timestamp_subsec_nanos(), 123_000_000);

        record.date = DateTime::parse_from_rfc3339("2024-05-02T07:30:00.987654Z")
            .expect("parse")
            .with_timezone(&Utc);
        let updated = repo
            .update(&created.id, record)
            .await
            .expect("update")
            .expect("activity exists");
        let refetched = repo.fetch(&created.id).await.expect("fetch").expect("exists");
        assert_eq!(updated, refetched);

        let staged = repo
            .add_range(vec![NewActivity {
                date: Utc.with_ymd_and_hms(2024, 5, 3, 8, 0, 0).unwrap()
                    + chrono::Duration::nanoseconds(555_555),
                ..activity("Batch", 3)
            }])
            .await
            .expect("commit");
        let stored = repo.fetch(&staged[0].id).await.expect("fetch").expect("exists");
        assert_eq!(staged[0], stored);
    }

    #[tokio::test]
    async fn update_returns_none_for_unknown_id() {
        let db = setup_db().await;
        let outcome = db
            .activities()
            .update("missing", activity("Ghost", 1))
            .await
            .expect("update");
        assert!(outcome.is_none());
    }
}
