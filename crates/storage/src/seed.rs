//! Sample data written into a fresh store.

use chrono::{DateTime, Months, Utc};

use reactivities_core::types::NewActivity;

use crate::{ActivityError, Database};

/// Result of a seed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The table already held data; nothing was written.
    AlreadyPopulated,
    Inserted(usize),
}

/// Builds the sample activities relative to `now`.
pub fn sample_activities(now: DateTime<Utc>) -> Vec<NewActivity> {
    vec![
        NewActivity {
            title: "Past Activity 1".to_string(),
            date: now - Months::new(2),
            description: "Activity 2 months ago".to_string(),
            category: "drinks".to_string(),
            city: "London".to_string(),
            venue: "Pub".to_string(),
        },
        NewActivity {
            title: "Past Activity 2".to_string(),
            date: now - Months::new(1),
            description: "Activity 1 month ago".to_string(),
            category: "culture".to_string(),
            city: "Paris".to_string(),
            venue: "Louvre".to_string(),
        },
    ]
}

/// Inserts the sample activities when the `activities` table is empty.
pub async fn seed_activities(
    database: &Database,
    now: DateTime<Utc>,
) -> Result<SeedOutcome, ActivityError> {
    let repo = database.activities();
    if repo.has_any().await? {
        return Ok(SeedOutcome::AlreadyPopulated);
    }

    let inserted = repo.add_range(sample_activities(now)).await?;
    Ok(SeedOutcome::Inserted(inserted.len()))
}
