use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted activity record.
///
/// The identifier is assigned by the storage layer when the record is first
/// written and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: String,
    /// Free-form label such as `drinks` or `culture`.
    pub category: String,
    pub city: String,
    pub venue: String,
}

/// Activity fields supplied by a caller, before an identifier exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub venue: String,
}

impl NewActivity {
    /// Attaches an identifier, producing the persisted representation.
    pub fn into_activity(self, id: String) -> Activity {
        Activity {
            id,
            title: self.title,
            date: self.date,
            description: self.description,
            category: self.category,
            city: self.city,
            venue: self.venue,
        }
    }
}

impl From<Activity> for NewActivity {
    fn from(activity: Activity) -> Self {
        Self {
            title: activity.title,
            date: activity.date,
            description: activity.description,
            category: activity.category,
            city: activity.city,
            venue: activity.venue,
        }
    }
}
