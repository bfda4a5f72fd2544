use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's pick of the best answer. `session_id` is `None` for anonymous picks.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecord {
    pub id: i64,
    pub session_id: Option<String>,
    pub model_identifier: String,
    pub prompt: String,
    pub response: String,
    pub selected_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWinnerRecord {
    pub session_id: Option<String>,
    pub model_identifier: String,
    pub prompt: String,
    pub response: String,
}
