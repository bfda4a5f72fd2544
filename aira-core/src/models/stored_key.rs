use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One encrypted provider key per (session, provider).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredKey {
    pub id: i64,
    pub session_id: String,
    pub provider: String,
    pub encrypted_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
