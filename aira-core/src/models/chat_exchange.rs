use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    pub id: i64,
    pub session_id: String,
    pub model_identifier: String,
    pub prompt: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub response_time_ms: i32,
}

/// Fields supplied by the caller when logging an exchange.
#[derive(Debug, Clone)]
pub struct NewChatExchange {
    pub session_id: String,
    pub model_identifier: String,
    pub prompt: String,
    pub response: String,
    pub response_time_ms: i32,
}
