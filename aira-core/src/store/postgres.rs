use async_trait::async_trait;
use sqlx::PgPool;

use super::Store;
use crate::config::DatabaseConfig;
use crate::db;
use crate::error::Result;
use crate::models::{ChatExchange, NewChatExchange, NewWinnerRecord, StoredKey, WinnerRecord};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with the configured pool size and bring the schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = db::create_pool(config).await?;
        db::migrate(&pool).await?;
        tracing::info!("Connected to PostgreSQL, migrations applied");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_key(
        &self,
        session_id: &str,
        provider: &str,
        encrypted_key: &str,
    ) -> Result<StoredKey> {
        let row = sqlx::query_as::<_, StoredKey>(
            r#"
            INSERT INTO api_keys (session_id, provider, encrypted_key)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id, provider)
            DO UPDATE SET encrypted_key = EXCLUDED.encrypted_key, updated_at = now()
            RETURNING id, session_id, provider, encrypted_key, created_at, updated_at
            "#,
        )
        .bind(session_id)
        .bind(provider)
        .bind(encrypted_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_key(&self, session_id: &str, provider: &str) -> Result<Option<StoredKey>> {
        let row = sqlx::query_as::<_, StoredKey>(
            "SELECT id, session_id, provider, encrypted_key, created_at, updated_at \
             FROM api_keys WHERE session_id = $1 AND provider = $2",
        )
        .bind(session_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_keys(&self, session_id: &str) -> Result<Vec<StoredKey>> {
        let rows = sqlx::query_as::<_, StoredKey>(
            "SELECT id, session_id, provider, encrypted_key, created_at, updated_at \
             FROM api_keys WHERE session_id = $1 ORDER BY provider",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn append_chat_exchange(&self, exchange: NewChatExchange) -> Result<ChatExchange> {
        let row = sqlx::query_as::<_, ChatExchange>(
            r#"
            INSERT INTO chat_history (session_id, model_identifier, prompt, response, response_time_ms)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, session_id, model_identifier, prompt, response, created_at, response_time_ms
            "#,
        )
        .bind(&exchange.session_id)
        .bind(&exchange.model_identifier)
        .bind(&exchange.prompt)
        .bind(&exchange.response)
        .bind(exchange.response_time_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn chat_history(&self, session_id: &str, limit: u32) -> Result<Vec<ChatExchange>> {
        let rows = sqlx::query_as::<_, ChatExchange>(
            "SELECT id, session_id, model_identifier, prompt, response, created_at, response_time_ms \
             FROM chat_history WHERE session_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(session_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn append_winner_record(&self, winner: NewWinnerRecord) -> Result<WinnerRecord> {
        let row = sqlx::query_as::<_, WinnerRecord>(
            r#"
            INSERT INTO winner_selections (session_id, model_identifier, prompt, response)
            VALUES ($1, $2, $3, $4)
            RETURNING id, session_id, model_identifier, prompt, response, selected_at
            "#,
        )
        .bind(&winner.session_id)
        .bind(&winner.model_identifier)
        .bind(&winner.prompt)
        .bind(&winner.response)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn winners(&self, session_id: &str) -> Result<Vec<WinnerRecord>> {
        let rows = sqlx::query_as::<_, WinnerRecord>(
            "SELECT id, session_id, model_identifier, prompt, response, selected_at \
             FROM winner_selections WHERE session_id = $1 \
             ORDER BY selected_at DESC, id DESC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn health(&self) -> Result<String> {
        Ok(db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

// ============================================================================
// Tests: need a live database; skipped otherwise
// ============================================================================
