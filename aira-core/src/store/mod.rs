//! Persistence gateway: encrypted keys, chat history and winner picks,
//! all scoped by session id.
//!
//! [`Store`] has two backends:
//! - **postgres**: [`PgStore`], the production backend
//! - **memory**: [`MemoryStore`], process-local, for development and tests
//!
//! There is no cross-entity transaction and nothing is ever deleted; the
//! history and winner tables grow without bound.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::error::Result;
use crate::models::{ChatExchange, NewChatExchange, NewWinnerRecord, StoredKey, WinnerRecord};

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert the key for (session, provider), or overwrite its ciphertext
    /// and `updated_at` if one exists.
    async fn upsert_key(
        &self,
        session_id: &str,
        provider: &str,
        encrypted_key: &str,
    ) -> Result<StoredKey>;

    async fn get_key(&self, session_id: &str, provider: &str) -> Result<Option<StoredKey>>;

    async fn list_keys(&self, session_id: &str) -> Result<Vec<StoredKey>>;

    async fn append_chat_exchange(&self, exchange: NewChatExchange) -> Result<ChatExchange>;

    /// Newest first, at most `limit` rows.
    async fn chat_history(&self, session_id: &str, limit: u32) -> Result<Vec<ChatExchange>>;

    async fn append_winner_record(&self, winner: NewWinnerRecord) -> Result<WinnerRecord>;

    /// Newest first.
    async fn winners(&self, session_id: &str) -> Result<Vec<WinnerRecord>>;

    /// Liveness check; returns a short backend description.
    async fn health(&self) -> Result<String>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Create the configured store. The Postgres backend connects and applies
/// migrations before returning.
pub async fn create_store(config: &DatabaseConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store: data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store = PgStore::connect(config).await?;
            Ok(Arc::new(store))
        }
    }
}
