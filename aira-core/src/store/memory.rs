use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::Store;
use crate::error::Result;
use crate::models::{ChatExchange, NewChatExchange, NewWinnerRecord, StoredKey, WinnerRecord};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    keys: Vec<StoredKey>,
    history: Vec<ChatExchange>,
    winners: Vec<WinnerRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store with the same semantics as [`super::PgStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn key_count(&self) -> usize {
        self.tables.lock().await.keys.len()
    }

    pub async fn exchange_count(&self) -> usize {
        self.tables.lock().await.history.len()
    }

    pub async fn winner_count(&self) -> usize {
        self.tables.lock().await.winners.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_key(
        &self,
        session_id: &str,
        provider: &str,
        encrypted_key: &str,
    ) -> Result<StoredKey> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if let Some(existing) = tables
            .keys
            .iter_mut()
            .find(|k| k.session_id == session_id && k.provider == provider)
        {
            existing.encrypted_key = encrypted_key.to_string();
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = StoredKey {
            id: tables.next_id(),
            session_id: session_id.to_string(),
            provider: provider.to_string(),
            encrypted_key: encrypted_key.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.keys.push(row.clone());
        Ok(row)
    }

    async fn get_key(&self, session_id: &str, provider: &str) -> Result<Option<StoredKey>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .keys
            .iter()
            .find(|k| k.session_id == session_id && k.provider == provider)
            .cloned())
    }

    async fn list_keys(&self, session_id: &str) -> Result<Vec<StoredKey>> {
        let tables = self.tables.lock().await;
        let mut keys: Vec<StoredKey> = tables
            .keys
            .iter()
            .filter(|k| k.session_id == session_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.provider.cmp(&b.provider));
        Ok(keys)
    }

    async fn append_chat_exchange(&self, exchange: NewChatExchange) -> Result<ChatExchange> {
        let mut tables = self.tables.lock().await;
        let row = ChatExchange {
            id: tables.next_id(),
            session_id: exchange.session_id,
            model_identifier: exchange.model_identifier,
            prompt: exchange.prompt,
            response: exchange.response,
            created_at: Utc::now(),
            response_time_ms: exchange.response_time_ms,
        };
        tables.history.push(row.clone());
        Ok(row)
    }

    async fn chat_history(&self, session_id: &str, limit: u32) -> Result<Vec<ChatExchange>> {
        let tables = self.tables.lock().await;
        // Rows are appended in id order, so reverse iteration is newest first.
        Ok(tables
            .history
            .iter()
            .rev()
            .filter(|e| e.session_id == session_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn append_winner_record(&self, winner: NewWinnerRecord) -> Result<WinnerRecord> {
        let mut tables = self.tables.lock().await;
        let row = WinnerRecord {
            id: tables.next_id(),
            session_id: winner.session_id,
            model_identifier: winner.model_identifier,
            prompt: winner.prompt,
            response: winner.response,
            selected_at: Utc::now(),
        };
        tables.winners.push(row.clone());
        Ok(row)
    }

    async fn winners(&self, session_id: &str) -> Result<Vec<WinnerRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .winners
            .iter()
            .rev()
            .filter(|w| w.session_id.as_deref() == Some(session_id))
            .cloned()
            .collect())
    }

    async fn health(&self) -> Result<String> {
        Ok("in-memory".to_string())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
