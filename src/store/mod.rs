//! Off-chain activity and comment records.
//!
//! Nothing here is authoritative: the chain is the system of record and these
//! stores only back the activity feed and comment threads.

pub mod memory;
pub mod persistence;
pub mod supabase;

use anyhow::Result;
use rand::Rng;
use tracing::{info, warn};

use crate::config::{EnvConfig, StorageConfig, StoreBackend};
use crate::data::types::{BetActivity, Comment, NewBetActivity};

pub use memory::MemoryStore;
pub use persistence::SqliteStore;
pub use supabase::SupabaseStore;

/// Newest-first activity listings are capped at this many rows.
pub const ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Comment content is empty")]
    EmptyComment,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Supabase request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Supabase returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Supabase returned no row for insert into {0}")]
    EmptyInsert(&'static str),
}

pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
    Supabase(SupabaseStore),
}

impl Store {
    /// Pick the configured backend. Supabase without credentials degrades to
    /// the in-memory store.
    pub fn from_config(storage: &StorageConfig, env: &EnvConfig) -> Result<Self> {
        let store = match storage.backend {
            StoreBackend::Memory => Store::Memory(MemoryStore::new()),
            StoreBackend::Sqlite => Store::Sqlite(SqliteStore::new(&storage.database_path)?),
            StoreBackend::Supabase => match env.supabase_credentials() {
                Some((url, key)) => Store::Supabase(SupabaseStore::new(url, key)),
                None => {
                    warn!("SUPABASE_URL / SUPABASE_ANON_KEY missing, using in-memory store");
                    Store::Memory(MemoryStore::new())
                }
            },
        };

        info!("Activity store: {}", store.name());
        Ok(store)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
            Store::Supabase(_) => "supabase",
        }
    }

    /// Activities, newest first, optionally for one market.
    pub async fn get_activities(&self, market_id: Option<&str>) -> Result<Vec<BetActivity>, StoreError> {
        match self {
            Store::Memory(s) => Ok(s.get_activities(market_id).await),
            Store::Sqlite(s) => s.get_activities(market_id),
            Store::Supabase(s) => s.get_activities(market_id).await,
        }
    }

    pub async fn add_activity(&self, activity: NewBetActivity) -> Result<BetActivity, StoreError> {
        match self {
            Store::Memory(s) => Ok(s.add_activity(activity).await),
            Store::Sqlite(s) => s.add_activity(activity),
            Store::Supabase(s) => s.add_activity(activity).await,
        }
    }

    /// Every activity of one user, newest first. No user means no rows.
    pub async fn get_user_activities(&self, user_address: Option<&str>) -> Result<Vec<BetActivity>, StoreError> {
        let Some(user) = user_address else {
            return Ok(Vec::new());
        };
        match self {
            Store::Memory(s) => Ok(s.get_user_activities(user).await),
            Store::Sqlite(s) => s.get_user_activities(user),
            Store::Supabase(s) => s.get_user_activities(user).await,
        }
    }

    /// Comments of a market, oldest first.
    pub async fn list_comments(&self, market_id: &str) -> Result<Vec<Comment>, StoreError> {
        match self {
            Store::Memory(s) => Ok(s.list_comments(market_id).await),
            Store::Sqlite(s) => s.list_comments(market_id),
            Store::Supabase(s) => s.list_comments(market_id).await,
        }
    }

    pub async fn add_comment(&self, market_id: &str, content: &str, user_address: &str) -> Result<Comment, StoreError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::EmptyComment);
        }
        match self {
            Store::Memory(s) => Ok(s.add_comment(market_id, content, user_address).await),
            Store::Sqlite(s) => s.add_comment(market_id, content, user_address),
            Store::Supabase(s) => s.add_comment(market_id, content, user_address).await,
        }
    }

    /// Delete a comment if `user_address` wrote it. Returns whether a row went away.
    pub async fn delete_comment(&self, comment_id: &str, user_address: &str) -> Result<bool, StoreError> {
        match self {
            Store::Memory(s) => Ok(s.delete_comment(comment_id, user_address).await),
            Store::Sqlite(s) => s.delete_comment(comment_id, user_address),
            Store::Supabase(s) => s.delete_comment(comment_id, user_address).await,
        }
    }
}

/// Random base-36 record id.
pub fn new_record_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..11)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Side;

    #[test]
    fn test_record_ids_are_base36() {
        let id = new_record_id();
        assert_eq!(id.len(), 11);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(new_record_id(), new_record_id());
    }

    #[test]
    fn test_supabase_without_credentials_falls_back_to_memory() {
        let storage = StorageConfig {
            backend: StoreBackend::Supabase,
            database_path: String::new(),
        };
        let store = Store::from_config(&storage, &EnvConfig::default()).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn test_blank_comment_rejected_before_backend() {
        let store = Store::Memory(MemoryStore::new());
        let err = store.add_comment("1", "   \n", "0xabc").await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyComment));
        assert!(store.list_comments("1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_user_means_no_activities() {
        let store = Store::Memory(MemoryStore::new());
        store
            .add_activity(NewBetActivity {
                market_id: "1".to_string(),
                user_address: "0xabc".to_string(),
                option: Side::Yes,
                amount: 1.0,
                shares: 1.0,
                tx_hash: None,
                market_title: None,
                option_a: None,
                option_b: None,
            })
            .await
            .unwrap();

        assert!(store.get_user_activities(None).await.unwrap().is_empty());
        assert_eq!(store.get_user_activities(Some("0xabc")).await.unwrap().len(), 1);
    }
}
