use std::sync::Arc;
use tracing::{error, info};

use crate::data::types::Comment;
use crate::store::{Store, StoreError};

/// Comment thread of one market, oldest first.
pub struct CommentThread {
    store: Arc<Store>,
    market_id: String,
    comments: Vec<Comment>,
    error: Option<String>,
}

impl CommentThread {
    pub fn new(store: Arc<Store>, market_id: String) -> Self {
        Self {
            store,
            market_id,
            comments: Vec::new(),
            error: None,
        }
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn refetch(&mut self) {
        if self.market_id.is_empty() {
            return;
        }
        self.error = None;
        match self.store.list_comments(&self.market_id).await {
            Ok(comments) => self.comments = comments,
            Err(e) => {
                error!("Error fetching comments: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    pub async fn add_comment(&mut self, content: &str, user_address: &str) -> Result<Comment, StoreError> {
        let comment = self
            .store
            .add_comment(&self.market_id, content, user_address)
            .await
            .map_err(|e| {
                error!("Failed to add comment: {}", e);
                e
            })?;
        self.comments.push(comment.clone());
        info!("Comment {} added to market {}", comment.id, self.market_id);
        Ok(comment)
    }

    /// Delete by author. The local thread only changes when the store confirms.
    pub async fn delete_comment(&mut self, comment_id: &str, user_address: &str) -> Result<bool, StoreError> {
        let deleted = self
            .store
            .delete_comment(comment_id, user_address)
            .await
            .map_err(|e| {
                error!("Failed to delete comment: {}", e);
                e
            })?;
        if deleted {
            self.comments.retain(|c| c.id != comment_id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_thread_add_and_delete() {
        let store = Arc::new(Store::Memory(MemoryStore::new()));
        let mut thread = CommentThread::new(store.clone(), "5".to_string());

        let first = thread.add_comment("gm", "0xa").await.unwrap();
        thread.add_comment("wagmi", "0xb").await.unwrap();
        assert_eq!(thread.comments().len(), 2);

        assert!(!thread.delete_comment(&first.id, "0xb").await.unwrap());
        assert_eq!(thread.comments().len(), 2);

        assert!(thread.delete_comment(&first.id, "0xa").await.unwrap());
        assert_eq!(thread.comments().len(), 1);

        let mut fresh = CommentThread::new(store, "5".to_string());
        fresh.refetch().await;
        assert_eq!(fresh.comments()[0].content, "wagmi");
    }

    #[tokio::test]
    async fn test_empty_comment_not_added() {
        let store = Arc::new(Store::Memory(MemoryStore::new()));
        let mut thread = CommentThread::new(store, "5".to_string());

        assert!(thread.add_comment("  ", "0xa").await.is_err());
        assert!(thread.comments().is_empty());
    }
}
