use chrono::Utc;
use tokio::sync::RwLock;

use crate::data::types::{BetActivity, Comment, NewBetActivity};
use crate::store::{new_record_id, ACTIVITY_LIMIT};

/// Process-local store. Lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    activities: RwLock<Vec<BetActivity>>,
    comments: RwLock<Vec<Comment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_activities(&self, market_id: Option<&str>) -> Vec<BetActivity> {
        let activities = self.activities.read().await;
        let mut list: Vec<BetActivity> = activities
            .iter()
            .filter(|a| market_id.map_or(true, |id| a.market_id == id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list.truncate(ACTIVITY_LIMIT);
        list
    }

    pub async fn add_activity(&self, activity: NewBetActivity) -> BetActivity {
        let item = activity.into_activity(new_record_id(), Utc::now());
        self.activities.write().await.insert(0, item.clone());
        item
    }

    pub async fn get_user_activities(&self, user_address: &str) -> Vec<BetActivity> {
        let activities = self.activities.read().await;
        let mut list: Vec<BetActivity> = activities
            .iter()
            .filter(|a| a.user_address == user_address)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub async fn list_comments(&self, market_id: &str) -> Vec<Comment> {
        let comments = self.comments.read().await;
        let mut list: Vec<Comment> = comments
            .iter()
            .filter(|c| c.market_id == market_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    pub async fn add_comment(&self, market_id: &str, content: &str, user_address: &str) -> Comment {
        let now = Utc::now();
        let comment = Comment {
            id: new_record_id(),
            market_id: market_id.to_string(),
            user_address: user_address.to_string(),
            content: content.trim().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.comments.write().await.push(comment.clone());
        comment
    }

    pub async fn delete_comment(&self, comment_id: &str, user_address: &str) -> bool {
        let mut comments = self.comments.write().await;
        let before = comments.len();
        comments.retain(|c| !(c.id == comment_id && c.user_address == user_address));
        comments.len() < before
    }
}
