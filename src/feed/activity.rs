use std::sync::Arc;
use tracing::error;

use crate::data::types::{BetActivity, NewBetActivity};
use crate::store::{Store, StoreError};

/// Recent bet activity, globally or for one market.
pub struct ActivityFeed {
    store: Arc<Store>,
    market_id: Option<String>,
    activities: Vec<BetActivity>,
    error: Option<String>,
}

impl ActivityFeed {
    pub fn new(store: Arc<Store>, market_id: Option<String>) -> Self {
        Self {
            store,
            market_id,
            activities: Vec::new(),
            error: None,
        }
    }

    pub fn activities(&self) -> &[BetActivity] {
        &self.activities
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Reload from the store. Failures are kept in `error`, not returned.
    pub async fn refetch(&mut self) {
        self.error = None;
        match self.store.get_activities(self.market_id.as_deref()).await {
            Ok(activities) => self.activities = activities,
            Err(e) => {
                error!("Error fetching bet activities: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    /// Record a bet and show it at the top of the feed.
    pub async fn add_bet_activity(&mut self, activity: NewBetActivity) -> Result<BetActivity, StoreError> {
        let stored = self.store.add_activity(activity).await.map_err(|e| {
            error!("Failed to record bet activity: {}", e);
            e
        })?;
        self.activities.insert(0, stored.clone());
        Ok(stored)
    }
}
