use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::data::types::BetActivity;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BetStats {
    pub total_bets: usize,
    pub unique_traders: usize,
}

/// Addresses are compared case-insensitively; blank addresses are ignored.
pub fn compute_bet_stats(activities: &[BetActivity]) -> BetStats {
    let unique_traders = activities
        .iter()
        .map(|a| a.user_address.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect::<HashSet<_>>()
        .len();

    BetStats {
        total_bets: activities.len(),
        unique_traders,
    }
}

/// Global bet counters over the recent activity window.
pub struct BetStatsFeed {
    store: Arc<Store>,
    stats: BetStats,
}

impl BetStatsFeed {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            stats: BetStats::default(),
        }
    }

    pub fn stats(&self) -> BetStats {
        self.stats
    }

    /// On failure the previous numbers are kept.
    pub async fn refetch(&mut self) {
        match self.store.get_activities(None).await {
            Ok(activities) => self.stats = compute_bet_stats(&activities),
            Err(e) => error!("Failed to fetch bet stats: {}", e),
        }
    }

    /// Refresh every `period` until the task is dropped.
    pub async fn run(&mut self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            self.refetch().await;
            info!(
                total_bets = self.stats.total_bets,
                unique_traders = self.stats.unique_traders,
                "bet stats refreshed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{NewBetActivity, Side};
    use crate::store::MemoryStore;

    fn new_bet(user: &str) -> NewBetActivity {
        NewBetActivity {
            market_id: "1".to_string(),
            user_address: user.to_string(),
            option: Side::Yes,
            amount: 1.0,
            shares: 1.0,
            tx_hash: None,
            market_title: None,
            option_a: None,
            option_b: None,
        }
    }

    #[tokio::test]
    async fn test_unique_traders_case_insensitive() {
        let store = Arc::new(Store::Memory(MemoryStore::new()));
        for user in ["0xAbC", "0xabc", "0xdef", ""] {
            store.add_activity(new_bet(user)).await.unwrap();
        }

        let mut feed = BetStatsFeed::new(store);
        feed.refetch().await;

        assert_eq!(feed.stats(), BetStats { total_bets: 4, unique_traders: 2 });
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(compute_bet_stats(&[]), BetStats::default());
    }
}
