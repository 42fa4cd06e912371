use std::collections::HashSet;
use std::sync::Arc;
use tracing::error;

use crate::data::types::BetActivity;
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    pub total_bets: usize,
    pub total_amount: f64,
    pub total_shares: f64,
    pub unique_markets: usize,
}

/// One wallet's bet history.
pub struct UserBets {
    store: Arc<Store>,
    user_address: Option<String>,
    bets: Vec<BetActivity>,
    error: Option<String>,
}

impl UserBets {
    pub fn new(store: Arc<Store>, user_address: Option<String>) -> Self {
        Self {
            store,
            user_address,
            bets: Vec::new(),
            error: None,
        }
    }

    pub fn bets(&self) -> &[BetActivity] {
        &self.bets
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn refetch(&mut self) {
        if self.user_address.is_none() {
            self.bets.clear();
            return;
        }
        self.error = None;
        match self.store.get_user_activities(self.user_address.as_deref()).await {
            Ok(bets) => self.bets = bets,
            Err(e) => {
                error!("Error fetching user bets: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    pub fn bets_for_market(&self, market_id: &str) -> Vec<&BetActivity> {
        self.bets.iter().filter(|b| b.market_id == market_id).collect()
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            total_bets: self.bets.len(),
            total_amount: self.bets.iter().map(|b| b.amount).sum(),
            total_shares: self.bets.iter().map(|b| b.shares).sum(),
            unique_markets: self
                .bets
                .iter()
                .map(|b| b.market_id.as_str())
                .collect::<HashSet<_>>()
                .len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::{NewBetActivity, Side};
    use crate::store::MemoryStore;

    async fn seeded() -> Arc<Store> {
        let store = Arc::new(Store::Memory(MemoryStore::new()));
        for (market, user, amount) in [("1", "0xa", 1.0), ("1", "0xa", 0.5), ("2", "0xa", 2.0), ("2", "0xb", 9.0)] {
            store
                .add_activity(NewBetActivity {
                    market_id: market.to_string(),
                    user_address: user.to_string(),
                    option: Side::Yes,
                    amount,
                    shares: amount * 2.0,
                    tx_hash: None,
                    market_title: None,
                    option_a: None,
                    option_b: None,
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_user_stats() {
        let mut bets = UserBets::new(seeded().await, Some("0xa".to_string()));
        bets.refetch().await;

        let stats = bets.stats();
        assert_eq!(stats.total_bets, 3);
        assert!((stats.total_amount - 3.5).abs() < 1e-9);
        assert!((stats.total_shares - 7.0).abs() < 1e-9);
        assert_eq!(stats.unique_markets, 2);
        assert_eq!(bets.bets_for_market("1").len(), 2);
    }

    #[tokio::test]
    async fn test_no_user_has_no_bets() {
        let mut bets = UserBets::new(seeded().await, None);
        bets.refetch().await;

        assert!(bets.bets().is_empty());
        assert_eq!(bets.stats(), UserStats::default());
    }
}
