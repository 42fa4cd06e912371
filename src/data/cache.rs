use dashmap::DashMap;
use ethers::types::Address;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::data::types::Market;

/// Short-lived cache of market reads, keyed by market id.
pub struct MarketCache {
    cache: DashMap<u64, CachedMarket>,
    addresses: RwLock<Option<CachedAddresses>>,
    ttl: Duration,
}

struct CachedMarket {
    market: Market,
    timestamp: Instant,
}

struct CachedAddresses {
    list: Vec<Address>,
    timestamp: Instant,
}

impl MarketCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            addresses: RwLock::new(None),
            ttl,
        }
    }

    pub fn insert(&self, market: Market) {
        self.cache.insert(market.id, CachedMarket {
            market,
            timestamp: Instant::now(),
        });
    }

    /// Get market if not expired (evict on read)
    pub fn get(&self, id: u64) -> Option<Market> {
        let entry = self.cache.get(&id)?;
        if entry.timestamp.elapsed() > self.ttl {
            drop(entry); // Drop the read lock
            self.cache.remove(&id);
            None
        } else {
            Some(entry.market.clone())
        }
    }

    pub fn set_addresses(&self, list: Vec<Address>) {
        if let Ok(mut guard) = self.addresses.write() {
            *guard = Some(CachedAddresses {
                list,
                timestamp: Instant::now(),
            });
        }
    }

    pub fn addresses(&self) -> Option<Vec<Address>> {
        let guard = self.addresses.read().ok()?;
        guard
            .as_ref()
            .filter(|cached| cached.timestamp.elapsed() <= self.ttl)
            .map(|cached| cached.list.clone())
    }

    pub fn clear(&self) {
        self.cache.clear();
        if let Ok(mut guard) = self.addresses.write() {
            *guard = None;
        }
    }
}
