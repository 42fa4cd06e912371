use anyhow::Result;
use chrono::{DateTime, Utc};
use ethers::providers::Middleware;
use ethers::types::U256;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::data::reader::MarketReader;
use crate::data::types::{Market, MarketStatus, Side};
use crate::monitoring::logger::CsvLogger;

/// A difference between two consecutive market snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum MarketChange {
    Listed { id: u64, title: String },
    PoolChanged { id: u64, before: U256, after: U256 },
    Locked { id: u64 },
    Resolved { id: u64, outcome: Option<Side> },
    Missing { id: u64 },
}

impl std::fmt::Display for MarketChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketChange::Listed { id, title } => write!(f, "market {} listed: {}", id, title),
            MarketChange::PoolChanged { id, before, after } => write!(
                f,
                "market {} pool {} -> {} ETH",
                id,
                ethers::utils::format_ether(*before),
                ethers::utils::format_ether(*after)
            ),
            MarketChange::Locked { id } => write!(f, "market {} locked", id),
            MarketChange::Resolved { id, outcome } => match outcome {
                Some(side) => write!(f, "market {} resolved {}", id, side),
                None => write!(f, "market {} resolved", id),
            },
            MarketChange::Missing { id } => write!(f, "market {} missing from last read", id),
        }
    }
}

/// Compare the previous snapshot with a fresh read taken at `now`.
pub fn diff_markets(previous: &HashMap<u64, Market>, current: &[Market], now: DateTime<Utc>) -> Vec<MarketChange> {
    let mut changes = Vec::new();

    for market in current {
        let Some(old) = previous.get(&market.id) else {
            changes.push(MarketChange::Listed {
                id: market.id,
                title: market.title.clone(),
            });
            continue;
        };

        if old.total_pool != market.total_pool {
            changes.push(MarketChange::PoolChanged {
                id: market.id,
                before: old.total_pool,
                after: market.total_pool,
            });
        }

        if market.resolved && !old.resolved {
            changes.push(MarketChange::Resolved {
                id: market.id,
                outcome: market.outcome,
            });
        } else if !market.resolved && old.status == MarketStatus::Active && !market.is_active(now) {
            // lock time passed since the last read
            changes.push(MarketChange::Locked { id: market.id });
        }
    }

    let mut missing: Vec<u64> = previous
        .keys()
        .filter(|id| !current.iter().any(|m| m.id == **id))
        .copied()
        .collect();
    missing.sort_unstable();
    changes.extend(missing.into_iter().map(|id| MarketChange::Missing { id }));

    changes
}

/// Polls the factory and logs how the remote ledger moved between reads.
pub struct MarketWatcher<M> {
    reader: Arc<MarketReader<M>>,
    interval: Duration,
    csv: Option<CsvLogger>,
    snapshot: HashMap<u64, Market>,
}

impl<M: Middleware + 'static> MarketWatcher<M> {
    pub fn new(reader: Arc<MarketReader<M>>, interval: Duration, csv: Option<CsvLogger>) -> Self {
        Self {
            reader,
            interval,
            csv,
            snapshot: HashMap::new(),
        }
    }

    /// One poll: re-read everything and report differences.
    pub async fn poll_once(&mut self) -> Result<Vec<MarketChange>> {
        let markets = self.reader.refresh().await?;
        let now = Utc::now();
        let changes = diff_markets(&self.snapshot, &markets, now);

        for change in &changes {
            info!("{}", change);
            if let Some(csv) = &self.csv {
                if let Err(e) = csv.log_event(&change.to_string()) {
                    error!("CSV log failed: {}", e);
                }
            }
        }

        self.snapshot = markets
            .into_iter()
            .map(|mut m| {
                m.refresh_status(now);
                (m.id, m)
            })
            .collect();
        Ok(changes)
    }

    /// Poll until ctrl-c. Failed polls are logged and retried next tick.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
            }
        })
        .await
    }

    /// Poll until `shutdown` completes. The future is polled across ticks,
    /// never recreated.
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) -> Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        info!("Watching markets every {:?}", self.interval);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!("Market poll failed: {:#}", e);
                    }
                }
                _ = &mut shutdown => {
                    info!("Stopping market watcher");
                    return Ok(());
                }
            }
        }
    }
}
