//! Reconciliation of raw `getInfo()` structs into [`Market`] views.

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use ethers::utils::format_ether;

use crate::contracts::abi::MarketInfo;
use crate::data::types::{Market, MarketStatus, Side, UserPosition};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MarketError {
    #[error("Market id out of range: {0}")]
    IdOutOfRange(U256),

    #[error("Lock time out of range: {0}")]
    LockTimeOutOfRange(U256),

    #[error("Unknown outcome {outcome} for resolved market {market_id}")]
    UnknownOutcome { market_id: u64, outcome: u8 },
}

/// Map a `getInfo()` result read from `address` into a [`Market`], status
/// evaluated against `now`.
pub fn transform_contract_market(
    info: MarketInfo,
    address: Address,
    now: DateTime<Utc>,
) -> Result<Market, MarketError> {
    let MarketInfo {
        id,
        question,
        image_url,
        lock_time,
        total_yes,
        total_no,
        total_pool,
        resolved,
        outcome,
    } = info;

    let id = to_u64(id).ok_or(MarketError::IdOutOfRange(id))?;
    let end_time = to_u64(lock_time)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or(MarketError::LockTimeOutOfRange(lock_time))?;

    // The outcome slot is meaningless until resolution.
    let outcome = if resolved {
        Some(
            Side::try_from(outcome)
                .map_err(|_| MarketError::UnknownOutcome { market_id: id, outcome })?,
        )
    } else {
        None
    };

    let status = derive_status(resolved, end_time, now);

    Ok(Market {
        id,
        title: question,
        image_url,
        address,
        end_time,
        total_yes,
        total_no,
        total_pool,
        resolved,
        outcome,
        status,
    })
}

fn to_u64(value: U256) -> Option<u64> {
    if value > U256::from(u64::MAX) {
        None
    } else {
        Some(value.as_u64())
    }
}

fn derive_status(resolved: bool, end_time: DateTime<Utc>, now: DateTime<Utc>) -> MarketStatus {
    if resolved {
        MarketStatus::Resolved
    } else if end_time > now {
        MarketStatus::Active
    } else {
        MarketStatus::Locked
    }
}

/// Markets still accepting bets at `now`.
pub fn active_markets(markets: &[Market], now: DateTime<Utc>) -> Vec<Market> {
    markets.iter().filter(|m| m.is_active(now)).cloned().collect()
}

impl Market {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.resolved && self.end_time > now
    }

    /// Re-evaluate the time-dependent status without another contract read.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        self.status = derive_status(self.resolved, self.end_time, now);
    }

    pub fn total_pool_eth(&self) -> String {
        format_ether(self.total_pool)
    }

    pub fn total_yes_eth(&self) -> String {
        format_ether(self.total_yes)
    }

    pub fn total_no_eth(&self) -> String {
        format_ether(self.total_no)
    }

    /// Fraction of the staked amount sitting on YES; `None` for an empty pool.
    pub fn yes_share(&self) -> Option<f64> {
        let staked = self.total_yes.saturating_add(self.total_no);
        if staked.is_zero() {
            return None;
        }
        // basis points keep the division in integer space
        let bps = self.total_yes.saturating_mul(U256::from(10_000u64)) / staked;
        Some(bps.as_u64() as f64 / 10_000.0)
    }
}

impl UserPosition {
    pub fn balance(&self, side: Side) -> U256 {
        match side {
            Side::Yes => self.yes_balance,
            Side::No => self.no_balance,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.yes_balance.is_zero() && self.no_balance.is_zero()
    }

    /// The side held, or `None` when flat or hedged on both sides.
    pub fn side(&self) -> Option<Side> {
        match (self.yes_balance.is_zero(), self.no_balance.is_zero()) {
            (false, true) => Some(Side::Yes),
            (true, false) => Some(Side::No),
            _ => None,
        }
    }

    /// Balance on the resolved outcome; zero while the market is open.
    pub fn winning_balance(&self, market: &Market) -> U256 {
        match market.outcome {
            Some(side) if market.resolved => self.balance(side),
            _ => U256::zero(),
        }
    }
}
