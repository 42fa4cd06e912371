use chrono::{DateTime, Utc};
use ethers::types::U256;
use ethers::utils::{format_ether, parse_ether};
use tracing::{info, warn};

use crate::config::BettingConfig;
use crate::data::types::Market;

/// Pre-flight checks run before a bet transaction is signed.
#[derive(Debug, Clone)]
pub struct BetValidator {
    config: BettingConfig,
}

impl BetValidator {
    pub fn new(config: BettingConfig) -> Self {
        Self { config }
    }

    /// Validate a bet and return its value in wei.
    pub fn validate_bet(
        &self,
        market_id: u64,
        amount_eth: &str,
        market: Option<&Market>,
        balance: U256,
        now: DateTime<Utc>,
    ) -> Result<U256, ValidationError> {
        // 1. Amount
        let amount: f64 = amount_eth
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidAmount(amount_eth.to_string()))?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ValidationError::NonPositiveAmount(amount_eth.to_string()));
        }
        let value = parse_ether(amount_eth.trim())
            .map_err(|_| ValidationError::InvalidAmount(amount_eth.to_string()))?;

        // 2. Bet limits
        if amount < self.config.min_bet_eth {
            return Err(ValidationError::BelowMinimum(amount, self.config.min_bet_eth));
        }
        if amount > self.config.max_bet_eth {
            return Err(ValidationError::AboveMaximum(amount, self.config.max_bet_eth));
        }

        // 3. Market state
        let market = market.ok_or(ValidationError::MarketNotFound(market_id))?;
        if market.resolved {
            return Err(ValidationError::MarketResolved(market_id));
        }
        if market.end_time <= now {
            warn!("Market {} locked at {}", market_id, market.end_time);
            return Err(ValidationError::MarketLocked(market_id));
        }

        // 4. Capital check
        if value > balance {
            return Err(ValidationError::InsufficientBalance(
                format_ether(value),
                format_ether(balance),
            ));
        }

        info!("Bet validation passed for market {}", market_id);
        Ok(value)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid bet amount: {0}")]
    InvalidAmount(String),

    #[error("Bet amount must be positive: {0}")]
    NonPositiveAmount(String),

    #[error("Bet below minimum: {0} < {1} ETH")]
    BelowMinimum(f64, f64),

    #[error("Bet above maximum: {0} > {1} ETH")]
    AboveMaximum(f64, f64),

    #[error("Market {0} not found")]
    MarketNotFound(u64),

    #[error("Market {0} already resolved")]
    MarketResolved(u64),

    #[error("Market {0} is locked")]
    MarketLocked(u64),

    #[error("Insufficient balance: need {0} ETH, have {1} ETH")]
    InsufficientBalance(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::MarketStatus;
    use chrono::Duration;
    use ethers::types::Address;

    fn validator() -> BetValidator {
        BetValidator::new(BettingConfig {
            min_bet_eth: 0.01,
            max_bet_eth: 5.0,
        })
    }

    fn market(resolved: bool, lock_in: Duration) -> Market {
        Market {
            id: 1,
            title: "Test".to_string(),
            image_url: String::new(),
            address: Address::repeat_byte(0x01),
            end_time: Utc::now() + lock_in,
            total_yes: U256::zero(),
            total_no: U256::zero(),
            total_pool: U256::zero(),
            resolved,
            outcome: None,
            status: MarketStatus::Active,
        }
    }

    fn rich() -> U256 {
        parse_ether("100").unwrap()
    }

    #[test]
    fn test_valid_bet_returns_wei() {
        let m = market(false, Duration::hours(1));
        let value = validator().validate_bet(1, "0.5", Some(&m), rich(), Utc::now()).unwrap();
        assert_eq!(value, parse_ether("0.5").unwrap());
    }

    #[test]
    fn test_rejects_bad_amounts() {
        let m = market(false, Duration::hours(1));
        let v = validator();

        assert!(matches!(
            v.validate_bet(1, "abc", Some(&m), rich(), Utc::now()),
            Err(ValidationError::InvalidAmount(_))
        ));
        assert!(matches!(
            v.validate_bet(1, "0", Some(&m), rich(), Utc::now()),
            Err(ValidationError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            v.validate_bet(1, "0.001", Some(&m), rich(), Utc::now()),
            Err(ValidationError::BelowMinimum(_, _))
        ));
        assert!(matches!(
            v.validate_bet(1, "6", Some(&m), rich(), Utc::now()),
            Err(ValidationError::AboveMaximum(_, _))
        ));
    }

    #[test]
    fn test_rejects_closed_markets() {
        let v = validator();
        let resolved = market(true, Duration::hours(1));
        let locked = market(false, Duration::hours(-1));

        assert_eq!(
            v.validate_bet(1, "1", None, rich(), Utc::now()),
            Err(ValidationError::MarketNotFound(1))
        );
        assert_eq!(
            v.validate_bet(1, "1", Some(&resolved), rich(), Utc::now()),
            Err(ValidationError::MarketResolved(1))
        );
        assert_eq!(
            v.validate_bet(1, "1", Some(&locked), rich(), Utc::now()),
            Err(ValidationError::MarketLocked(1))
        );
    }

    #[test]
    fn test_rejects_insufficient_balance() {
        let m = market(false, Duration::hours(1));
        let balance = parse_ether("0.2").unwrap();
        assert!(matches!(
            validator().validate_bet(1, "0.5", Some(&m), balance, Utc::now()),
            Err(ValidationError::InsufficientBalance(_, _))
        ));
    }
}
