use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize};

/// One side of a binary market. Option index 0 is YES, 1 is NO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn index(self) -> u8 {
        match self {
            Side::Yes => 0,
            Side::No => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Yes => "YES",
            Side::No => "NO",
        }
    }
}

impl From<Side> for u8 {
    fn from(side: Side) -> u8 {
        side.index()
    }
}

impl TryFrom<u8> for Side {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Side::Yes),
            1 => Ok(Side::No),
            other => Err(format!("unknown option index {}", other)),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yes" | "y" | "0" => Ok(Side::Yes),
            "no" | "n" | "1" => Ok(Side::No),
            other => Err(format!("expected yes or no, got '{}'", other)),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Active,
    Locked,
    Resolved,
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketStatus::Active => write!(f, "active"),
            MarketStatus::Locked => write!(f, "locked"),
            MarketStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Normalized view of a market contract. Always re-read, never mutated locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub id: u64,
    pub title: String,
    pub image_url: String,
    /// Address of the market contract instance.
    pub address: Address,
    pub end_time: DateTime<Utc>,
    pub total_yes: U256,
    pub total_no: U256,
    pub total_pool: U256,
    pub resolved: bool,
    /// Only set once the market is resolved.
    pub outcome: Option<Side>,
    pub status: MarketStatus,
}

/// A wallet's position-token balances in one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPosition {
    pub market_id: u64,
    pub user: Address,
    pub yes_balance: U256,
    pub no_balance: U256,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetActivity {
    pub id: String,
    pub market_id: String,
    pub user_address: String,
    pub option: Side,
    #[serde(deserialize_with = "number_or_string")]
    pub amount: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub shares: f64,
    #[serde(default)]
    pub tx_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub market_title: Option<String>,
    #[serde(default)]
    pub option_a: Option<String>,
    #[serde(default)]
    pub option_b: Option<String>,
}

/// Decimal columns arrive as JSON numbers or as strings depending on the backend.
fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid decimal: {:?}", text))),
    }
}

/// A bet activity before the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBetActivity {
    pub market_id: String,
    pub user_address: String,
    pub option: Side,
    pub amount: f64,
    pub shares: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_b: Option<String>,
}

impl NewBetActivity {
    pub fn into_activity(self, id: String, created_at: DateTime<Utc>) -> BetActivity {
        BetActivity {
            id,
            market_id: self.market_id,
            user_address: self.user_address,
            option: self.option,
            amount: self.amount,
            shares: self.shares,
            tx_hash: self.tx_hash,
            created_at,
            market_title: self.market_title,
            option_a: self.option_a,
            option_b: self.option_b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub market_id: String,
    pub user_address: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
