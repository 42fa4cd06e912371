use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};

use crate::data::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    PlaceBet(Side),
    Resolve(Side),
    Lock,
    Claim,
    CreateMarket,
    DeployFactory,
}

impl std::fmt::Display for TxAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxAction::PlaceBet(side) => write!(f, "place{}", camel(*side)),
            TxAction::Resolve(side) => write!(f, "resolve{}", camel(*side)),
            TxAction::Lock => write!(f, "lockMarket"),
            TxAction::Claim => write!(f, "claim"),
            TxAction::CreateMarket => write!(f, "createMarket"),
            TxAction::DeployFactory => write!(f, "deployFactory"),
        }
    }
}

fn camel(side: Side) -> &'static str {
    match side {
        Side::Yes => "Yes",
        Side::No => "No",
    }
}

/// What happened to one write. `tx_hash` is `None` for dry runs.
#[derive(Debug, Clone)]
pub struct TxSummary {
    pub action: TxAction,
    pub market_id: Option<u64>,
    pub target: Address,
    pub tx_hash: Option<H256>,
    pub block: Option<u64>,
    pub dry_run: bool,
    pub submitted_at: DateTime<Utc>,
}

impl TxSummary {
    pub fn new(action: TxAction, market_id: Option<u64>, target: Address, dry_run: bool) -> Self {
        Self {
            action,
            market_id,
            target,
            tx_hash: None,
            block: None,
            dry_run,
            submitted_at: Utc::now(),
        }
    }

    pub fn tx_hash_hex(&self) -> Option<String> {
        self.tx_hash.map(|h| format!("{:#x}", h))
    }
}

#[derive(Debug, Clone)]
pub struct CreatedMarket {
    pub summary: TxSummary,
    pub market_id: Option<u64>,
    pub market: Option<Address>,
}
