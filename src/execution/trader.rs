use anyhow::{bail, Context, Result};
use chrono::Utc;
use ethers::abi::Detokenize;
use ethers::contract::{parse_log, ContractCall};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, TransactionReceipt, U256, U64};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{BettingConfig, ChainSettings};
use crate::contracts::abi::{MarketCreatedFilter, MarketFactory, PredictionMarket};
use crate::data::cache::MarketCache;
use crate::data::reader::{http_provider, MarketReader};
use crate::data::types::Side;
use crate::execution::risk::BetValidator;
use crate::execution::types::{CreatedMarket, TxAction, TxSummary};

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Provider plus local wallet, chain id from config or from the RPC.
pub async fn signer_client(settings: &ChainSettings, private_key: &str) -> Result<Arc<SignerClient>> {
    let provider = http_provider(settings)?;
    let chain_id = match settings.chain_id {
        Some(id) => id,
        None => provider
            .get_chainid()
            .await
            .context("Failed to read chain id from RPC")?
            .as_u64(),
    };

    let wallet: LocalWallet = private_key.parse().context("Invalid ADMIN_KEY")?;
    let wallet = wallet.with_chain_id(chain_id);
    info!("Signer {:#x} on chain {}", wallet.address(), chain_id);

    Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
}

/// Signing client for the write side of the market contracts.
pub struct PredictionTrader<M> {
    client: Arc<M>,
    sender: Address,
    reader: MarketReader<M>,
    factory: MarketFactory<M>,
    validator: BetValidator,
    gas_limit: Option<u64>,
    dry_run: bool,
}

impl PredictionTrader<SignerClient> {
    pub async fn connect(
        settings: &ChainSettings,
        private_key: &str,
        betting: BettingConfig,
        cache: Arc<MarketCache>,
        dry_run: bool,
    ) -> Result<Self> {
        let client = signer_client(settings, private_key).await?;
        let sender = client.address();
        Self::new(client, sender, settings, betting, cache, dry_run)
    }
}

impl<M: Middleware + 'static> PredictionTrader<M> {
    /// `sender` is the account `client` signs for.
    pub fn new(
        client: Arc<M>,
        sender: Address,
        settings: &ChainSettings,
        betting: BettingConfig,
        cache: Arc<MarketCache>,
        dry_run: bool,
    ) -> Result<Self> {
        let factory_address = settings.require_factory()?;
        info!("Trading against factory {:#x} (dry run: {})", factory_address, dry_run);

        Ok(Self {
            reader: MarketReader::new(client.clone(), factory_address, settings.position_token, cache),
            factory: MarketFactory::new(factory_address, client.clone()),
            client,
            sender,
            validator: BetValidator::new(betting),
            gas_limit: settings.gas_limit,
            dry_run,
        })
    }

    pub fn address(&self) -> Address {
        self.sender
    }

    pub fn reader(&self) -> &MarketReader<M> {
        &self.reader
    }

    async fn require_market_address(&self, market_id: u64) -> Result<Address> {
        self.reader
            .market_address(market_id)
            .await?
            .with_context(|| format!("Market {} not found", market_id))
    }

    /// Stake `amount_eth` on one side of a market.
    pub async fn place_bet(&self, market_id: u64, side: Side, amount_eth: &str) -> Result<TxSummary> {
        info!("Placing bet: market={}, side={}, amount={} ETH", market_id, side, amount_eth);

        let market = self.reader.get_market(market_id).await?;
        let balance = self.reader.balance_of(self.sender).await?;
        let value = self
            .validator
            .validate_bet(market_id, amount_eth, market.as_ref(), balance, Utc::now())?;

        // validate_bet only passes for a market that exists
        let target = market.map(|m| m.address).context("Market disappeared during validation")?;
        let contract = PredictionMarket::new(target, self.client.clone());
        let call = match side {
            Side::Yes => contract.place_yes(),
            Side::No => contract.place_no(),
        }
        .value(value);

        let (summary, _) = self.submit(call, TxAction::PlaceBet(side), Some(market_id), target).await?;
        // pool totals changed
        self.reader.cache().clear();
        Ok(summary)
    }

    /// Settle a market on `outcome` (admin only).
    pub async fn resolve_market(&self, market_id: u64, outcome: Side) -> Result<TxSummary> {
        info!("Resolving market {} as {}", market_id, outcome);
        let target = self.require_market_address(market_id).await?;
        let contract = PredictionMarket::new(target, self.client.clone());
        let call = match outcome {
            Side::Yes => contract.resolve_yes(),
            Side::No => contract.resolve_no(),
        };

        let (summary, _) = self.submit(call, TxAction::Resolve(outcome), Some(market_id), target).await?;
        self.reader.cache().clear();
        Ok(summary)
    }

    /// Stop accepting bets ahead of resolution (admin only).
    pub async fn lock_market(&self, market_id: u64) -> Result<TxSummary> {
        info!("Locking market {}", market_id);
        let target = self.require_market_address(market_id).await?;
        let call = PredictionMarket::new(target, self.client.clone()).lock_market();

        let (summary, _) = self.submit(call, TxAction::Lock, Some(market_id), target).await?;
        self.reader.cache().clear();
        Ok(summary)
    }

    pub async fn claim_winnings(&self, market_id: u64) -> Result<TxSummary> {
        info!("Claiming winnings for market {}", market_id);
        let target = self.require_market_address(market_id).await?;
        let call = PredictionMarket::new(target, self.client.clone()).claim();

        let (summary, _) = self.submit(call, TxAction::Claim, Some(market_id), target).await?;
        Ok(summary)
    }

    pub async fn create_market(&self, question: &str, image_url: &str, lock_time: u64) -> Result<CreatedMarket> {
        info!("Creating market: {:?} (image: {:?}, lock: {})", question, image_url, lock_time);
        let call = self.factory.create_market(
            question.to_string(),
            image_url.to_string(),
            U256::from(lock_time),
        );

        let (summary, receipt) = self
            .submit(call, TxAction::CreateMarket, None, self.factory.address())
            .await?;
        self.created_market(summary, receipt).await
    }

    /// Identify the new market from the creation receipt, or from the
    /// factory's market list when the receipt carries no `MarketCreated`.
    async fn created_market(&self, summary: TxSummary, receipt: Option<TransactionReceipt>) -> Result<CreatedMarket> {
        let Some(receipt) = receipt else {
            return Ok(CreatedMarket { summary, market_id: None, market: None });
        };

        if let Some(event) = find_market_created(&receipt, self.factory.address()) {
            let market_id = (event.market_id <= U256::from(u64::MAX)).then(|| event.market_id.as_u64());
            info!("Market created: id={:?}, address={:#x}", market_id, event.market);
            return Ok(CreatedMarket { summary, market_id, market: Some(event.market) });
        }

        warn!("No MarketCreated event in receipt, falling back to factory market list");
        self.reader.cache().clear();
        let market = self.reader.market_addresses().await?.last().copied();
        Ok(CreatedMarket { summary, market_id: None, market })
    }

    /// Send a contract call and wait for its receipt. Dry runs only log.
    async fn submit<D: Detokenize>(
        &self,
        call: ContractCall<M, D>,
        action: TxAction,
        market_id: Option<u64>,
        target: Address,
    ) -> Result<(TxSummary, Option<TransactionReceipt>)> {
        let call = match self.gas_limit {
            Some(gas) => call.gas(gas),
            None => call,
        };

        let mut summary = TxSummary::new(action, market_id, target, self.dry_run);

        if self.dry_run {
            info!(
                action = %action,
                market_id = ?market_id,
                target = %format!("{:#x}", target),
                value = ?call.tx.value(),
                "Dry run: transaction not sent"
            );
            return Ok((summary, None));
        }

        let pending = call
            .send()
            .await
            .with_context(|| format!("Failed to submit {} transaction", action))?;
        let tx_hash = pending.tx_hash();
        summary.tx_hash = Some(tx_hash);
        info!(action = %action, tx_hash = %format!("{:#x}", tx_hash), "Transaction submitted");

        let receipt = pending
            .await
            .with_context(|| format!("{} transaction failed while pending", action))?
            .with_context(|| format!("{} transaction dropped before confirmation", action))?;

        if receipt.status == Some(U64::zero()) {
            bail!("{} transaction {:#x} reverted", action, tx_hash);
        }

        summary.block = receipt.block_number.map(|b| b.as_u64());
        info!(
            action = %action,
            tx_hash = %format!("{:#x}", tx_hash),
            block = ?summary.block,
            "Transaction confirmed"
        );

        Ok((summary, Some(receipt)))
    }
}

fn find_market_created(receipt: &TransactionReceipt, factory: Address) -> Option<MarketCreatedFilter> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == factory)
        .find_map(|log| parse_log::<MarketCreatedFilter>(log.clone()).ok())
}
