use anyhow::{Context, Result};
use chrono::Utc;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, U256};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ChainSettings;
use crate::contracts::abi::{id_no, id_yes, MarketFactory, MarketInfo, PositionToken, PredictionMarket};
use crate::data::cache::MarketCache;
use crate::data::market::{active_markets, transform_contract_market};
use crate::data::types::{Market, UserPosition};

/// `getInfo()` call output, as the tuple abigen generates for it.
type RawMarketInfo = (U256, String, String, U256, U256, U256, U256, bool, u8);

fn market_info(raw: RawMarketInfo) -> MarketInfo {
    let (id, question, image_url, lock_time, total_yes, total_no, total_pool, resolved, outcome) = raw;
    MarketInfo { id, question, image_url, lock_time, total_yes, total_no, total_pool, resolved, outcome }
}

/// Build an HTTP provider honoring the configured RPC timeout.
pub fn http_provider(settings: &ChainSettings) -> Result<Provider<Http>> {
    let url = reqwest::Url::parse(&settings.rpc_url)
        .with_context(|| format!("Invalid RPC URL: {}", settings.rpc_url))?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.rpc_timeout_secs))
        .build()
        .context("Failed to build RPC HTTP client")?;

    Ok(Provider::new(Http::new_with_client(url, client)))
}

/// Read side of the factory/market contracts.
pub struct MarketReader<M> {
    client: Arc<M>,
    factory: MarketFactory<M>,
    position_token: Option<Address>,
    cache: Arc<MarketCache>,
}

impl<M: Middleware + 'static> MarketReader<M> {
    pub fn new(
        client: Arc<M>,
        factory: Address,
        position_token: Option<Address>,
        cache: Arc<MarketCache>,
    ) -> Self {
        Self {
            factory: MarketFactory::new(factory, client.clone()),
            client,
            position_token,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<MarketCache> {
        &self.cache
    }

    /// All market contract addresses known to the factory.
    pub async fn market_addresses(&self) -> Result<Vec<Address>> {
        if let Some(cached) = self.cache.addresses() {
            return Ok(cached);
        }

        let addresses = self
            .factory
            .markets()
            .call()
            .await
            .context("Failed to read factory market list")?;

        debug!(count = addresses.len(), "factory market list loaded");
        self.cache.set_addresses(addresses.clone());
        Ok(addresses)
    }

    /// Read `getInfo()` on every market concurrently.
    ///
    /// Markets whose read or mapping fails are skipped, not fatal.
    pub async fn all_markets(&self) -> Result<Vec<Market>> {
        let addresses = self.market_addresses().await?;
        let now = Utc::now();

        let reads = addresses.iter().map(|&address| {
            let client = self.client.clone();
            async move {
                let market = PredictionMarket::new(address, client);
                let info = market.get_info().call().await;
                (address, info)
            }
        });

        let mut markets = Vec::with_capacity(addresses.len());
        for (address, info) in join_all(reads).await {
            let raw = match info {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(market = %format!("{:#x}", address), error = %e, "getInfo failed, skipping");
                    continue;
                }
            };

            match transform_contract_market(market_info(raw), address, now) {
                Ok(market) => {
                    self.cache.insert(market.clone());
                    markets.push(market);
                }
                Err(e) => {
                    warn!(market = %format!("{:#x}", address), error = %e, "Unreadable market, skipping");
                }
            }
        }

        markets.sort_by_key(|m| m.id);
        Ok(markets)
    }

    /// Markets that are unresolved with a lock time still ahead.
    pub async fn active_markets(&self) -> Result<Vec<Market>> {
        let markets = self.all_markets().await?;
        Ok(active_markets(&markets, Utc::now()))
    }

    /// Market contract address for an id; `None` when the factory has no such market.
    pub async fn market_address(&self, market_id: u64) -> Result<Option<Address>> {
        let address = self
            .factory
            .market_by_id(U256::from(market_id))
            .call()
            .await
            .with_context(|| format!("Failed to resolve market {}", market_id))?;

        Ok(if address.is_zero() { None } else { Some(address) })
    }

    pub async fn get_market(&self, market_id: u64) -> Result<Option<Market>> {
        if let Some(mut market) = self.cache.get(market_id) {
            market.refresh_status(Utc::now());
            return Ok(Some(market));
        }

        let Some(address) = self.market_address(market_id).await? else {
            return Ok(None);
        };

        let raw = PredictionMarket::new(address, self.client.clone())
            .get_info()
            .call()
            .await
            .with_context(|| format!("Failed to read market {} info", market_id))?;

        let market = transform_contract_market(market_info(raw), address, Utc::now())?;
        self.cache.insert(market.clone());
        Ok(Some(market))
    }

    async fn position_token_address(&self) -> Result<Address> {
        match self.position_token {
            Some(address) => Ok(address),
            None => self
                .factory
                .position_token()
                .call()
                .await
                .context("Failed to read position token address"),
        }
    }

    /// YES/NO position-token balances of `user` in a market.
    pub async fn user_position(&self, user: Address, market_id: u64) -> Result<UserPosition> {
        let token = PositionToken::new(self.position_token_address().await?, self.client.clone());

        let yes_call = token.balance_of(user, id_yes(market_id));
        let no_call = token.balance_of(user, id_no(market_id));
        let (yes_balance, no_balance) = tokio::try_join!(yes_call.call(), no_call.call())
            .with_context(|| format!("Failed to read position balances for market {}", market_id))?;

        Ok(UserPosition {
            market_id,
            user,
            yes_balance,
            no_balance,
        })
    }

    /// Native balance of an account, used to pre-check bets.
    pub async fn balance_of(&self, account: Address) -> Result<U256> {
        self.client
            .get_balance(account, None)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read balance: {}", e))
    }

    /// Drop cached reads and re-read every market.
    pub async fn refresh(&self) -> Result<Vec<Market>> {
        self.cache.clear();
        let markets = self.all_markets().await?;
        info!(markets = markets.len(), "market state refreshed");
        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::MarketStatus;
    use crate::contracts::abi::MarketInfo;
    use ethers::abi::{encode, Token, Tokenizable};
    use ethers::providers::{JsonRpcError, MockProvider, MockResponse, Provider};
    use ethers::types::Bytes;

    fn reader() -> (MarketReader<Provider<MockProvider>>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let reader = MarketReader::new(
            Arc::new(provider),
            Address::repeat_byte(0xfa),
            None,
            Arc::new(MarketCache::new(Duration::from_secs(60))),
        );
        (reader, mock)
    }

    fn cached_market(id: u64) -> Market {
        Market {
            id,
            title: "Cached".to_string(),
            image_url: String::new(),
            address: Address::repeat_byte(0x01),
            end_time: Utc::now() + chrono::Duration::hours(1),
            total_yes: U256::zero(),
            total_no: U256::zero(),
            total_pool: U256::zero(),
            resolved: false,
            outcome: None,
            status: MarketStatus::Active,
        }
    }

    fn info_response(id: u64, lock_time: u64) -> Bytes {
        let info = MarketInfo {
            id: U256::from(id),
            question: format!("Market {}?", id),
            image_url: String::new(),
            lock_time: U256::from(lock_time),
            total_yes: U256::from(6u64),
            total_no: U256::from(2u64),
            total_pool: U256::from(8u64),
            resolved: false,
            outcome: 0,
        };
        // contracts return the struct as one dynamic tuple
        Bytes::from(encode(&[info.into_token()]))
    }

    fn future_lock() -> u64 {
        (Utc::now().timestamp() + 3_600) as u64
    }

    #[tokio::test]
    async fn test_get_market_served_from_cache() {
        let (reader, _mock) = reader();
        reader.cache().insert(cached_market(4));

        let market = reader.get_market(4).await.unwrap().unwrap();
        assert_eq!(market.title, "Cached");
    }

    #[tokio::test]
    async fn test_unknown_market_id_returns_none() {
        let (reader, mock) = reader();
        let zero = Bytes::from(encode(&[Token::Address(Address::zero())]));
        mock.push::<Bytes, _>(zero).unwrap();

        assert!(reader.get_market(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_factory_has_no_markets() {
        let (reader, mock) = reader();
        let empty = Bytes::from(encode(&[Token::Array(vec![])]));
        mock.push::<Bytes, _>(empty).unwrap();

        assert!(reader.all_markets().await.unwrap().is_empty());
        // second read comes from the cached address list
        assert!(reader.all_markets().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_market_reads_info_from_market_contract() {
        let (reader, mock) = reader();
        let market_address = Address::repeat_byte(0xa1);
        // responses are served last-in first-out: marketById, then getInfo
        mock.push::<Bytes, _>(info_response(7, future_lock())).unwrap();
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Address(market_address)]))).unwrap();

        let market = reader.get_market(7).await.unwrap().unwrap();
        assert_eq!(market.id, 7);
        assert_eq!(market.address, market_address);
        assert_eq!(market.title, "Market 7?");
        assert_eq!(market.total_pool, U256::from(8u64));
        assert_eq!(market.status, MarketStatus::Active);
        assert!(reader.cache().get(7).is_some());
    }

    #[tokio::test]
    async fn test_failed_info_read_skips_only_that_market() {
        let (reader, mock) = reader();
        reader
            .cache()
            .set_addresses(vec![Address::repeat_byte(0xa1), Address::repeat_byte(0xb2)]);

        mock.push_response(MockResponse::Error(JsonRpcError {
            code: 3,
            message: "execution reverted".to_string(),
            data: None,
        }));
        mock.push::<Bytes, _>(info_response(7, future_lock())).unwrap();

        let markets = reader.all_markets().await.unwrap();
        assert_eq!(markets.len(), 1);
        assert_eq!(markets[0].id, 7);
    }

    #[tokio::test]
    async fn test_user_position_reads_both_token_balances() {
        let (provider, mock) = Provider::mocked();
        let reader = MarketReader::new(
            Arc::new(provider),
            Address::repeat_byte(0xfa),
            Some(Address::repeat_byte(0x70)),
            Arc::new(MarketCache::new(Duration::from_secs(60))),
        );
        let user = Address::repeat_byte(0x22);

        // balanceOf(user, idYes) is sent first, so its response goes on top
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Uint(U256::from(9u64))]))).unwrap();
        mock.push::<Bytes, _>(Bytes::from(encode(&[Token::Uint(U256::from(5u64))]))).unwrap();

        let position = reader.user_position(user, 3).await.unwrap();
        assert_eq!(position.market_id, 3);
        assert_eq!(position.user, user);
        assert_eq!(position.yes_balance, U256::from(5u64));
        assert_eq!(position.no_balance, U256::from(9u64));
    }
}
