mod config;
mod contracts;
mod data;
mod execution;
mod feed;
mod monitoring;
mod store;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;

use config::{parse_address, ChainSettings, Config, EnvConfig};
use contracts::deploy::{deploy_factory, DeployParams, HardhatArtifact, MarketParams};
use data::cache::MarketCache;
use data::reader::{http_provider, MarketReader};
use data::types::{BetActivity, Market, NewBetActivity, Side};
use execution::trader::{signer_client, PredictionTrader, SignerClient};
use execution::types::TxSummary;
use feed::{ActivityFeed, BetStatsFeed, CommentThread, UserBets};
use monitoring::logger::CsvLogger;
use monitoring::watcher::MarketWatcher;
use store::Store;

const USAGE: &str = "usage: plotpredict <command>

  markets                          list every market
  active                           list markets open for bets
  market <id>                      show one market
  position <address> <id>          YES/NO position balances
  bet <id> <yes|no> <eth>          place a bet
  resolve <id> <yes|no>            resolve a market (admin)
  lock <id>                        lock a market (admin)
  claim <id>                       claim winnings
  create-market                    create a market from MARKET_* / [market]
  deploy-factory                   deploy MarketFactory from the build artifact
  activity [id]                    recent bet activity
  user-bets <address> [id]         bets and totals of one wallet
  stats                            global bet counters
  comments <id>                    comment thread of a market
  comment <id> <address> <text>    add a comment
  delete-comment <id> <cid> <address>
                                   delete your comment
  watch                            poll markets until ctrl-c";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Markets,
    Active,
    Market(u64),
    Position { user: Address, market_id: u64 },
    Bet { market_id: u64, side: Side, amount: String },
    Resolve { market_id: u64, outcome: Side },
    Lock(u64),
    Claim(u64),
    CreateMarket,
    DeployFactory,
    Activity(Option<String>),
    UserBets { user: String, market_id: Option<String> },
    Stats,
    Comments(String),
    Comment { market_id: String, user: String, content: String },
    DeleteComment { market_id: String, comment_id: String, user: String },
    Watch,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let command = match args.as_slice() {
            ["markets"] => Command::Markets,
            ["active"] => Command::Active,
            ["market", id] => Command::Market(market_id(id)?),
            ["position", user, id] => Command::Position {
                user: parse_address(user, "user address")?,
                market_id: market_id(id)?,
            },
            ["bet", id, side, amount] => Command::Bet {
                market_id: market_id(id)?,
                side: side.parse().map_err(anyhow::Error::msg)?,
                amount: amount.to_string(),
            },
            ["resolve", id, outcome] => Command::Resolve {
                market_id: market_id(id)?,
                outcome: outcome.parse().map_err(anyhow::Error::msg)?,
            },
            ["lock", id] => Command::Lock(market_id(id)?),
            ["claim", id] => Command::Claim(market_id(id)?),
            ["create-market"] => Command::CreateMarket,
            ["deploy-factory"] => Command::DeployFactory,
            ["activity"] => Command::Activity(None),
            ["activity", id] => Command::Activity(Some(id.to_string())),
            ["user-bets", user] => Command::UserBets {
                user: wallet(user)?,
                market_id: None,
            },
            ["user-bets", user, id] => Command::UserBets {
                user: wallet(user)?,
                market_id: Some(id.to_string()),
            },
            ["stats"] => Command::Stats,
            ["comments", id] => Command::Comments(id.to_string()),
            ["comment", id, user, content @ ..] if !content.is_empty() => Command::Comment {
                market_id: id.to_string(),
                user: user.to_string(),
                content: content.join(" "),
            },
            ["delete-comment", id, comment_id, user] => Command::DeleteComment {
                market_id: id.to_string(),
                comment_id: comment_id.to_string(),
                user: user.to_string(),
            },
            ["watch"] => Command::Watch,
            _ => bail!("{}", USAGE),
        };

        Ok(command)
    }
}

/// Lowercase 0x form, the way bet activity records the sender.
fn wallet(raw: &str) -> Result<String> {
    Ok(format!("{:#x}", parse_address(raw, "user address")?))
}

fn market_id(raw: &str) -> Result<u64> {
    raw.parse()
        .with_context(|| format!("Market id must be a non-negative integer, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    let config_path =
        std::env::var("PLOTPREDICT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load(&config_path)?;
    let env_config = EnvConfig::load()?;

    tracing::debug!("Dry run mode: {}", config.dry_run(&env_config));
    tracing::debug!("Store backend: {:?}", config.storage.backend);

    let app = App::new(config, env_config)?;
    app.run(command).await
}

struct App {
    config: Config,
    env: EnvConfig,
    store: Arc<Store>,
    cache: Arc<MarketCache>,
    csv: Option<CsvLogger>,
}

impl App {
    fn new(config: Config, env: EnvConfig) -> Result<Self> {
        let store = Arc::new(Store::from_config(&config.storage, &env)?);
        let cache = Arc::new(MarketCache::new(Duration::from_secs(config.chain.cache_ttl_secs)));
        let csv = if config.monitoring.csv_logging {
            Some(CsvLogger::new(config.monitoring.csv_log_path.clone())?)
        } else {
            None
        };

        Ok(Self { config, env, store, cache, csv })
    }

    fn chain(&self) -> Result<ChainSettings> {
        self.config.chain_settings(&self.env)
    }

    fn reader(&self) -> Result<MarketReader<Provider<Http>>> {
        let settings = self.chain()?;
        let provider = http_provider(&settings)?;
        Ok(MarketReader::new(
            Arc::new(provider),
            settings.require_factory()?,
            settings.position_token,
            self.cache.clone(),
        ))
    }

    async fn trader(&self) -> Result<PredictionTrader<SignerClient>> {
        PredictionTrader::connect(
            &self.chain()?,
            self.env.require_admin_key()?,
            self.config.betting.clone(),
            self.cache.clone(),
            self.config.dry_run(&self.env),
        )
        .await
    }

    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Markets => print_markets(&self.reader()?.all_markets().await?),
            Command::Active => print_markets(&self.reader()?.active_markets().await?),
            Command::Market(id) => match self.reader()?.get_market(id).await? {
                Some(market) => print_market(&market),
                None => println!("Market {} not found", id),
            },
            Command::Position { user, market_id } => {
                let reader = self.reader()?;
                let position = reader.user_position(user, market_id).await?;
                println!(
                    "Market {} | {:#x} | YES {} | NO {}",
                    market_id,
                    user,
                    ethers::utils::format_ether(position.yes_balance),
                    ethers::utils::format_ether(position.no_balance)
                );
                if position.is_empty() {
                    return Ok(());
                }
                if let Some(side) = position.side() {
                    println!("Holding {} only", side);
                }
                if let Some(market) = reader.get_market(market_id).await? {
                    if market.resolved {
                        println!(
                            "Winning balance: {}",
                            ethers::utils::format_ether(position.winning_balance(&market))
                        );
                    }
                }
            }
            Command::Bet { market_id, side, amount } => self.bet(market_id, side, &amount).await?,
            Command::Resolve { market_id, outcome } => {
                let tx = self.trader().await?.resolve_market(market_id, outcome).await?;
                self.record_tx(&tx, None);
                print_tx(&tx);
            }
            Command::Lock(market_id) => {
                let tx = self.trader().await?.lock_market(market_id).await?;
                self.record_tx(&tx, None);
                print_tx(&tx);
            }
            Command::Claim(market_id) => {
                let tx = self.trader().await?.claim_winnings(market_id).await?;
                self.record_tx(&tx, None);
                print_tx(&tx);
            }
            Command::CreateMarket => self.create_market().await?,
            Command::DeployFactory => self.deploy_factory().await?,
            Command::Activity(market_id) => {
                let mut feed = ActivityFeed::new(self.store.clone(), market_id);
                feed.refetch().await;
                if let Some(e) = feed.error() {
                    bail!("Failed to load activity: {}", e);
                }
                for a in feed.activities() {
                    println!(
                        "{} | market {} | {} {} {} ETH | tx {}",
                        a.created_at.to_rfc3339(),
                        a.market_id,
                        a.user_address,
                        a.option,
                        a.amount,
                        a.tx_hash.as_deref().unwrap_or("-")
                    );
                }
            }
            Command::UserBets { user, market_id } => {
                let mut bets = UserBets::new(self.store.clone(), Some(user));
                bets.refetch().await;
                if let Some(e) = bets.error() {
                    bail!("Failed to load user bets: {}", e);
                }
                let shown: Vec<&BetActivity> = match &market_id {
                    Some(id) => bets.bets_for_market(id),
                    None => bets.bets().iter().collect(),
                };
                for b in shown {
                    println!("{} | market {} | {} {} ETH", b.created_at.to_rfc3339(), b.market_id, b.option, b.amount);
                }
                let stats = bets.stats();
                println!(
                    "{} bets, {} ETH, {} shares across {} markets",
                    stats.total_bets, stats.total_amount, stats.total_shares, stats.unique_markets
                );
            }
            Command::Stats => {
                let mut feed = BetStatsFeed::new(self.store.clone());
                feed.refetch().await;
                let stats = feed.stats();
                println!("Total bets: {} | Unique traders: {}", stats.total_bets, stats.unique_traders);
            }
            Command::Comments(market_id) => {
                let mut thread = CommentThread::new(self.store.clone(), market_id);
                thread.refetch().await;
                if let Some(e) = thread.error() {
                    bail!("Failed to load comments: {}", e);
                }
                for c in thread.comments() {
                    println!("[{}] {} {}: {}", c.id, c.created_at.to_rfc3339(), c.user_address, c.content);
                }
            }
            Command::Comment { market_id, user, content } => {
                let mut thread = CommentThread::new(self.store.clone(), market_id);
                let comment = thread.add_comment(&content, &user).await?;
                println!("Comment added: {}", comment.id);
            }
            Command::DeleteComment { market_id, comment_id, user } => {
                let mut thread = CommentThread::new(self.store.clone(), market_id);
                if thread.delete_comment(&comment_id, &user).await? {
                    println!("Comment {} deleted", comment_id);
                } else {
                    println!("Comment {} not found or not yours", comment_id);
                }
            }
            Command::Watch => self.watch().await?,
        }

        Ok(())
    }

    async fn bet(&self, market_id: u64, side: Side, amount: &str) -> Result<()> {
        let trader = self.trader().await?;
        let tx = trader.place_bet(market_id, side, amount).await?;
        self.record_tx(&tx, Some(amount));
        print_tx(&tx);

        if tx.dry_run {
            return Ok(());
        }

        let amount_eth: f64 = amount.trim().parse().unwrap_or_default();
        let title = trader.reader().get_market(market_id).await.ok().flatten().map(|m| m.title);
        let activity = NewBetActivity {
            market_id: market_id.to_string(),
            user_address: format!("{:#x}", trader.address()),
            option: side,
            amount: amount_eth,
            // stakes mint position tokens 1:1
            shares: amount_eth,
            tx_hash: tx.tx_hash_hex(),
            market_title: title,
            option_a: Some(Side::Yes.label().to_string()),
            option_b: Some(Side::No.label().to_string()),
        };

        let mut feed = ActivityFeed::new(self.store.clone(), Some(market_id.to_string()));
        if let Err(e) = feed.add_bet_activity(activity).await {
            // the bet itself is on-chain already
            tracing::warn!("Bet placed but activity not recorded: {}", e);
        }
        Ok(())
    }

    async fn create_market(&self) -> Result<()> {
        let now = Utc::now().timestamp().max(0) as u64;
        let params = MarketParams::resolve(&self.config.market, &self.env, now)?;
        let trader = self.trader().await?;
        let created = trader
            .create_market(&params.question, &params.image_url, params.lock_time)
            .await?;

        self.record_tx(&created.summary, None);
        print_tx(&created.summary);
        println!(
            "Market created: id={} address={}",
            created.market_id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string()),
            created.market.map(|a| format!("{:#x}", a)).unwrap_or_else(|| "?".to_string())
        );
        Ok(())
    }

    async fn deploy_factory(&self) -> Result<()> {
        let settings = self.chain()?;
        let params = DeployParams::resolve(&self.config.deploy, &self.env)?;
        let artifact = HardhatArtifact::load(&self.config.deploy.artifact_path)?;
        tracing::info!("Deploying MarketFactory to {}", settings.network.as_deref().unwrap_or(&settings.rpc_url));

        if self.config.dry_run(&self.env) {
            tracing::info!("Dry run: deployment skipped ({:?})", params);
            return Ok(());
        }

        let client = signer_client(&settings, self.env.require_admin_key()?).await?;
        let admin = client.address();
        let deployment = deploy_factory(client, admin, artifact, &params, settings.gas_limit).await?;

        let summary = deployment.summary();
        self.record_tx(&summary, None);
        print_tx(&summary);
        println!("\nAdd to .env:\n{}", deployment.env_lines());
        Ok(())
    }

    async fn watch(&self) -> Result<()> {
        let reader = Arc::new(self.reader()?);

        let mut stats = BetStatsFeed::new(self.store.clone());
        let stats_period = Duration::from_secs(self.config.monitoring.stats_refresh_secs);
        let stats_task = tokio::spawn(async move { stats.run(stats_period).await });

        let mut watcher = MarketWatcher::new(
            reader,
            Duration::from_secs(self.config.chain.poll_interval_secs),
            self.csv.clone(),
        );
        let result = watcher.run().await;
        stats_task.abort();
        result
    }

    fn record_tx(&self, tx: &TxSummary, amount: Option<&str>) {
        if let Some(csv) = &self.csv {
            if let Err(e) = csv.log_tx(tx, amount) {
                tracing::error!("CSV log failed: {}", e);
            }
        }
    }
}

fn print_markets(markets: &[Market]) {
    if markets.is_empty() {
        println!("No markets");
    }
    for market in markets {
        print_market(market);
    }
}

fn print_market(m: &Market) {
    let outcome = m.outcome.map(|o| format!(" -> {}", o)).unwrap_or_default();
    let odds = m
        .yes_share()
        .map(|s| format!(" | YES {:.1}%", s * 100.0))
        .unwrap_or_default();
    println!(
        "#{} [{}{}] {} | pool {} ETH (YES {} / NO {}){} | locks {} | {:#x}",
        m.id,
        m.status,
        outcome,
        m.title,
        m.total_pool_eth(),
        m.total_yes_eth(),
        m.total_no_eth(),
        odds,
        m.end_time.to_rfc3339(),
        m.address
    );
}

fn print_tx(tx: &TxSummary) {
    match tx.tx_hash_hex() {
        Some(hash) => println!("{} submitted: {} (block {:?})", tx.action, hash, tx.block),
        None => println!("{} not sent (dry run)", tx.action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_bet() {
        assert_eq!(
            Command::parse(&args("bet 4 no 0.25")).unwrap(),
            Command::Bet { market_id: 4, side: Side::No, amount: "0.25".to_string() }
        );
    }

    #[test]
    fn test_parse_comment_joins_words() {
        assert_eq!(
            Command::parse(&args("comment 2 0xabc to the moon")).unwrap(),
            Command::Comment {
                market_id: "2".to_string(),
                user: "0xabc".to_string(),
                content: "to the moon".to_string(),
            }
        );
        assert!(Command::parse(&args("comment 2 0xabc")).is_err());
    }

    #[test]
    fn test_parse_optional_activity_market() {
        assert_eq!(Command::parse(&args("activity")).unwrap(), Command::Activity(None));
        assert_eq!(
            Command::parse(&args("activity 9")).unwrap(),
            Command::Activity(Some("9".to_string()))
        );
    }

    #[test]
    fn test_parse_user_bets_normalizes_address() {
        let mixed = "0xAbCdEf0000000000000000000000000000000001";
        let lower = "0xabcdef0000000000000000000000000000000001";
        assert_eq!(
            Command::parse(&args(&format!("user-bets {}", mixed))).unwrap(),
            Command::UserBets { user: lower.to_string(), market_id: None }
        );
        assert_eq!(
            Command::parse(&args(&format!("user-bets {} 3", mixed))).unwrap(),
            Command::UserBets { user: lower.to_string(), market_id: Some("3".to_string()) }
        );
        assert!(Command::parse(&args("user-bets alice")).is_err());
    }

    #[test]
    fn test_parse_position_address() {
        let cmd = Command::parse(&args("position 0x00000000000000000000000000000000000000AA 5")).unwrap();
        assert_eq!(
            cmd,
            Command::Position { user: Address::from_low_u64_be(0xaa), market_id: 5 }
        );
        assert!(Command::parse(&args("position 0x12 5")).is_err());
    }

    #[test]
    fn test_parse_delete_comment_needs_market() {
        assert_eq!(
            Command::parse(&args("delete-comment 4 c1 0xabc")).unwrap(),
            Command::DeleteComment {
                market_id: "4".to_string(),
                comment_id: "c1".to_string(),
                user: "0xabc".to_string(),
            }
        );
        assert!(Command::parse(&args("delete-comment c1 0xabc")).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args("")).is_err());
        assert!(Command::parse(&args("market -1")).is_err());
        assert!(Command::parse(&args("resolve 1 maybe")).is_err());
        assert!(Command::parse(&args("frobnicate")).is_err());
    }
}
