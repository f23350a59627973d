pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::holdings::HoldingInput;
use crate::core::cache::Cache;
use crate::core::config::AppConfig;
use crate::core::projection::GoalProjection;
use crate::core::valuation::value_portfolio;
use crate::core::{Clock, DocumentStore, HoldingsStore, MarketDataGateway, SystemClock};
use crate::providers::{
    GithubDocumentStore, LocalDocumentStore, RetryPolicy, YahooFinanceProvider,
};
use crate::store::KeyValueStore;
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub enum AppCommand {
    Summary,
    Add(HoldingInput),
    Remove {
        ticker: String,
    },
    History {
        limit: usize,
    },
    /// Overrides for the configured goal.
    Goal {
        target_value: Option<f64>,
        monthly_contribution: Option<f64>,
        annual_rate_pct: Option<f64>,
    },
    Market,
}

fn build_gateway(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<MarketDataGateway> {
    let kv_store = if config.market.persistent_cache {
        let data_path = config.default_data_path()?;
        debug!("Using data path {}", data_path.display());
        KeyValueStore::open(&data_path)
    } else {
        KeyValueStore::in_memory()
    };
    let cache = Cache::new(kv_store.collection("market"), clock.clone());

    let retry = RetryPolicy {
        quote_retries: config.market.quote_retries,
        index_retries: config.market.index_retries,
        delay_ms: config.market.retry_delay_ms,
    };
    let provider = Arc::new(YahooFinanceProvider::new(config.yahoo_base_url(), retry));

    Ok(MarketDataGateway::new(
        provider,
        cache,
        clock,
        config.market.fallback_exchange_rate,
    ))
}

async fn open_holdings(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<HoldingsStore> {
    let documents = build_document_store(config)?;
    Ok(HoldingsStore::open(documents, config.store.ledger_paths(), clock).await)
}

fn build_document_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    match (&config.store.github, &config.store.local) {
        (Some(github), _) => {
            let token = github.resolve_token()?;
            info!("Using GitHub store {} ({})", github.repo, github.branch);
            Ok(Arc::new(GithubDocumentStore::new(
                &github.base_url,
                &github.repo,
                &github.branch,
                &token,
            )))
        }
        (None, Some(local)) => {
            info!("Using local store {}", local.dir);
            Ok(Arc::new(LocalDocumentStore::new(&local.dir)))
        }
        (None, None) => bail!("No holdings store configured"),
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("wonfolio starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    config.validate().context("Invalid configuration")?;
    debug!("Loaded config: {config:#?}");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway = build_gateway(&config, clock.clone())?;

    match command {
        AppCommand::Market => cli::market::run(&gateway).await,
        AppCommand::Summary => {
            let mut store = open_holdings(&config, clock).await?;
            cli::summary::run(&gateway, &mut store).await
        }
        AppCommand::Add(input) => {
            let mut store = open_holdings(&config, clock).await?;
            cli::holdings::add(&mut store, input).await
        }
        AppCommand::Remove { ticker } => {
            let mut store = open_holdings(&config, clock).await?;
            cli::holdings::remove(&mut store, &ticker).await
        }
        AppCommand::History { limit } => {
            let store = open_holdings(&config, clock).await?;
            cli::history::run(store.history(), limit)
        }
        AppCommand::Goal {
            target_value,
            monthly_contribution,
            annual_rate_pct,
        } => {
            let configured = config.goal.clone();
            let Some(target_value) =
                target_value.or_else(|| configured.as_ref().map(|g| g.target_value))
            else {
                bail!("No goal configured: pass --target or add a goal section to the config");
            };
            let monthly_contribution = monthly_contribution
                .or_else(|| configured.as_ref().map(|g| g.monthly_contribution))
                .unwrap_or(0.0);
            let annual_rate_pct = annual_rate_pct
                .or_else(|| configured.as_ref().map(|g| g.annual_rate_pct))
                .unwrap_or(0.0);

            let store = open_holdings(&config, clock).await?;
            let holdings = store.holdings().to_vec();
            let pb = cli::ui::new_progress_bar(holdings.len() as u64, true);
            pb.set_message("Valuing portfolio...");
            let snapshot = gateway.snapshot(&holdings, &|| pb.inc(1)).await;
            pb.finish_and_clear();
            let current_value = value_portfolio(&holdings, &snapshot).total_market_value;

            let projection = GoalProjection::new(
                current_value,
                target_value,
                monthly_contribution,
                annual_rate_pct,
            );
            cli::goal::run(&projection)
        }
    }
}
