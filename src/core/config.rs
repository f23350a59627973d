use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::ledger::LedgerPaths;

fn default_branch() -> String {
    "main".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}

fn default_portfolio_path() -> String {
    "portfolio.json".to_string()
}

fn default_history_path() -> String {
    "history.json".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GithubStoreConfig {
    /// Repository as `owner/name`.
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Inline token. Takes precedence over `token_env`.
    pub token: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_github_url")]
    pub base_url: String,
    #[serde(default = "default_portfolio_path")]
    pub portfolio_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

impl GithubStoreConfig {
    /// Resolves the access token, from the config or the environment.
    pub fn resolve_token(&self) -> Result<String> {
        let token = match &self.token {
            Some(token) => token.clone(),
            None => std::env::var(&self.token_env).unwrap_or_default(),
        };
        if token.trim().is_empty() {
            bail!(
                "No GitHub token configured: set store.github.token or the {} environment variable",
                self.token_env
            );
        }
        Ok(token.trim().to_string())
    }

    fn validate_repo(&self) -> Result<()> {
        match self.repo.split_once('/') {
            Some((owner, name))
                if !owner.trim().is_empty() && !name.trim().is_empty() && !name.contains('/') =>
            {
                Ok(())
            }
            _ => bail!(
                "Invalid repository '{}': expected the form owner/name",
                self.repo
            ),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LocalStoreConfig {
    pub dir: String,
    #[serde(default = "default_portfolio_path")]
    pub portfolio_path: String,
    #[serde(default = "default_history_path")]
    pub history_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StoreConfig {
    pub github: Option<GithubStoreConfig>,
    pub local: Option<LocalStoreConfig>,
}

impl StoreConfig {
    pub fn ledger_paths(&self) -> LedgerPaths {
        match (&self.github, &self.local) {
            (Some(github), _) => LedgerPaths {
                portfolio: github.portfolio_path.clone(),
                history: github.history_path.clone(),
            },
            (None, Some(local)) => LedgerPaths {
                portfolio: local.portfolio_path.clone(),
                history: local.history_path.clone(),
            },
            (None, None) => LedgerPaths::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    /// KRW per USD used when no live rate can be fetched.
    pub fallback_exchange_rate: f64,
    pub retry_delay_ms: u64,
    pub quote_retries: usize,
    pub index_retries: usize,
    /// Keep fetched market data on disk between runs.
    pub persistent_cache: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            fallback_exchange_rate: 1450.0,
            retry_delay_ms: 500,
            quote_retries: 2,
            index_retries: 1,
            persistent_cache: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GoalConfig {
    pub target_value: f64,
    #[serde(default)]
    pub monthly_contribution: f64,
    #[serde(default)]
    pub annual_rate_pct: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub market: MarketConfig,
    pub goal: Option<GoalConfig>,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "wonfolio", "wonfolio")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Checks the settings the app cannot start without.
    pub fn validate(&self) -> Result<()> {
        match (&self.store.github, &self.store.local) {
            (Some(_), Some(_)) => {
                bail!("Configure only one of store.github or store.local")
            }
            (None, None) => bail!("No holdings store configured: add a store.github section"),
            (Some(github), None) => {
                github.validate_repo()?;
                github.resolve_token()?;
            }
            (None, Some(local)) => {
                if local.dir.trim().is_empty() {
                    bail!("store.local.dir must not be empty");
                }
            }
        }

        if !(self.market.fallback_exchange_rate.is_finite()
            && self.market.fallback_exchange_rate > 0.0)
        {
            bail!(
                "market.fallback_exchange_rate must be positive, got {}",
                self.market.fallback_exchange_rate
            );
        }
        Ok(())
    }
}
