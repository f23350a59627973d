//! Market-data abstractions and the types that cross the provider seam.

use crate::core::holding::Currency;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a market-data lookup failed. Never escapes the gateway.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("Request failed for {symbol}: {source}")]
    Http {
        symbol: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to decode response for {symbol}: {message}")]
    Decode { symbol: String, message: String },

    #[error("No data returned for {0}")]
    EmptyResult(String),

    #[error("No price available for {0} in any lookback window")]
    NoPrice(String),
}

/// Quote as reported by the provider, before domestic-suffix correction.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuote {
    pub price: f64,
    pub currency: String,
    pub name: Option<String>,
}

/// Dividend fields from the provider's summary. `yield_pct` is a percentage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DividendProfile {
    pub dividend_rate: Option<f64>,
    pub trailing_annual_rate: Option<f64>,
    pub yield_pct: Option<f64>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DividendPayment {
    pub date: NaiveDate,
    pub amount: f64,
}

/// Raw access to an external market-data provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest close, trying progressively wider windows.
    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, MarketDataError>;

    /// Latest close of an FX pair symbol such as `KRW=X`.
    async fn fetch_exchange_rate(&self, pair: &str) -> Result<f64, MarketDataError>;

    /// Daily closes over the last few sessions, oldest first.
    async fn fetch_recent_closes(&self, symbol: &str) -> Result<Vec<f64>, MarketDataError>;

    async fn fetch_dividend_profile(&self, symbol: &str)
    -> Result<DividendProfile, MarketDataError>;

    /// Multi-year dividend payments, in any order.
    async fn fetch_dividend_history(
        &self,
        symbol: &str,
    ) -> Result<Vec<DividendPayment>, MarketDataError>;
}

/// What the gateway hands to the rest of the app. `price == None` means
/// "no live price"; such a holding is valued at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Option<f64>,
    pub currency: Currency,
    pub name: String,
}

impl Quote {
    pub fn unavailable(ticker: &str) -> Self {
        Self {
            price: None,
            currency: Currency::KRW,
            name: ticker.to_string(),
        }
    }

    pub fn is_priced(&self) -> bool {
        self.price.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendInfo {
    pub yield_pct: f64,
    pub growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub name: String,
    pub symbol: String,
    pub level: f64,
    pub change: f64,
    pub change_pct: f64,
}

impl IndexQuote {
    pub fn zeroed(name: &str, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            level: 0.0,
            change: 0.0,
            change_pct: 0.0,
        }
    }
}
