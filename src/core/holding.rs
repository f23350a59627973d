//! Persisted records: portfolio holdings and the daily value history.

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Currencies a cost basis can be recorded in. KRW is the reporting currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    USD,
    KRW,
}

impl Currency {
    /// Whether amounts in this currency need the FX rate to reach KRW.
    pub fn is_foreign(&self) -> bool {
        *self != Currency::KRW
    }

    /// Maps a provider currency code; anything that is not KRW is priced as USD.
    pub fn from_provider_code(code: &str) -> Self {
        if code.eq_ignore_ascii_case("KRW") {
            Currency::KRW
        } else {
            Currency::USD
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::USD => write!(f, "USD"),
            Currency::KRW => write!(f, "KRW"),
        }
    }
}

impl FromStr for Currency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "KRW" => Ok(Currency::KRW),
            _ => Err(anyhow!("Unsupported currency: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum AssetType {
    #[serde(alias = "stock", alias = "STOCK")]
    Stock,
    #[serde(alias = "etf", alias = "Etf")]
    ETF,
    #[serde(alias = "crypto", alias = "CRYPTO")]
    Crypto,
    #[serde(alias = "cash", alias = "CASH")]
    Cash,
}

impl Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AssetType::Stock => "Stock",
                AssetType::ETF => "ETF",
                AssetType::Crypto => "Crypto",
                AssetType::Cash => "Cash",
            }
        )
    }
}

impl FromStr for AssetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stock" => Ok(AssetType::Stock),
            "etf" => Ok(AssetType::ETF),
            "crypto" => Ok(AssetType::Crypto),
            "cash" => Ok(AssetType::Cash),
            _ => Err(anyhow!("Invalid asset type: {}", s)),
        }
    }
}

/// Absent or `null` currency means USD.
fn currency_or_default<'de, D>(deserializer: D) -> Result<Currency, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Currency>::deserialize(deserializer)?.unwrap_or_default())
}

/// One position. Older records carry no `currency`; those are USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub quantity: f64,
    pub avg_cost: f64,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    #[serde(default, deserialize_with = "currency_or_default")]
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,
}

impl Holding {
    pub fn new(ticker: &str, quantity: f64, avg_cost: f64, asset_type: AssetType) -> Self {
        Self {
            ticker: ticker.trim().to_string(),
            quantity,
            avg_cost,
            asset_type,
            currency: Currency::default(),
            dividend_yield: None,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_dividend_yield(mut self, yield_pct: f64) -> Self {
        self.dividend_yield = Some(yield_pct);
        self
    }

    /// The manually pinned yield, if one is set. Zero means "derive it".
    pub fn pinned_yield(&self) -> Option<f64> {
        self.dividend_yield.filter(|y| *y > 0.0)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ticker.is_empty() {
            return Err("ticker must not be empty".to_string());
        }
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(format!(
                "quantity for {} must be a non-negative number",
                self.ticker
            ));
        }
        if !self.avg_cost.is_finite() || self.avg_cost < 0.0 {
            return Err(format!(
                "average cost for {} must be a non-negative number",
                self.ticker
            ));
        }
        if let Some(y) = self.dividend_yield
            && (!y.is_finite() || y < 0.0)
        {
            return Err(format!(
                "dividend yield for {} must be a non-negative number",
                self.ticker
            ));
        }
        Ok(())
    }
}

/// Total portfolio value (KRW) at the last valuation of a calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub value: f64,
}
