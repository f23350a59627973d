//! Normalizes holdings into KRW figures.
use crate::core::holding::{AssetType, Currency, Holding};
use crate::core::market::{DividendInfo, Quote};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Market inputs for one valuation pass.
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    /// KRW per USD
    pub exchange_rate: f64,
    pub quotes: HashMap<String, Quote>,
    pub dividends: HashMap<String, DividendInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldSource {
    Manual,
    Automatic,
}

/// Derived figures for one holding. Monetary fields are in KRW.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingValue {
    pub ticker: String,
    pub name: String,
    pub asset_type: AssetType,
    pub quantity: f64,
    /// Price in the trading currency; `None` when no live price was available.
    pub price: Option<f64>,
    pub trading_currency: Currency,
    pub cost_currency: Currency,
    pub market_value: f64,
    pub cost_basis: f64,
    pub profit: f64,
    pub return_pct: f64,
    pub yield_pct: f64,
    pub yield_source: YieldSource,
    pub dividend_growth_pct: f64,
    pub annual_dividend: f64,
    pub weight_pct: f64,
}

impl HoldingValue {
    pub fn is_priced(&self) -> bool {
        self.price.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioValuation {
    pub holdings: Vec<HoldingValue>,
    pub exchange_rate: f64,
    pub total_market_value: f64,
    pub total_cost_basis: f64,
    pub total_profit: f64,
    pub total_return_pct: f64,
    pub total_annual_dividend: f64,
    pub monthly_cash_flow: f64,
}

impl PortfolioValuation {
    /// Holdings that had no live price and are counted at zero.
    pub fn unpriced(&self) -> Vec<&HoldingValue> {
        self.holdings.iter().filter(|h| !h.is_priced()).collect()
    }

    /// Market value per asset type.
    pub fn allocation_by_type(&self) -> BTreeMap<AssetType, f64> {
        let mut allocation = BTreeMap::new();
        for holding in &self.holdings {
            *allocation.entry(holding.asset_type).or_insert(0.0) += holding.market_value;
        }
        allocation
    }
}

/// `profit / cost * 100`, or zero when there is no cost basis.
pub fn return_pct(profit: f64, cost_basis: f64) -> f64 {
    if cost_basis == 0.0 {
        0.0
    } else {
        profit / cost_basis * 100.0
    }
}

fn to_krw(amount: f64, currency: Currency, exchange_rate: f64) -> f64 {
    if currency.is_foreign() {
        amount * exchange_rate
    } else {
        amount
    }
}

/// Values a single holding.
///
/// The quote's trading currency and the holding's cost currency are
/// converted independently, so a USD cost basis against a KRW quote (or the
/// reverse) gets the rate applied on one side only.
pub fn value_holding(
    holding: &Holding,
    quote: Option<&Quote>,
    dividend: Option<&DividendInfo>,
    exchange_rate: f64,
) -> HoldingValue {
    let price = quote.and_then(|q| q.price);
    let trading_currency = quote.map_or(Currency::KRW, |q| q.currency);
    let name = quote.map_or_else(|| holding.ticker.clone(), |q| q.name.clone());

    let market_value = to_krw(
        price.unwrap_or(0.0) * holding.quantity,
        trading_currency,
        exchange_rate,
    );
    let cost_basis = to_krw(
        holding.avg_cost * holding.quantity,
        holding.currency,
        exchange_rate,
    );
    let profit = market_value - cost_basis;

    let (yield_pct, yield_source) = match holding.pinned_yield() {
        Some(pinned) => (pinned, YieldSource::Manual),
        None => (
            dividend.map_or(0.0, |d| d.yield_pct),
            YieldSource::Automatic,
        ),
    };

    if trading_currency != holding.currency && price.is_some() {
        debug!(
            "{}: cost recorded in {} but quoted in {}",
            holding.ticker, holding.currency, trading_currency
        );
    }

    HoldingValue {
        ticker: holding.ticker.clone(),
        name,
        asset_type: holding.asset_type,
        quantity: holding.quantity,
        price,
        trading_currency,
        cost_currency: holding.currency,
        market_value,
        cost_basis,
        profit,
        return_pct: return_pct(profit, cost_basis),
        yield_pct,
        yield_source,
        dividend_growth_pct: dividend.map_or(0.0, |d| d.growth_pct),
        annual_dividend: market_value * (yield_pct / 100.0),
        weight_pct: 0.0,
    }
}

/// Values every holding and aggregates the totals. Unpriced holdings stay
/// in the output with zero market value.
pub fn value_portfolio(holdings: &[Holding], snapshot: &MarketSnapshot) -> PortfolioValuation {
    let mut values: Vec<HoldingValue> = holdings
        .iter()
        .map(|holding| {
            value_holding(
                holding,
                snapshot.quotes.get(&holding.ticker),
                snapshot.dividends.get(&holding.ticker),
                snapshot.exchange_rate,
            )
        })
        .collect();

    let total_market_value: f64 = values.iter().map(|v| v.market_value).sum();
    let total_cost_basis: f64 = values.iter().map(|v| v.cost_basis).sum();
    let total_annual_dividend: f64 = values.iter().map(|v| v.annual_dividend).sum();
    let total_profit = total_market_value - total_cost_basis;

    if total_market_value > 0.0 {
        for value in &mut values {
            value.weight_pct = value.market_value / total_market_value * 100.0;
        }
    }

    PortfolioValuation {
        holdings: values,
        exchange_rate: snapshot.exchange_rate,
        total_market_value,
        total_cost_basis,
        total_profit,
        total_return_pct: return_pct(total_profit, total_cost_basis),
        total_annual_dividend,
        monthly_cash_flow: total_annual_dividend / 12.0,
    }
}
