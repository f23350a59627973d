use super::ui;
use crate::core::gateway::is_domestic_ticker;
use crate::core::{AssetType, Currency, Holding, HoldingsStore};
use anyhow::{Context, Result};
use tracing::info;

/// Fields of a holding as entered on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingInput {
    pub ticker: String,
    pub quantity: f64,
    pub avg_cost: f64,
    pub asset_type: AssetType,
    /// Defaults to KRW for domestic listings and USD otherwise.
    pub currency: Option<Currency>,
    pub dividend_yield: Option<f64>,
}

impl HoldingInput {
    pub fn into_holding(self) -> Holding {
        let currency = self.currency.unwrap_or(if is_domestic_ticker(&self.ticker) {
            Currency::KRW
        } else {
            Currency::USD
        });
        let mut holding =
            Holding::new(&self.ticker, self.quantity, self.avg_cost, self.asset_type)
                .with_currency(currency);
        if let Some(yield_pct) = self.dividend_yield {
            holding = holding.with_dividend_yield(yield_pct);
        }
        holding
    }
}

pub async fn add(store: &mut HoldingsStore, input: HoldingInput) -> Result<()> {
    let holding = input.into_holding();
    let ticker = holding.ticker.clone();
    let replacing = store.holdings().iter().any(|h| h.ticker == ticker);

    store
        .upsert_holding(holding)
        .await
        .with_context(|| format!("Failed to save holding {ticker}"))?;

    let verb = if replacing { "Updated" } else { "Added" };
    info!("{verb} holding {ticker}");
    println!(
        "{} {}",
        verb,
        ui::style_text(&ticker, ui::StyleType::TotalLabel)
    );
    Ok(())
}

pub async fn remove(store: &mut HoldingsStore, ticker: &str) -> Result<()> {
    let removed = store
        .remove_holding(ticker)
        .await
        .with_context(|| format!("Failed to remove holding {ticker}"))?;

    if removed {
        println!(
            "Removed {}",
            ui::style_text(ticker, ui::StyleType::TotalLabel)
        );
    } else {
        println!(
            "{}",
            ui::style_text(
                &format!("{ticker} is not in the portfolio"),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}
