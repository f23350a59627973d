use super::ui;
use crate::core::valuation::{PortfolioValuation, YieldSource, value_portfolio};
use crate::core::{HistoryChange, HoldingsStore, MarketDataGateway};
use anyhow::Result;
use comfy_table::Cell;
use tracing::{debug, warn};

impl PortfolioValuation {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();

        table.set_header(vec![
            ui::header_cell("Holding"),
            ui::header_cell("Type"),
            ui::header_cell("Quantity"),
            ui::header_cell("Price"),
            ui::header_cell("Value (KRW)"),
            ui::header_cell("Profit (KRW)"),
            ui::header_cell("Return"),
            ui::header_cell("Yield"),
            ui::header_cell("Div. Growth"),
            ui::header_cell("Weight"),
        ]);

        for holding in &self.holdings {
            let name = if holding.name != holding.ticker {
                format!("{}\n{}", holding.ticker, holding.name)
            } else {
                holding.ticker.clone()
            };
            let currency = holding.trading_currency;
            let yield_text = match holding.yield_source {
                YieldSource::Manual => format!("{:.2}% (pinned)", holding.yield_pct),
                YieldSource::Automatic => format!("{:.2}%", holding.yield_pct),
            };

            table.add_row(vec![
                Cell::new(name),
                Cell::new(holding.asset_type.to_string()),
                ui::right_cell(format!("{:.4}", holding.quantity)),
                ui::format_optional_cell(holding.price, |p| format!("{p:.2} {currency}")),
                ui::right_cell(ui::format_krw(holding.market_value)),
                ui::signed_krw_cell(holding.profit),
                ui::change_cell(holding.return_pct),
                ui::right_cell(yield_text),
                ui::right_cell(format!("{:.2}%", holding.dividend_growth_pct)),
                ui::right_cell(format!("{:.2}%", holding.weight_pct)),
            ]);
        }

        let mut output = format!(
            "{}  (USD/KRW {:.2})\n\n",
            ui::style_text("Portfolio", ui::StyleType::Title),
            self.exchange_rate
        );
        output.push_str(&table.to_string());

        let total_style = if self.total_profit >= 0.0 {
            ui::StyleType::TotalValue
        } else {
            ui::StyleType::Error
        };
        output.push_str(&format!(
            "\n\n{} {}\n{} {}\n{} {} ({:+.2}%)\n{} {}\n{} {}",
            ui::style_text("Total Value:", ui::StyleType::TotalLabel),
            ui::style_text(
                &ui::format_krw(self.total_market_value),
                ui::StyleType::TotalValue
            ),
            ui::style_text("Total Cost:", ui::StyleType::TotalLabel),
            ui::format_krw(self.total_cost_basis),
            ui::style_text("Profit:", ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_krw(self.total_profit), total_style),
            self.total_return_pct,
            ui::style_text("Annual Dividends:", ui::StyleType::TotalLabel),
            ui::format_krw(self.total_annual_dividend),
            ui::style_text("Monthly Cash Flow:", ui::StyleType::TotalLabel),
            ui::format_krw(self.monthly_cash_flow),
        ));

        let allocation = self.allocation_by_type();
        if self.total_market_value > 0.0 && !allocation.is_empty() {
            let parts: Vec<String> = allocation
                .iter()
                .map(|(asset_type, value)| {
                    format!(
                        "{asset_type} {:.1}%",
                        value / self.total_market_value * 100.0
                    )
                })
                .collect();
            output.push_str(&format!(
                "\n{} {}",
                ui::style_text("Allocation:", ui::StyleType::TotalLabel),
                parts.join(" · ")
            ));
        }

        let unpriced = self.unpriced();
        if !unpriced.is_empty() {
            let tickers: Vec<&str> = unpriced.iter().map(|h| h.ticker.as_str()).collect();
            output.push_str(&format!(
                "\n\n{}",
                ui::style_text(
                    &format!(
                        "No live price for {}; counted as zero in the totals.",
                        tickers.join(", ")
                    ),
                    ui::StyleType::Warning
                )
            ));
        }

        output
    }
}

/// Values the portfolio, prints it and records today's total.
pub async fn run(gateway: &MarketDataGateway, store: &mut HoldingsStore) -> Result<()> {
    let holdings = store.holdings().to_vec();
    if holdings.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "No holdings yet. Add one with `wonfolio add <TICKER> ...`.",
                ui::StyleType::Subtle
            )
        );
        return Ok(());
    }

    let pb = ui::new_progress_bar(holdings.len() as u64, true);
    pb.set_message("Fetching market data...");
    let snapshot = gateway.snapshot(&holdings, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    let valuation = value_portfolio(&holdings, &snapshot);
    println!("{}", valuation.display_as_table());

    // History is best effort; the valuation above already stands
    match store.record_daily_value(valuation.total_market_value).await {
        Ok(HistoryChange::Unchanged) => debug!("Daily value unchanged"),
        Ok(change) => debug!("Daily value {:?}", change),
        Err(e) => {
            warn!("Could not record daily value: {e}");
            println!(
                "\n{}",
                ui::style_text(
                    &format!("Could not save today's value: {e}"),
                    ui::StyleType::Warning
                )
            );
        }
    }
    Ok(())
}
