use super::ui;
use crate::core::{IndexQuote, MarketDataGateway};
use anyhow::Result;
use comfy_table::Cell;

pub fn display_indices(indices: &[IndexQuote]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Index"),
        ui::header_cell("Level"),
        ui::header_cell("Change"),
        ui::header_cell("Change (%)"),
    ]);

    for index in indices {
        table.add_row(vec![
            Cell::new(&index.name),
            ui::right_cell(format!("{:.2}", index.level)),
            ui::right_cell(format!("{:+.2}", index.change)),
            ui::change_cell(index.change_pct),
        ]);
    }
    table.to_string()
}

pub async fn run(gateway: &MarketDataGateway) -> Result<()> {
    let pb = ui::new_spinner("Fetching market indices...");
    let indices = gateway.market_indices().await;
    pb.finish_and_clear();

    println!("{}", display_indices(&indices));
    Ok(())
}
