use super::ui;
use crate::core::HistoryPoint;
use anyhow::Result;
use comfy_table::Cell;

/// Renders the daily values, newest last, with the change from the day before.
pub fn display_history(history: &[HistoryPoint], limit: usize) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Value (KRW)"),
        ui::header_cell("Change"),
    ]);

    let start = history.len().saturating_sub(limit);
    for (i, point) in history.iter().enumerate().skip(start) {
        let change = i
            .checked_sub(1)
            .map(|prev| &history[prev])
            .filter(|prev| prev.value > 0.0)
            .map(|prev| (point.value - prev.value) / prev.value * 100.0);

        table.add_row(vec![
            Cell::new(point.date.format("%Y-%m-%d").to_string()),
            ui::right_cell(ui::format_krw(point.value)),
            change.map_or_else(|| ui::right_cell("-".to_string()), ui::change_cell),
        ]);
    }

    table.to_string()
}

pub fn run(history: &[HistoryPoint], limit: usize) -> Result<()> {
    if history.is_empty() {
        println!(
            "{}",
            ui::style_text(
                "No history yet. Run `wonfolio summary` to record today's value.",
                ui::StyleType::Subtle
            )
        );
        return Ok(());
    }

    println!("{}", display_history(history, limit));

    if let (Some(first), Some(last)) = (history.first(), history.last())
        && history.len() > 1
    {
        println!(
            "\n{} {} → {} ({} days recorded)",
            ui::style_text("Since", ui::StyleType::TotalLabel),
            first.date,
            ui::format_krw(last.value - first.value),
            history.len()
        );
    }
    Ok(())
}
