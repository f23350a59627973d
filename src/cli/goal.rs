use super::ui;
use crate::core::projection::GoalProjection;
use anyhow::Result;

impl GoalProjection {
    pub fn display_summary(&self) -> String {
        let mut output = format!(
            "{}\n\n{} {}\n{} {}\n{} {} / month at {:.2}% a year\n{} {:.1}%\n",
            ui::style_text("Goal", ui::StyleType::Title),
            ui::style_text("Current:", ui::StyleType::TotalLabel),
            ui::format_krw(self.current_value),
            ui::style_text("Target:", ui::StyleType::TotalLabel),
            ui::format_krw(self.target_value),
            ui::style_text("Saving:", ui::StyleType::TotalLabel),
            ui::format_krw(self.monthly_contribution),
            self.annual_rate_pct,
            ui::style_text("Progress:", ui::StyleType::TotalLabel),
            self.progress_pct(),
        );

        let (years, months) = self.years_and_months();
        let eta = if self.months == 0 {
            ui::style_text("Target already reached", ui::StyleType::TotalValue)
        } else if self.is_capped() {
            ui::style_text(
                &format!("Not reachable within {years} years at this pace"),
                ui::StyleType::Warning,
            )
        } else {
            ui::style_text(
                &format!("{years} years {months} months ({} months)", self.months),
                ui::StyleType::TotalValue,
            )
        };
        output.push_str(&format!(
            "{} {}",
            ui::style_text("Time to target:", ui::StyleType::TotalLabel),
            eta
        ));
        output
    }
}

pub fn run(projection: &GoalProjection) -> Result<()> {
    println!("{}", projection.display_summary());

    if !projection.is_capped() && projection.months > 0 {
        // Year-end checkpoints along the projected path
        let path = projection.path();
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Year"),
            ui::header_cell("Projected (KRW)"),
        ]);
        for (month, value) in path.iter().enumerate().skip(12).step_by(12) {
            table.add_row(vec![
                ui::right_cell((month / 12).to_string()),
                ui::right_cell(ui::format_krw(*value)),
            ]);
        }
        if path.len() > 12 {
            ui::print_separator();
            println!("{table}");
        }
    }
    Ok(())
}
