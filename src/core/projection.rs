//! Months-to-goal projection by monthly compounding.

/// Simulation horizon: 50 years.
pub const MAX_MONTHS: u32 = 600;

fn monthly_rate(annual_rate_pct: f64) -> f64 {
    annual_rate_pct / 100.0 / 12.0
}

/// Months simulated and whether the target was reached within them.
fn simulate(
    current_value: f64,
    target_value: f64,
    monthly_contribution: f64,
    annual_rate_pct: f64,
) -> (u32, bool) {
    let rate = monthly_rate(annual_rate_pct);
    let mut current = current_value;
    let mut months = 0;
    while current < target_value && months < MAX_MONTHS {
        current = current * (1.0 + rate) + monthly_contribution;
        months += 1;
    }
    (months, current >= target_value)
}

/// Months of growth plus contributions until `current` reaches `target`.
///
/// Returns [`MAX_MONTHS`] when the target is not reached within the
/// horizon; callers should read that as "not achievable", not as an estimate.
pub fn months_to_target(
    current_value: f64,
    target_value: f64,
    monthly_contribution: f64,
    annual_rate_pct: f64,
) -> u32 {
    simulate(
        current_value,
        target_value,
        monthly_contribution,
        annual_rate_pct,
    )
    .0
}

/// Projected value at the end of each month, starting with month 0.
pub fn projected_path(
    current_value: f64,
    monthly_contribution: f64,
    annual_rate_pct: f64,
    months: u32,
) -> Vec<f64> {
    let rate = monthly_rate(annual_rate_pct);
    std::iter::successors(Some(current_value), |value| {
        Some(value * (1.0 + rate) + monthly_contribution)
    })
    .take(months as usize + 1)
    .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalProjection {
    pub current_value: f64,
    pub target_value: f64,
    pub monthly_contribution: f64,
    pub annual_rate_pct: f64,
    pub months: u32,
    reached: bool,
}

impl GoalProjection {
    pub fn new(
        current_value: f64,
        target_value: f64,
        monthly_contribution: f64,
        annual_rate_pct: f64,
    ) -> Self {
        let (months, reached) = simulate(
            current_value,
            target_value,
            monthly_contribution,
            annual_rate_pct,
        );
        Self {
            current_value,
            target_value,
            monthly_contribution,
            annual_rate_pct,
            months,
            reached,
        }
    }

    /// True when the horizon ran out before the target was reached.
    pub fn is_capped(&self) -> bool {
        !self.reached
    }

    pub fn years_and_months(&self) -> (u32, u32) {
        (self.months / 12, self.months % 12)
    }

    /// Share of the target already reached, clamped to 0..=100.
    pub fn progress_pct(&self) -> f64 {
        if self.target_value <= 0.0 {
            return 100.0;
        }
        (self.current_value / self.target_value * 100.0).clamp(0.0, 100.0)
    }

    pub fn path(&self) -> Vec<f64> {
        projected_path(
            self.current_value,
            self.monthly_contribution,
            self.annual_rate_pct,
            self.months,
        )
    }
}
