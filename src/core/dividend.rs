//! Dividend yield and growth derivations.

use crate::core::market::{DividendPayment, DividendProfile};
use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, prelude::*};
use rust_finprim::rate::cagr;
use std::collections::BTreeMap;
use tracing::debug;

/// Yields above this are provider data errors, not real payouts.
pub const YIELD_CEILING_PCT: f64 = 30.0;

/// Complete calendar years needed before growth is reported.
pub const MIN_HISTORY_YEARS: usize = 4;

pub const MAX_GROWTH_PERIODS: usize = 4;

/// Yield percentage from the first usable source: forward dividend rate over
/// price, trailing dividend rate over price, then the provider's own yield.
pub fn derive_yield(profile: &DividendProfile, price: Option<f64>) -> f64 {
    let price = price.filter(|p| p.is_finite() && *p > 0.0);
    let per_price = |rate: Option<f64>| {
        rate.filter(|r| *r > 0.0)
            .zip(price)
            .map(|(rate, price)| rate / price * 100.0)
    };

    let raw = per_price(profile.dividend_rate)
        .or_else(|| per_price(profile.trailing_annual_rate))
        .or(profile.yield_pct)
        .unwrap_or(0.0);

    sanitize_yield(raw)
}

pub fn sanitize_yield(raw: f64) -> f64 {
    if !raw.is_finite() || raw < 0.0 {
        return 0.0;
    }
    if raw > YIELD_CEILING_PCT {
        debug!("Yield {raw:.2}% exceeds {YIELD_CEILING_PCT}% ceiling, discarding");
        return 0.0;
    }
    raw
}

/// Compound annual growth (percent) of yearly dividend totals.
///
/// Payments are summed per calendar year, with missing years counted as
/// zero, and `today`'s year is left out as incomplete. The most recent
/// complete year is compared with the year up to [`MAX_GROWTH_PERIODS`]
/// years earlier. Fewer than [`MIN_HISTORY_YEARS`] complete years or a
/// non-positive starting year yields `0.0`.
pub fn dividend_growth(payments: &[DividendPayment], today: NaiveDate) -> f64 {
    let mut by_year: BTreeMap<i32, f64> = BTreeMap::new();
    for payment in payments.iter().filter(|p| p.amount.is_finite()) {
        *by_year.entry(payment.date.year()).or_default() += payment.amount;
    }

    let Some(&first) = by_year.keys().next() else {
        return 0.0;
    };
    let last_complete = today.year() - 1;

    let complete: Vec<f64> = (first..=last_complete)
        .map(|year| by_year.get(&year).copied().unwrap_or(0.0))
        .collect();
    if complete.len() < MIN_HISTORY_YEARS {
        debug!(
            "Only {} complete years of dividends, need {MIN_HISTORY_YEARS}",
            complete.len()
        );
        return 0.0;
    }

    let periods = MAX_GROWTH_PERIODS.min(complete.len() - 1);
    let recent = complete[complete.len() - 1];
    let past = complete[complete.len() - 1 - periods];

    if past <= 0.0 {
        return 0.0;
    }
    if recent <= 0.0 {
        return -100.0;
    }

    match growth_rate(past, recent, periods) {
        Some(pct) => pct,
        None => {
            debug!("Could not compute dividend CAGR for {past} -> {recent} over {periods} years");
            0.0
        }
    }
}

fn growth_rate(past: f64, recent: f64, periods: usize) -> Option<f64> {
    let begin_bal = Decimal::from_f64(past)?;
    let end_bal = Decimal::from_f64(recent)?;
    let n_years = Decimal::from_usize(periods)?;
    let rate = cagr(begin_bal, end_bal, n_years);
    (rate * Decimal::from(100)).to_f64()
}
