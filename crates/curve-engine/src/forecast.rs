//! Forecast curve: the unspent budget allocated over future planned dates,
//! stacked on top of the actual cost to date.

use crate::planned::PlannedCurve;
use crate::CurveOverflow;
use chrono::NaiveDate;
use curve_core::{CurvePoint, CurveType, ForecastWeighting};
use rust_decimal::Decimal;

/// Budget not yet consumed by actual spend, never negative.
pub fn remaining_amount(budget: Decimal, total_actual: Decimal) -> Decimal {
    match budget.checked_sub(total_actual) {
        Some(r) => r.max(Decimal::ZERO),
        None if budget > total_actual => Decimal::MAX,
        None => Decimal::ZERO,
    }
}

/// Allocate `budget - total_actual` over the planned points after `as_of`.
///
/// Each future point receives `weight * remaining`; the cumulative forecast is
/// the running sum of those allocations plus `total_actual`, so the first
/// forecast value is never below the last actual value. Returns no points
/// when the planned curve has no dates after `as_of`, and an error when the
/// running total leaves the `Decimal` range.
pub fn build_forecast_curve(
    planned: &PlannedCurve,
    total_actual: Decimal,
    as_of: NaiveDate,
    weighting: ForecastWeighting,
) -> Result<Vec<CurvePoint>, CurveOverflow> {
    let overflow = || CurveOverflow {
        entity: planned.key.clone(),
        curve: CurveType::Forecast,
    };
    let future: Vec<_> = planned.future_points(as_of).collect();
    if future.is_empty() {
        return Ok(Vec::new());
    }
    let remaining = remaining_amount(planned.budget, total_actual);
    // fractions are within [0, 1], so at most 101 of them sum without overflow
    let future_total: Decimal = future.iter().map(|p| p.fraction).sum();

    let mut running = Decimal::ZERO;
    let mut points = Vec::with_capacity(future.len());
    for p in future {
        let weight = match weighting {
            ForecastWeighting::CumulativeFraction => p.fraction,
            ForecastWeighting::NormalizedShare if future_total.is_zero() => Decimal::ZERO,
            ForecastWeighting::NormalizedShare => p.fraction / future_total,
        };
        let value = weight.checked_mul(remaining).ok_or_else(overflow)?;
        running = running.checked_add(value).ok_or_else(overflow)?;
        points.push(CurvePoint {
            key: planned.key.clone(),
            date: p.date,
            period_value: value,
            cumulative_value: running.checked_add(total_actual).ok_or_else(overflow)?,
            curve_type: CurveType::Forecast,
        });
    }
    Ok(points)
}
