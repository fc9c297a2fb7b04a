#![deny(warnings)]

//! Spending curve computation for capital projects.
//!
//! One run turns a raw input snapshot into three typed curves per entity:
//! - ACTUAL: ledger transactions accumulated in date order
//! - PLANNED: the budget projected through the sub-stage template onto the
//!   schedule window
//! - FORECAST: the unspent budget allocated over planned dates after the
//!   as-of date, continuing from the actual total
//!
//! and merges them into one ordered row set. Entities are independent, so
//! per-entity work runs on a rayon pool when enabled.

pub mod actual;
pub mod forecast;
pub mod merge;
pub mod planned;
pub mod resolver;
pub mod table;

pub use actual::{build_actual_curve, ActualCurve};
pub use forecast::{build_forecast_curve, remaining_amount};
pub use merge::merge_curves;
pub use planned::{build_planned_curve, PlannedCurve, PlannedPoint};
pub use resolver::{resolve_entities, ResolveReport, ResolvedEntity, ResolvedInputs};
pub use table::NormalizedCurveTable;

use chrono::NaiveDate;
use curve_core::raw::RawInputs;
use curve_core::{CurvePoint, CurveRow, CurveType, EngineConfig, EntityKey};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that stop a run before any output is produced.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// A required input set was empty, which would silently yield no curves.
    #[error("no usable rows in {dataset}")]
    EmptyInput { dataset: &'static str },
    /// The run needs an as-of date to split past from future.
    #[error("as-of date is not configured")]
    MissingAsOf,
}

/// A running total for one entity left the range `Decimal` can hold. The
/// entity's curve is skipped and counted, the run carries on.
#[derive(Debug, Error, PartialEq)]
#[error("{curve} total overflowed for {entity}")]
pub struct CurveOverflow {
    pub entity: EntityKey,
    pub curve: CurveType,
}

/// Counters for one run. Entities dropped by validation show up here rather
/// than as errors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub as_of: NaiveDate,
    pub resolve: ResolveReport,
    pub curve_rows_rejected: usize,
    pub zero_transactions_dropped: usize,
    /// Resolved entities skipped for a missing or inverted schedule window.
    pub invalid_windows: usize,
    /// Entities whose ACTUAL or FORECAST total overflowed. An overflowed
    /// ACTUAL also suppresses that entity's FORECAST.
    pub overflowed_curves: usize,
    pub actual_points: usize,
    pub planned_points: usize,
    pub forecast_points: usize,
    pub entities_with_forecast: usize,
}

/// Output of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct CurveRun {
    pub actual: Vec<CurvePoint>,
    pub planned: Vec<CurvePoint>,
    pub forecast: Vec<CurvePoint>,
    /// Unified rows ordered by (entity, type, date).
    pub rows: Vec<CurveRow>,
    pub summary: RunSummary,
}

fn map_entities<T, R, F>(items: &[T], parallel: bool, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

fn skip_overflowed<T>(
    results: Vec<Result<T, CurveOverflow>>,
    overflowed: &mut BTreeSet<EntityKey>,
) -> Vec<T> {
    results
        .into_iter()
        .filter_map(|r| match r {
            Ok(curve) => Some(curve),
            Err(e) => {
                warn!(entity = %e.entity, curve = %e.curve, "curve total overflowed, entity skipped");
                overflowed.insert(e.entity);
                None
            }
        })
        .collect()
}

/// Compute actual, planned and forecast curves for every entity in `inputs`.
pub fn compute_curves(inputs: &RawInputs, config: &EngineConfig) -> Result<CurveRun, EngineError> {
    let as_of = config.as_of.ok_or(EngineError::MissingAsOf)?;

    let (table, curve_rows_rejected) = NormalizedCurveTable::from_raw(&inputs.curve);
    if table.is_empty() {
        return Err(EngineError::EmptyInput {
            dataset: "normalized curve",
        });
    }

    let resolved = resolve_entities(inputs);
    if resolved.entities.is_empty() && resolved.transactions.is_empty() {
        return Err(EngineError::EmptyInput {
            dataset: "budgets, schedules and ledgers",
        });
    }

    let mut overflowed: BTreeSet<EntityKey> = BTreeSet::new();

    let ledgers: Vec<(&EntityKey, &Vec<_>)> = resolved.transactions.iter().collect();
    let actual_curves = skip_overflowed(
        map_entities(&ledgers, config.parallel, |(key, txs)| {
            build_actual_curve(key, txs, config.actual_grouping)
        }),
        &mut overflowed,
    );
    let totals: BTreeMap<&EntityKey, Decimal> =
        actual_curves.iter().map(|c| (&c.key, c.total())).collect();

    let planned_curves: Vec<PlannedCurve> =
        map_entities(&resolved.entities, config.parallel, |e| build_planned_curve(e, &table))
            .into_iter()
            .flatten()
            .collect();

    let forecastable: Vec<&PlannedCurve> = planned_curves
        .iter()
        .filter(|p| !overflowed.contains(&p.key))
        .collect();
    let forecast_curves = skip_overflowed(
        map_entities(&forecastable, config.parallel, |p| {
            let total_actual = totals.get(&p.key).copied().unwrap_or(Decimal::ZERO);
            build_forecast_curve(p, total_actual, as_of, config.forecast_weighting)
        }),
        &mut overflowed,
    );

    let actual: Vec<CurvePoint> = actual_curves.iter().flat_map(|c| c.points.clone()).collect();
    let planned: Vec<CurvePoint> = planned_curves.iter().flat_map(|c| c.to_curve_points()).collect();
    let entities_with_forecast = forecast_curves.iter().filter(|f| !f.is_empty()).count();
    let forecast: Vec<CurvePoint> = forecast_curves.into_iter().flatten().collect();
    let rows = merge_curves(&actual, &planned, &forecast);

    let summary = RunSummary {
        as_of,
        curve_rows_rejected,
        zero_transactions_dropped: actual_curves.iter().map(|c| c.dropped_zero).sum(),
        invalid_windows: resolved.entities.len() - planned_curves.len(),
        overflowed_curves: overflowed.len(),
        actual_points: actual.len(),
        planned_points: planned.len(),
        forecast_points: forecast.len(),
        entities_with_forecast,
        resolve: resolved.report,
    };
    info!(
        %as_of,
        entities = summary.resolve.entities,
        invalid_windows = summary.invalid_windows,
        actual = summary.actual_points,
        planned = summary.planned_points,
        forecast = summary.forecast_points,
        "curves computed"
    );

    Ok(CurveRun {
        actual,
        planned,
        forecast,
        rows,
        summary,
    })
}
