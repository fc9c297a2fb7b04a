//! Schema reconciliation of the three curve sets into unified rows.

use curve_core::{CurvePoint, CurveRow, CurveType};

fn to_row(point: &CurvePoint, curve_type: CurveType) -> CurveRow {
    CurveRow {
        project_number: point.key.project_number.trim().to_string(),
        stage: point.key.stage.trim().to_string(),
        sub_stage: point.key.sub_stage.trim().to_string(),
        date: point.date,
        value: point.cumulative_value,
        period_value: point.period_value,
        curve_type,
    }
}

/// Tag and concatenate the curve sets, then order rows by
/// (entity, curve type, date).
///
/// The sort is stable, so same-date actual rows keep their ledger order. No
/// values are changed.
pub fn merge_curves(
    actual: &[CurvePoint],
    planned: &[CurvePoint],
    forecast: &[CurvePoint],
) -> Vec<CurveRow> {
    let mut rows: Vec<CurveRow> = Vec::with_capacity(actual.len() + planned.len() + forecast.len());
    for (points, curve_type) in [
        (actual, CurveType::Actual),
        (planned, CurveType::Planned),
        (forecast, CurveType::Forecast),
    ] {
        rows.extend(points.iter().map(|p| to_row(p, curve_type)));
    }
    rows.sort_by(|a, b| {
        (&a.project_number, &a.stage, &a.sub_stage, a.curve_type, a.date).cmp(&(
            &b.project_number,
            &b.stage,
            &b.sub_stage,
            b.curve_type,
            b.date,
        ))
    });
    rows
}
