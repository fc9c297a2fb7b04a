//! Planned curve: an entity's budget projected through its sub-stage template
//! over the real schedule window.
//!
//! Each calendar day of the window is mapped to a completion bucket
//! (`round(offset / duration, 2)`), the template is looked up at that bucket
//! and only the earliest day reaching each distinct spend fraction is kept.
//! The kept fractions are strictly increasing in date order, so the curve is
//! a step function with at most 101 points.
//!
//! A point's cumulative value is `fraction * budget`; its period value is the
//! increment over the previous kept point. Cumulative values are never summed
//! a second time.

use crate::resolver::ResolvedEntity;
use crate::table::NormalizedCurveTable;
use chrono::NaiveDate;
use curve_core::{CompletionBucket, CurvePoint, CurveType, EntityKey};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::debug;

/// A kept point of a planned curve.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPoint {
    pub date: NaiveDate,
    /// Completion bucket first reached on `date`.
    pub completion: CompletionBucket,
    /// Template cumulative spend fraction at that bucket.
    pub fraction: Decimal,
    pub period_value: Decimal,
    pub cumulative_value: Decimal,
}

/// Planned curve for one entity, points ordered by date.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedCurve {
    pub key: EntityKey,
    pub budget: Decimal,
    pub points: Vec<PlannedPoint>,
}

impl PlannedCurve {
    /// Points dated strictly after `as_of`.
    pub fn future_points(&self, as_of: NaiveDate) -> impl Iterator<Item = &PlannedPoint> {
        self.points.iter().filter(move |p| p.date > as_of)
    }

    pub fn to_curve_points(&self) -> Vec<CurvePoint> {
        self.points
            .iter()
            .map(|p| CurvePoint {
                key: self.key.clone(),
                date: p.date,
                period_value: p.period_value,
                cumulative_value: p.cumulative_value,
                curve_type: CurveType::Planned,
            })
            .collect()
    }
}

/// Build the planned curve for an entity, or `None` when its schedule window
/// is missing or not strictly ordered.
pub fn build_planned_curve(
    entity: &ResolvedEntity,
    table: &NormalizedCurveTable,
) -> Option<PlannedCurve> {
    let window = match entity.schedule.window() {
        Ok(w) => w,
        Err(e) => {
            debug!(entity = %entity.key, error = %e, "skipping planned curve");
            return None;
        }
    };
    let sub_stage = entity.key.sub_stage.as_str();
    if !table.has_sub_stage(sub_stage) {
        debug!(entity = %entity.key, "no curve template for sub-stage, planned spend stays at zero");
    }
    let duration = window.duration_days();

    let mut seen: BTreeSet<Decimal> = BTreeSet::new();
    let mut last_bucket: Option<CompletionBucket> = None;
    let mut points: Vec<PlannedPoint> = Vec::new();
    let mut prev_cumulative = Decimal::ZERO;

    for offset in 0..duration {
        let Some(bucket) = CompletionBucket::from_offset(offset, duration) else {
            continue;
        };
        // consecutive days in one bucket share a fraction; only the first can be kept
        if last_bucket == Some(bucket) {
            continue;
        }
        last_bucket = Some(bucket);

        let fraction = table.lookup(sub_stage, bucket);
        if !seen.insert(fraction) {
            continue;
        }
        if points.last().is_some_and(|p| fraction <= p.fraction) {
            continue;
        }
        let Some(date) = window.date_at(offset) else {
            break;
        };
        let cumulative_value = fraction * entity.budget;
        points.push(PlannedPoint {
            date,
            completion: bucket,
            fraction,
            period_value: cumulative_value - prev_cumulative,
            cumulative_value,
        });
        prev_cumulative = cumulative_value;
    }

    Some(PlannedCurve {
        key: entity.key.clone(),
        budget: entity.budget,
        points,
    })
}
