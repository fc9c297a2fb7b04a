//! Normalized spending templates keyed by sub-stage and completion bucket.

use curve_core::raw::{coerce_decimal_opt, coerce_text, RawCurvePoint};
use curve_core::{CompletionBucket, NormalizedCurvePoint};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::warn;

/// Read-only lookup of cumulative spend fraction per (sub-stage, bucket).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedCurveTable {
    curves: BTreeMap<String, BTreeMap<CompletionBucket, Decimal>>,
}

impl NormalizedCurveTable {
    /// Build from validated points. A later point for the same bucket replaces
    /// an earlier one.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = NormalizedCurvePoint>,
    {
        let mut curves: BTreeMap<String, BTreeMap<CompletionBucket, Decimal>> = BTreeMap::new();
        for p in points {
            curves
                .entry(p.sub_stage)
                .or_default()
                .insert(p.completion, p.cumulative_fraction);
        }
        Self { curves }
    }

    /// Coerce and validate raw template rows. Returns the table and the number
    /// of rows that were rejected.
    pub fn from_raw(rows: &[RawCurvePoint]) -> (Self, usize) {
        let mut rejected = 0usize;
        let mut points = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let parsed = coerce_text(&row.sub_stage).and_then(|sub_stage| {
                let completion = coerce_decimal_opt(&row.completion_fraction)?;
                let cumulative = coerce_decimal_opt(&row.cumulative_spend_fraction)?;
                NormalizedCurvePoint::new(sub_stage, completion, cumulative).ok()
            });
            match parsed {
                Some(p) => points.push(p),
                None => {
                    warn!(row = idx, "rejected normalized curve row");
                    rejected += 1;
                }
            }
        }
        (Self::from_points(points), rejected)
    }

    /// Cumulative spend fraction at `bucket`; zero when the template has no
    /// point there.
    pub fn lookup(&self, sub_stage: &str, bucket: CompletionBucket) -> Decimal {
        self.curves
            .get(sub_stage)
            .and_then(|c| c.get(&bucket))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Like [`lookup`](Self::lookup) for an unrounded completion fraction.
    pub fn lookup_fraction(&self, sub_stage: &str, completion_fraction: Decimal) -> Decimal {
        CompletionBucket::from_fraction(completion_fraction)
            .map(|b| self.lookup(sub_stage, b))
            .unwrap_or(Decimal::ZERO)
    }

    /// Largest cumulative fraction defined for a sub-stage.
    pub fn max_fraction(&self, sub_stage: &str) -> Decimal {
        self.curves
            .get(sub_stage)
            .and_then(|c| c.values().max())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn has_sub_stage(&self, sub_stage: &str) -> bool {
        self.curves.contains_key(sub_stage)
    }

    /// Total number of template points.
    pub fn len(&self) -> usize {
        self.curves.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}
