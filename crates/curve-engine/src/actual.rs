//! Cumulative actual-cost curve from ledger entries.

use crate::CurveOverflow;
use chrono::NaiveDate;
use curve_core::{ActualGrouping, ActualTransaction, CurvePoint, CurveType, EntityKey};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Actual curve for one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct ActualCurve {
    pub key: EntityKey,
    pub points: Vec<CurvePoint>,
    /// Zero-amount rows (or zero daily totals) left out of the curve.
    pub dropped_zero: usize,
}

impl ActualCurve {
    /// Cumulative actual cost after the last point, zero for an empty curve.
    pub fn total(&self) -> Decimal {
        self.points
            .last()
            .map(|p| p.cumulative_value)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Order non-zero transactions by date and accumulate them.
///
/// Same-date rows keep their ledger union position order. Negative
/// adjustments may make the cumulative value decrease.
pub fn build_actual_curve(
    key: &EntityKey,
    transactions: &[ActualTransaction],
    grouping: ActualGrouping,
) -> Result<ActualCurve, CurveOverflow> {
    let overflow = || CurveOverflow {
        entity: key.clone(),
        curve: CurveType::Actual,
    };
    let (entries, dropped_zero) = match grouping {
        ActualGrouping::PerTransaction => {
            let mut kept: Vec<&ActualTransaction> =
                transactions.iter().filter(|t| !t.amount.is_zero()).collect();
            kept.sort_by_key(|t| (t.date, t.position));
            let dropped = transactions.len() - kept.len();
            (
                kept.into_iter()
                    .map(|t| (t.date, t.amount))
                    .collect::<Vec<(NaiveDate, Decimal)>>(),
                dropped,
            )
        }
        ActualGrouping::DailyTotal => {
            let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
            for t in transactions {
                let day = by_day.entry(t.date).or_insert(Decimal::ZERO);
                *day = day.checked_add(t.amount).ok_or_else(overflow)?;
            }
            let days = by_day.len();
            let kept: Vec<(NaiveDate, Decimal)> =
                by_day.into_iter().filter(|(_, v)| !v.is_zero()).collect();
            let dropped = days - kept.len();
            (kept, dropped)
        }
    };

    let mut running = Decimal::ZERO;
    let mut points = Vec::with_capacity(entries.len());
    for (date, amount) in entries {
        running = running.checked_add(amount).ok_or_else(overflow)?;
        points.push(CurvePoint {
            key: key.clone(),
            date,
            period_value: amount,
            cumulative_value: running,
            curve_type: CurveType::Actual,
        });
    }

    Ok(ActualCurve {
        key: key.clone(),
        points,
        dropped_zero,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_core::LedgerSource;
    use proptest::prelude::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn tx(day: u32, amount: i64, position: usize) -> ActualTransaction {
        ActualTransaction {
            date: d(day),
            amount: Decimal::new(amount, 0),
            source: LedgerSource::Invoice,
            position,
        }
    }

    fn key() -> EntityKey {
        EntityKey::new("P1", "S1", "SS1")
    }

    #[test]
    fn zero_rows_are_dropped_and_order_is_stable() {
        let txs = vec![tx(5, 100, 0), tx(2, 0, 1), tx(2, 50, 2), tx(5, -30, 3), tx(2, 20, 4)];
        let c = build_actual_curve(&key(), &txs, ActualGrouping::PerTransaction).unwrap();
        let got: Vec<(NaiveDate, Decimal, Decimal)> = c
            .points
            .iter()
            .map(|p| (p.date, p.period_value, p.cumulative_value))
            .collect();
        let dec = |v| Decimal::new(v, 0);
        assert_eq!(
            got,
            vec![
                (d(2), dec(50), dec(50)),
                (d(2), dec(20), dec(70)),
                (d(5), dec(100), dec(170)),
                (d(5), dec(-30), dec(140)),
            ]
        );
        assert_eq!(c.dropped_zero, 1);
        assert_eq!(c.total(), Decimal::new(140, 0));
    }

    #[test]
    fn offsetting_rows_are_not_paired() {
        let txs = vec![tx(1, 100, 0), tx(1, -100, 1)];
        let c = build_actual_curve(&key(), &txs, ActualGrouping::PerTransaction).unwrap();
        assert_eq!(c.points.len(), 2);
        assert_eq!(c.total(), Decimal::ZERO);
    }

    #[test]
    fn daily_totals_drop_offsetting_days() {
        let txs = vec![tx(1, 100, 0), tx(1, -100, 1), tx(3, 40, 2), tx(3, 2, 3)];
        let c = build_actual_curve(&key(), &txs, ActualGrouping::DailyTotal).unwrap();
        assert_eq!(c.points.len(), 1);
        assert_eq!(c.points[0].date, d(3));
        assert_eq!(c.points[0].cumulative_value, Decimal::new(42, 0));
        assert_eq!(c.dropped_zero, 1);
    }

    #[test]
    fn empty_curve_total_is_zero() {
        let c = build_actual_curve(&key(), &[tx(1, 0, 0)], ActualGrouping::PerTransaction).unwrap();
        assert!(c.points.is_empty());
        assert_eq!(c.total(), Decimal::ZERO);
    }

    #[test]
    fn running_total_past_decimal_range_is_an_overflow() {
        let big = Decimal::MAX - Decimal::ONE;
        let txs = vec![
            ActualTransaction { amount: big, ..tx(1, 0, 0) },
            ActualTransaction { amount: big, ..tx(2, 0, 1) },
        ];
        for grouping in [ActualGrouping::PerTransaction, ActualGrouping::DailyTotal] {
            let err = build_actual_curve(&key(), &txs, grouping).unwrap_err();
            assert_eq!(err.entity, key());
            assert_eq!(err.curve, CurveType::Actual);
        }
        let same_day = vec![
            ActualTransaction { amount: big, ..tx(1, 0, 0) },
            ActualTransaction { amount: big, ..tx(1, 0, 1) },
        ];
        assert!(build_actual_curve(&key(), &same_day, ActualGrouping::DailyTotal).is_err());
    }

    proptest! {
        #[test]
        fn zero_rows_never_surface(amounts in proptest::collection::vec(-5i64..5, 0..60)) {
            let txs: Vec<ActualTransaction> = amounts
                .iter()
                .enumerate()
                .map(|(i, &a)| tx(1 + (i as u32 % 28), a, i))
                .collect();
            let c = build_actual_curve(&key(), &txs, ActualGrouping::PerTransaction).unwrap();
            prop_assert!(c.points.iter().all(|p| !p.period_value.is_zero()));
            let expected: Decimal = txs.iter().map(|t| t.amount).sum();
            prop_assert_eq!(c.total(), expected);
            prop_assert_eq!(c.points.len() + c.dropped_zero, txs.len());
            for w in c.points.windows(2) {
                prop_assert!(w[0].date <= w[1].date);
            }
        }
    }
}
