//! Groups raw rows by entity key and typecasts budget, schedule and ledger
//! fields.

use curve_core::raw::{coerce_date, coerce_decimal, coerce_text, RawInputs};
use curve_core::{validate_key, ActualTransaction, EntityKey, ScheduleDates, ValidationError};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// An entity with both a budget and a schedule match.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedEntity {
    pub key: EntityKey,
    /// Summed approved budget, never negative.
    pub budget: Decimal,
    /// Schedule dates as found; validity is checked when planning.
    pub schedule: ScheduleDates,
}

/// Counters describing what the resolver kept and dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    pub budget_rows: usize,
    pub budget_rows_invalid_key: usize,
    pub negative_budgets_clamped: usize,
    /// Keys whose budget rows sum past the `Decimal` range; the entity is skipped.
    pub budget_overflows: usize,
    pub schedule_rows: usize,
    pub schedule_rows_invalid_key: usize,
    pub duplicate_schedules: usize,
    /// Budget keys without a schedule row.
    pub missing_schedule: usize,
    /// Schedule keys without a budget row.
    pub missing_budget: usize,
    pub entities: usize,
    pub transactions: usize,
    pub transactions_invalid_key: usize,
    pub transactions_invalid_date: usize,
}

/// Typed inputs ready for curve building.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedInputs {
    /// Inner join of budgets and schedules, ordered by key.
    pub entities: Vec<ResolvedEntity>,
    /// Ledger rows per key in union order, including keys without a budget.
    pub transactions: BTreeMap<EntityKey, Vec<ActualTransaction>>,
    pub report: ResolveReport,
}

fn entity_key(project: &Value, stage: &Value, sub_stage: &Value) -> Result<EntityKey, ValidationError> {
    let text = |v: &Value| coerce_text(v).unwrap_or_default();
    let key = EntityKey::new(text(project), text(stage), text(sub_stage));
    validate_key(&key)?;
    Ok(key)
}

/// Resolve a raw snapshot into per-entity budgets, schedules and ledgers.
pub fn resolve_entities(inputs: &RawInputs) -> ResolvedInputs {
    let mut report = ResolveReport::default();

    // None marks a key whose running total overflowed
    let mut sums: BTreeMap<EntityKey, Option<Decimal>> = BTreeMap::new();
    for row in &inputs.budgets {
        report.budget_rows += 1;
        let key = match entity_key(&row.project_number, &row.stage, &row.sub_stage) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "budget row dropped");
                report.budget_rows_invalid_key += 1;
                continue;
            }
        };
        let amount = coerce_decimal(&row.budget_current_approved);
        let total = sums.entry(key).or_insert(Some(Decimal::ZERO));
        *total = total.and_then(|t| t.checked_add(amount));
    }
    let mut budgets: BTreeMap<EntityKey, Decimal> = BTreeMap::new();
    let mut overflowed: Vec<EntityKey> = Vec::new();
    for (key, total) in sums {
        match total {
            Some(total) if total < Decimal::ZERO => {
                warn!(entity = %key, budget = %total, "negative budget total clamped to zero");
                report.negative_budgets_clamped += 1;
                budgets.insert(key, Decimal::ZERO);
            }
            Some(total) => {
                budgets.insert(key, total);
            }
            None => {
                warn!(entity = %key, "budget total overflowed, entity skipped");
                report.budget_overflows += 1;
                overflowed.push(key);
            }
        }
    }

    let mut schedules: BTreeMap<EntityKey, ScheduleDates> = BTreeMap::new();
    for row in &inputs.schedules {
        report.schedule_rows += 1;
        let key = match entity_key(&row.project_number, &row.stage, &row.sub_stage) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "schedule row dropped");
                report.schedule_rows_invalid_key += 1;
                continue;
            }
        };
        let dates = ScheduleDates {
            start: coerce_date(&row.current_start),
            end: coerce_date(&row.current_end),
        };
        match schedules.entry(key) {
            Entry::Vacant(v) => {
                v.insert(dates);
            }
            Entry::Occupied(o) => {
                debug!(entity = %o.key(), "duplicate schedule row ignored");
                report.duplicate_schedules += 1;
            }
        }
    }

    for key in &overflowed {
        schedules.remove(key);
    }

    let mut entities = Vec::with_capacity(budgets.len().min(schedules.len()));
    for (key, budget) in budgets {
        match schedules.remove(&key) {
            Some(schedule) => entities.push(ResolvedEntity {
                key,
                budget,
                schedule,
            }),
            None => {
                debug!(entity = %key, "budget without schedule");
                report.missing_schedule += 1;
            }
        }
    }
    report.missing_budget = schedules.len();
    report.entities = entities.len();

    let mut transactions: BTreeMap<EntityKey, Vec<ActualTransaction>> = BTreeMap::new();
    let mut position = 0usize;
    for batch in &inputs.ledgers {
        for row in &batch.rows {
            let this = position;
            position += 1;
            report.transactions += 1;
            let key = match entity_key(&row.project_number, &row.stage, &row.sub_stage) {
                Ok(key) => key,
                Err(e) => {
                    debug!(error = %e, source = batch.source.as_str(), "transaction dropped");
                    report.transactions_invalid_key += 1;
                    continue;
                }
            };
            let Some(date) = coerce_date(&row.invoice_date) else {
                warn!(entity = %key, source = batch.source.as_str(), "transaction without a valid date dropped");
                report.transactions_invalid_date += 1;
                continue;
            };
            transactions.entry(key).or_default().push(ActualTransaction {
                date,
                amount: coerce_decimal(&row.actuals_cost),
                source: batch.source,
                position: this,
            });
        }
    }

    info!(
        entities = report.entities,
        missing_schedule = report.missing_schedule,
        missing_budget = report.missing_budget,
        ledger_entities = transactions.len(),
        "resolved inputs"
    );

    ResolvedInputs {
        entities,
        transactions,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use curve_core::raw::{LedgerBatch, RawBudgetRow, RawScheduleRow, RawTransactionRow};
    use curve_core::LedgerSource;
    use serde_json::json;

    fn budget(p: &str, amount: Value) -> RawBudgetRow {
        RawBudgetRow {
            project_number: json!(p),
            stage: json!("S1"),
            sub_stage: json!("SS1"),
            budget_current_approved: amount,
        }
    }

    fn schedule(p: &str, start: &str, end: &str) -> RawScheduleRow {
        RawScheduleRow {
            project_number: json!(p),
            stage: json!("S1"),
            sub_stage: json!("SS1"),
            current_start: json!(start),
            current_end: json!(end),
        }
    }

    fn tx(p: &str, date: &str, cost: Value) -> RawTransactionRow {
        RawTransactionRow {
            project_number: json!(p),
            stage: json!("S1"),
            sub_stage: json!("SS1"),
            invoice_date: json!(date),
            actuals_cost: cost,
        }
    }

    #[test]
    fn budgets_are_summed_and_inner_joined() {
        let inputs = RawInputs {
            budgets: vec![
                budget("P1", json!(600)),
                budget("P1", json!("400")),
                budget("P1", Value::Null),
                budget("P2", json!(50)),
            ],
            schedules: vec![
                schedule("P1", "2024-01-01", "2024-01-10"),
                schedule("P1", "2025-01-01", "2025-01-10"),
                schedule("P3", "2024-01-01", "2024-01-10"),
            ],
            ..Default::default()
        };
        let r = resolve_entities(&inputs);
        assert_eq!(r.entities.len(), 1);
        let e = &r.entities[0];
        assert_eq!(e.key, EntityKey::new("P1", "S1", "SS1"));
        assert_eq!(e.budget, Decimal::new(1000, 0));
        assert_eq!(e.schedule.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(r.report.duplicate_schedules, 1);
        assert_eq!(r.report.missing_schedule, 1);
        assert_eq!(r.report.missing_budget, 1);
    }

    #[test]
    fn blank_or_missing_key_parts_are_rejected() {
        assert_eq!(
            entity_key(&json!("P1"), &json!("  "), &json!("SS1")),
            Err(ValidationError::MissingKeyComponent("stage"))
        );
        assert_eq!(
            entity_key(&Value::Null, &json!("S1"), &json!("SS1")),
            Err(ValidationError::MissingKeyComponent("project_number"))
        );
        assert_eq!(
            entity_key(&json!(1042), &json!(" S1 "), &json!("SS1")),
            Ok(EntityKey::new("1042", "S1", "SS1"))
        );
        let inputs = RawInputs {
            budgets: vec![RawBudgetRow {
                sub_stage: json!(""),
                ..budget("P1", json!(5))
            }],
            schedules: vec![RawScheduleRow {
                stage: Value::Null,
                ..schedule("P1", "2024-01-01", "2024-01-10")
            }],
            ..Default::default()
        };
        let r = resolve_entities(&inputs);
        assert_eq!(r.report.budget_rows_invalid_key, 1);
        assert_eq!(r.report.schedule_rows_invalid_key, 1);
    }

    #[test]
    fn negative_budget_is_clamped() {
        let inputs = RawInputs {
            budgets: vec![budget("P1", json!(-10))],
            schedules: vec![schedule("P1", "2024-01-01", "2024-01-10")],
            ..Default::default()
        };
        let r = resolve_entities(&inputs);
        assert_eq!(r.entities[0].budget, Decimal::ZERO);
        assert_eq!(r.report.negative_budgets_clamped, 1);
    }

    #[test]
    fn budget_sum_past_decimal_range_skips_the_entity() {
        let huge = json!("50000000000000000000000000000");
        let inputs = RawInputs {
            budgets: vec![budget("P1", huge.clone()), budget("P1", huge), budget("P2", json!(10))],
            schedules: vec![
                schedule("P1", "2024-01-01", "2024-01-10"),
                schedule("P2", "2024-01-01", "2024-01-10"),
            ],
            ..Default::default()
        };
        let r = resolve_entities(&inputs);
        assert_eq!(r.report.budget_overflows, 1);
        assert_eq!(r.report.missing_budget, 0);
        assert_eq!(r.entities.len(), 1);
        assert_eq!(r.entities[0].key, EntityKey::new("P2", "S1", "SS1"));
    }

    #[test]
    fn unparseable_schedule_dates_are_kept_as_missing() {
        let inputs = RawInputs {
            budgets: vec![budget("P1", json!(10))],
            schedules: vec![schedule("P1", "not a date", "2024-01-10")],
            ..Default::default()
        };
        let r = resolve_entities(&inputs);
        assert_eq!(r.entities[0].schedule.start, None);
        assert!(r.entities[0].schedule.window().is_err());
    }

    #[test]
    fn ledgers_are_unioned_in_order() {
        let inputs = RawInputs {
            ledgers: vec![
                LedgerBatch {
                    source: LedgerSource::Invoice,
                    rows: vec![tx("P1", "2024-01-03", json!(100)), tx("", "2024-01-03", json!(1))],
                },
                LedgerBatch {
                    source: LedgerSource::PayApp,
                    rows: vec![tx("P1", "garbage", json!(5)), tx("P1", "2024-01-02", json!("x"))],
                },
            ],
            ..Default::default()
        };
        let r = resolve_entities(&inputs);
        let txs = &r.transactions[&EntityKey::new("P1", "S1", "SS1")];
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].source, LedgerSource::Invoice);
        assert_eq!(txs[0].position, 0);
        assert_eq!(txs[1].source, LedgerSource::PayApp);
        assert_eq!(txs[1].position, 3);
        assert_eq!(txs[1].amount, Decimal::ZERO);
        assert_eq!(r.report.transactions, 4);
        assert_eq!(r.report.transactions_invalid_key, 1);
        assert_eq!(r.report.transactions_invalid_date, 1);
        assert!(r.entities.is_empty());
    }
}
