//! Raw warehouse rows and field coercion at the input boundary.
//!
//! Every input record set has a fixed schema. Warehouse column names are
//! accepted as aliases and unknown columns are rejected on deserialization.
//! Field values stay untyped (`serde_json::Value`) until coerced here, so a
//! malformed cell degrades to zero or `None` instead of failing the run.

use crate::LedgerSource;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Approved budget line; several lines per entity are summed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBudgetRow {
    #[serde(default, alias = "PROJECT_NUMBER")]
    pub project_number: Value,
    #[serde(default, alias = "STAGE")]
    pub stage: Value,
    #[serde(default, alias = "SUB_STAGE")]
    pub sub_stage: Value,
    #[serde(default, alias = "BUDGET_CURRENT_APPROVED", alias = "budget")]
    pub budget_current_approved: Value,
}

/// Schedule row from the project scheduling system.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawScheduleRow {
    #[serde(default, alias = "PROJECTID", alias = "PROJECT_NUMBER")]
    pub project_number: Value,
    #[serde(default, alias = "STAGECODE", alias = "STAGE")]
    pub stage: Value,
    #[serde(default, alias = "STAGESUBSTAGECODE", alias = "SUB_STAGE")]
    pub sub_stage: Value,
    #[serde(default, alias = "CURRENTSTART", alias = "start_date")]
    pub current_start: Value,
    #[serde(default, alias = "CURRENTEND", alias = "end_date")]
    pub current_end: Value,
}

/// Ledger row (invoice, pay application or pay request).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTransactionRow {
    #[serde(default, alias = "PROJECTID", alias = "PROJECT_NUMBER")]
    pub project_number: Value,
    #[serde(default, alias = "STAGEPHASE_CODE", alias = "STAGE")]
    pub stage: Value,
    #[serde(default, alias = "SUBSTAGEACTIVITY_CODE", alias = "SUB_STAGE")]
    pub sub_stage: Value,
    #[serde(default, alias = "INVOICE_DATE", alias = "transaction_date")]
    pub invoice_date: Value,
    #[serde(default, alias = "ACTUALS_COST", alias = "cost_amount")]
    pub actuals_cost: Value,
}

/// Normalized curve template row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCurvePoint {
    #[serde(default, alias = "SUB_STAGE")]
    pub sub_stage: Value,
    #[serde(default, alias = "COMPLETION_FRACTION")]
    pub completion_fraction: Value,
    #[serde(default, alias = "CUMULATIVE_SPEND_FRACTION")]
    pub cumulative_spend_fraction: Value,
}

/// All rows read from one ledger, in file order.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerBatch {
    pub source: LedgerSource,
    pub rows: Vec<RawTransactionRow>,
}

/// One materialized input snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawInputs {
    pub curve: Vec<RawCurvePoint>,
    pub budgets: Vec<RawBudgetRow>,
    pub schedules: Vec<RawScheduleRow>,
    /// Ledgers in union order.
    pub ledgers: Vec<LedgerBatch>,
}

impl RawInputs {
    pub fn transaction_count(&self) -> usize {
        self.ledgers.iter().map(|l| l.rows.len()).sum()
    }
}

/// Key component as trimmed text; numbers are rendered, blanks are `None`.
pub fn coerce_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Numeric cell as a decimal, `None` for NULL or non-numeric content.
pub fn coerce_decimal_opt(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                Some(Decimal::from(u))
            } else {
                n.as_f64().and_then(Decimal::from_f64)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        _ => None,
    }
}

/// Numeric cell as a decimal with NULL/invalid coerced to zero.
pub fn coerce_decimal(value: &Value) -> Decimal {
    coerce_decimal_opt(value).unwrap_or(Decimal::ZERO)
}

/// Calendar date from a date, datetime or RFC 3339 string.
pub fn coerce_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}
