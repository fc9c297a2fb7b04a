#![deny(warnings)]

//! Core domain models and invariants for capital project spending curves.
//!
//! This crate defines the typed records shared by the curve engine, the
//! snapshot loader and the output store, plus validation helpers that guard
//! the invariants every curve relies on (non-empty keys, completion buckets
//! in `[0, 1]`, ordered schedule windows).

pub mod raw;

use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifies one spending curve family: (project, stage, sub-stage).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Capital project number, e.g. "C100-00-00".
    pub project_number: String,
    /// Stage / phase code.
    pub stage: String,
    /// Sub-stage / activity code. Selects the normalized curve template.
    pub sub_stage: String,
}

impl EntityKey {
    pub fn new(
        project_number: impl Into<String>,
        stage: impl Into<String>,
        sub_stage: impl Into<String>,
    ) -> Self {
        Self {
            project_number: project_number.into(),
            stage: stage.into(),
            sub_stage: sub_stage.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project_number, self.stage, self.sub_stage)
    }
}

/// Kind of curve a point belongs to.
///
/// Declaration order is the output order within one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurveType {
    /// Cumulative spend recorded in the ledgers.
    Actual,
    /// Budget projected through the normalized curve template.
    Planned,
    /// Remaining budget allocated over future planned dates.
    Forecast,
}

impl CurveType {
    pub fn as_str(self) -> &'static str {
        match self {
            CurveType::Actual => "ACTUAL",
            CurveType::Planned => "PLANNED",
            CurveType::Forecast => "FORECAST",
        }
    }
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the 101 discrete completion buckets `0.00, 0.01, ..., 1.00`.
///
/// Stored as a whole percentage so bucket equality is exact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompletionBucket(u8);

impl CompletionBucket {
    /// Largest bucket, i.e. 1.00.
    pub const MAX_PERCENT: u8 = 100;

    pub fn new(percent: u8) -> Option<Self> {
        (percent <= Self::MAX_PERCENT).then_some(Self(percent))
    }

    /// Round a completion fraction to two decimals (half to even) and bucket it.
    ///
    /// Returns `None` when the rounded value falls outside `[0, 1]`.
    pub fn from_fraction(fraction: Decimal) -> Option<Self> {
        let rounded = fraction.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
        if rounded < Decimal::ZERO || rounded > Decimal::ONE {
            return None;
        }
        (rounded * Decimal::ONE_HUNDRED).to_u8().and_then(Self::new)
    }

    /// Bucket for day `offset` of a window lasting `duration_days` days.
    pub fn from_offset(offset: u32, duration_days: u32) -> Option<Self> {
        if duration_days == 0 {
            return None;
        }
        Self::from_fraction(Decimal::from(offset) / Decimal::from(duration_days))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Bucket as a two-decimal fraction.
    pub fn fraction(self) -> Decimal {
        Decimal::new(i64::from(self.0), 2)
    }
}

/// A point of a sub-stage's normalized spending template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCurvePoint {
    /// Sub-stage the template applies to.
    pub sub_stage: String,
    /// Fraction of schedule elapsed, bucketed to two decimals.
    pub completion: CompletionBucket,
    /// Fraction of budget spent by that point, in `[0, 1]`.
    pub cumulative_fraction: Decimal,
}

impl NormalizedCurvePoint {
    /// Build a validated template point.
    pub fn new(
        sub_stage: impl Into<String>,
        completion_fraction: Decimal,
        cumulative_fraction: Decimal,
    ) -> Result<Self, ValidationError> {
        let sub_stage = sub_stage.into();
        if sub_stage.trim().is_empty() {
            return Err(ValidationError::MissingKeyComponent("sub_stage"));
        }
        let completion = CompletionBucket::from_fraction(completion_fraction)
            .ok_or(ValidationError::FractionOutOfRange(completion_fraction))?;
        validate_fraction(cumulative_fraction)?;
        Ok(Self {
            sub_stage,
            completion,
            cumulative_fraction,
        })
    }
}

/// Raw start/end dates of an entity's schedule, possibly incomplete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDates {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ScheduleDates {
    pub fn window(&self) -> Result<ScheduleWindow, ValidationError> {
        ScheduleWindow::new(self.start, self.end)
    }
}

/// A validated schedule window with `start < end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl ScheduleWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, ValidationError> {
        let start = start.ok_or(ValidationError::MissingDate("start"))?;
        let end = end.ok_or(ValidationError::MissingDate("end"))?;
        if start >= end {
            return Err(ValidationError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days in the window, both ends inclusive.
    pub fn duration_days(&self) -> u32 {
        // start < end guarantees a positive difference
        let days = (self.end - self.start).num_days() + 1;
        u32::try_from(days).unwrap_or(u32::MAX)
    }

    /// Calendar date `offset` days after the start.
    pub fn date_at(&self, offset: u32) -> Option<NaiveDate> {
        self.start.checked_add_days(Days::new(u64::from(offset)))
    }
}

/// Ledger a transaction was recorded in. Declaration order is union order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerSource {
    Invoice,
    PayApp,
    PayReq,
}

impl LedgerSource {
    pub const ALL: [LedgerSource; 3] = [
        LedgerSource::Invoice,
        LedgerSource::PayApp,
        LedgerSource::PayReq,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LedgerSource::Invoice => "INVOICE",
            LedgerSource::PayApp => "PAY_APP",
            LedgerSource::PayReq => "PAY_REQ",
        }
    }
}

/// A signed ledger entry already attributed to an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActualTransaction {
    /// Invoice / payment date.
    pub date: NaiveDate,
    /// Signed cost; negative values are adjustments.
    pub amount: Decimal,
    /// Ledger the row came from.
    pub source: LedgerSource,
    /// Position in the unioned ledger input, used to break same-date ties.
    pub position: usize,
}

/// One point of a typed curve for one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub key: EntityKey,
    pub date: NaiveDate,
    /// Increment contributed at this date.
    pub period_value: Decimal,
    /// Running total up to and including this date.
    pub cumulative_value: Decimal,
    pub curve_type: CurveType,
}

/// Unified reporting row, one per curve point across all curve types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveRow {
    pub project_number: String,
    pub stage: String,
    pub sub_stage: String,
    pub date: NaiveDate,
    /// Cumulative value of the curve at `date`.
    pub value: Decimal,
    /// Increment at `date`.
    pub period_value: Decimal,
    #[serde(rename = "type")]
    pub curve_type: CurveType,
}

/// How the remaining budget is spread over future planned points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastWeighting {
    /// Each future point gets `cumulative_fraction * remaining`.
    #[default]
    CumulativeFraction,
    /// Each future point gets its fraction's share of all future fractions,
    /// so the forecast ends at `actual + remaining`.
    NormalizedShare,
}

/// How ledger rows become actual curve points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActualGrouping {
    /// One point per non-zero transaction.
    #[default]
    PerTransaction,
    /// Same-date rows are summed first; zero daily totals are dropped.
    DailyTotal,
}

/// Engine configuration parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// As-of date; forecast covers planned dates strictly after it.
    pub as_of: Option<NaiveDate>,
    pub forecast_weighting: ForecastWeighting,
    pub actual_grouping: ActualGrouping,
    /// Compute per-entity curves on a worker pool.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            as_of: None,
            forecast_weighting: ForecastWeighting::default(),
            actual_grouping: ActualGrouping::default(),
            parallel: true,
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A key component was empty or not coercible to text.
    #[error("missing key component: {0}")]
    MissingKeyComponent(&'static str),
    /// Fraction must be within [0, 1].
    #[error("fraction {0} is outside [0,1]")]
    FractionOutOfRange(Decimal),
    /// Schedule date is absent or unparseable.
    #[error("missing schedule {0} date")]
    MissingDate(&'static str),
    /// Schedule start must precede its end.
    #[error("schedule window {start}..{end} is empty or inverted")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },
}

/// Validate that every key component is non-blank.
pub fn validate_key(key: &EntityKey) -> Result<(), ValidationError> {
    if key.project_number.trim().is_empty() {
        return Err(ValidationError::MissingKeyComponent("project_number"));
    }
    if key.stage.trim().is_empty() {
        return Err(ValidationError::MissingKeyComponent("stage"));
    }
    if key.sub_stage.trim().is_empty() {
        return Err(ValidationError::MissingKeyComponent("sub_stage"));
    }
    Ok(())
}

/// Validate a fraction in `[0, 1]`.
pub fn validate_fraction(fraction: Decimal) -> Result<(), ValidationError> {
    if fraction < Decimal::ZERO || fraction > Decimal::ONE {
        return Err(ValidationError::FractionOutOfRange(fraction));
    }
    Ok(())
}
