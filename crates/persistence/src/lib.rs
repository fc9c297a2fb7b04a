#![deny(warnings)]

//! Persistence layer: SQLite store for the unified curve table.
//!
//! Every run fully replaces the table inside one transaction. If the write
//! fails the transaction rolls back and the previous run's rows remain.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use curve_core::{CurveRow, CurveType};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Returns the default SQLite URL used for curve output.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./out/curves.db"
}

/// Create the parent directory of a file-backed SQLite URL.
pub fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path.filter(|p| !p.starts_with(":memory:")) {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    Ok(())
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS curve_points (
    row_order INTEGER NOT NULL PRIMARY KEY,
    project_number TEXT NOT NULL,
    stage TEXT NOT NULL,
    sub_stage TEXT NOT NULL,
    date TEXT NOT NULL,
    value TEXT NOT NULL,
    period_value TEXT NOT NULL,
    type TEXT NOT NULL
)";

/// Open (creating if needed) the database and ensure the schema exists.
pub async fn init_db(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid sqlite url {url}"))?
        .create_if_missing(true);
    // single writer; also keeps an in-memory database alive for the pool's lifetime
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect_with(opts)
        .await
        .with_context(|| format!("connect {url}"))?;
    sqlx::query(SCHEMA).execute(&pool).await?;
    Ok(pool)
}

/// Replace the whole curve table with `rows`, preserving their order.
pub async fn overwrite_curves(pool: &SqlitePool, rows: &[CurveRow]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM curve_points")
        .execute(&mut *tx)
        .await?;
    let mut written = 0u64;
    for (i, r) in rows.iter().enumerate() {
        let order = i64::try_from(i).context("row index overflow")?;
        sqlx::query(
            "INSERT INTO curve_points \
             (row_order, project_number, stage, sub_stage, date, value, period_value, type) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order)
        .bind(r.project_number.as_str())
        .bind(r.stage.as_str())
        .bind(r.sub_stage.as_str())
        .bind(r.date.format("%Y-%m-%d").to_string())
        .bind(r.value.to_string())
        .bind(r.period_value.to_string())
        .bind(r.curve_type.as_str())
        .execute(&mut *tx)
        .await?;
        written += 1;
    }
    tx.commit().await?;
    info!(rows = written, "curve table overwritten");
    Ok(written)
}

fn parse_curve_type(s: &str) -> Result<CurveType> {
    Ok(match s {
        "ACTUAL" => CurveType::Actual,
        "PLANNED" => CurveType::Planned,
        "FORECAST" => CurveType::Forecast,
        other => bail!("unknown curve type {other}"),
    })
}

type StoredRow = (String, String, String, String, String, String, String);

/// Load the stored curve table in write order.
pub async fn load_curves(pool: &SqlitePool) -> Result<Vec<CurveRow>> {
    let stored: Vec<StoredRow> = sqlx::query_as(
        "SELECT project_number, stage, sub_stage, date, value, period_value, type \
         FROM curve_points ORDER BY row_order",
    )
    .fetch_all(pool)
    .await?;
    stored
        .into_iter()
        .map(
            |(project_number, stage, sub_stage, date, value, period_value, curve_type)| {
                Ok(CurveRow {
                    project_number,
                    stage,
                    sub_stage,
                    date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                        .with_context(|| format!("bad stored date {date}"))?,
                    value: Decimal::from_str(&value)
                        .with_context(|| format!("bad stored value {value}"))?,
                    period_value: Decimal::from_str(&period_value)
                        .with_context(|| format!("bad stored value {period_value}"))?,
                    curve_type: parse_curve_type(&curve_type)?,
                })
            },
        )
        .collect()
}
