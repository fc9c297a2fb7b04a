#![deny(warnings)]

//! Headless batch runner: load a snapshot, compute all curves, overwrite the
//! output store.

mod config;

use anyhow::{Context, Result};
use chrono::Utc;
use config::{parse_args, RunConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when set and valid, `info` otherwise.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt().with_env_filter(filter).finish()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing::subscriber::set_global_default(subscriber(log_filter()))
        .context("install log subscriber")?;

    let args = parse_args(std::env::args().skip(1))?;
    let mut cfg = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    cfg.apply(&args);
    let as_of = *cfg
        .engine
        .as_of
        .get_or_insert_with(|| Utc::now().date_naive());
    info!(?args, %as_of, "starting curve run");

    let input_dir = cfg
        .input_dir
        .clone()
        .context("no input directory; pass --input or set input_dir")?;
    let inputs = data_pipeline::load_snapshot(&input_dir, &cfg.layout)?;

    let engine = cfg.engine.clone();
    let run = tokio::task::spawn_blocking(move || curve_engine::compute_curves(&inputs, &engine))
        .await
        .context("curve computation panicked")??;

    if let Some(path) = &cfg.json_out {
        data_pipeline::write_rows_json(path, &run.rows)?;
    }
    let sqlite_url = match (&cfg.sqlite_url, &cfg.json_out) {
        (Some(url), _) => Some(url.clone()),
        (None, None) => Some(persistence::default_sqlite_url().to_string()),
        (None, Some(_)) => None,
    };
    if let Some(url) = sqlite_url {
        persistence::ensure_parent_dir(&url)?;
        let pool = persistence::init_db(&url).await?;
        persistence::overwrite_curves(&pool, &run.rows).await?;
        pool.close().await;
    }

    let s = &run.summary;
    println!(
        "Curves OK | as-of: {} | entities: {} | invalid windows: {} | actual: {} | planned: {} | forecast: {} | rows: {}",
        s.as_of,
        s.resolve.entities,
        s.invalid_windows,
        s.actual_points,
        s.planned_points,
        s.forecast_points,
        run.rows.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn default_filter_hides_debug() {
        tracing::subscriber::with_default(subscriber(EnvFilter::new("info")), || {
            assert!(tracing::enabled!(Level::INFO));
            assert!(!tracing::enabled!(Level::DEBUG));
        });
    }

    #[test]
    fn filter_directive_is_honored() {
        tracing::subscriber::with_default(subscriber(EnvFilter::new("error")), || {
            assert!(tracing::enabled!(Level::ERROR));
            assert!(!tracing::enabled!(Level::INFO));
        });
        tracing::subscriber::with_default(subscriber(EnvFilter::new("debug")), || {
            assert!(tracing::enabled!(Level::DEBUG));
        });
    }
}
