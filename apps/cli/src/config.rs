//! Run configuration: YAML file values overridden by command-line flags.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use curve_core::EngineConfig;
use data_pipeline::SnapshotLayout;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Snapshot directory with one file per input set.
    pub input_dir: Option<PathBuf>,
    pub layout: SnapshotLayout,
    /// SQLite output; defaults to the local store when no JSON output is set.
    pub sqlite_url: Option<String>,
    pub json_out: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn apply(&mut self, args: &Args) {
        if let Some(dir) = &args.input {
            self.input_dir = Some(dir.clone());
        }
        if let Some(as_of) = args.as_of {
            self.engine.as_of = Some(as_of);
        }
        if let Some(url) = &args.db {
            self.sqlite_url = Some(url.clone());
        }
        if let Some(path) = &args.json {
            self.json_out = Some(path.clone());
        }
        if args.sequential {
            self.engine.parallel = false;
        }
    }
}

/// Command-line flags.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub as_of: Option<NaiveDate>,
    pub db: Option<String>,
    pub json: Option<PathBuf>,
    pub sequential: bool,
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => out.config = Some(it.next().context("--config needs a path")?.into()),
            "--input" => out.input = Some(it.next().context("--input needs a path")?.into()),
            "--as-of" => {
                let raw = it.next().context("--as-of needs a YYYY-MM-DD date")?;
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .with_context(|| format!("invalid --as-of date {raw}"))?;
                out.as_of = Some(date);
            }
            "--db" => out.db = Some(it.next().context("--db needs a sqlite url")?),
            "--json" => out.json = Some(it.next().context("--json needs a path")?.into()),
            "--sequential" => out.sequential = true,
            other => bail!("unknown argument {other}"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_core::ForecastWeighting;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn flags_parse() {
        let a = parse_args(args(&["--input", "snap", "--as-of", "2024-06-30", "--sequential"])).unwrap();
        assert_eq!(a.input, Some(PathBuf::from("snap")));
        assert_eq!(a.as_of, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert!(a.sequential);
        assert!(parse_args(args(&["--as-of", "30/06/2024"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
    }

    #[test]
    fn flags_without_values_are_errors() {
        for flag in ["--config", "--input", "--as-of", "--db", "--json"] {
            let err = parse_args(args(&["--sequential", flag])).unwrap_err();
            assert!(err.to_string().starts_with(flag), "{flag}: {err}");
        }
    }

    #[test]
    fn flags_override_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run.yaml");
        std::fs::write(
            &path,
            "input_dir: /data/snap\nsqlite_url: sqlite://./a.db\nlayout:\n  budgets: budget_totals.json\nengine:\n  as_of: 2024-01-31\n  forecast_weighting: normalized_share\n",
        )
        .unwrap();
        let mut cfg = RunConfig::load(&path).unwrap();
        assert_eq!(cfg.layout.budgets, "budget_totals.json");
        assert_eq!(cfg.layout.schedules, "schedules.json");
        cfg.apply(&parse_args(args(&["--as-of", "2024-02-29", "--db", "sqlite://./b.db"])).unwrap());
        assert_eq!(cfg.input_dir, Some(PathBuf::from("/data/snap")));
        assert_eq!(cfg.engine.as_of, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(cfg.engine.forecast_weighting, ForecastWeighting::NormalizedShare);
        assert_eq!(cfg.sqlite_url.as_deref(), Some("sqlite://./b.db"));
    }
}
