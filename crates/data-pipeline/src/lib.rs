#![deny(warnings)]

//! Snapshot loading and JSON export for the curve engine.
//!
//! A snapshot is a directory holding one file per input record set. Files are
//! JSON arrays, or JSON Lines when the extension is `.jsonl`.

use anyhow::{Context, Result};
use curve_core::raw::{LedgerBatch, RawInputs};
use curve_core::{CurveRow, LedgerSource};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// File names of the input sets inside a snapshot directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotLayout {
    pub normalized_curve: String,
    pub budgets: String,
    pub schedules: String,
    pub invoice: String,
    pub pay_app: String,
    pub pay_req: String,
}

impl Default for SnapshotLayout {
    fn default() -> Self {
        Self {
            normalized_curve: "normalized_curve.json".into(),
            budgets: "budgets.json".into(),
            schedules: "schedules.json".into(),
            invoice: "invoice.json".into(),
            pay_app: "pay_app.json".into(),
            pay_req: "pay_req.json".into(),
        }
    }
}

impl SnapshotLayout {
    fn ledger_file(&self, source: LedgerSource) -> &str {
        match source {
            LedgerSource::Invoice => &self.invoice,
            LedgerSource::PayApp => &self.pay_app,
            LedgerSource::PayReq => &self.pay_req,
        }
    }
}

/// Read a JSON array or JSON Lines file of records.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);
    if path.extension().is_some_and(|e| e == "jsonl") {
        let mut out = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read {}", path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let rec = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}", path.display(), idx + 1))?;
            out.push(rec);
        }
        Ok(out)
    } else {
        serde_json::from_reader(reader).with_context(|| format!("parse {}", path.display()))
    }
}

/// Load every input set of a snapshot directory.
///
/// The normalized curve, budgets and schedules are required. A missing ledger
/// file is treated as an empty ledger.
pub fn load_snapshot(dir: &Path, layout: &SnapshotLayout) -> Result<RawInputs> {
    let curve = read_records(&dir.join(&layout.normalized_curve))?;
    let budgets = read_records(&dir.join(&layout.budgets))?;
    let schedules = read_records(&dir.join(&layout.schedules))?;

    let mut ledgers = Vec::with_capacity(LedgerSource::ALL.len());
    for source in LedgerSource::ALL {
        let path = dir.join(layout.ledger_file(source));
        let rows = if path.exists() {
            read_records(&path)?
        } else {
            warn!(source = source.as_str(), path = %path.display(), "ledger file missing, treated as empty");
            Vec::new()
        };
        ledgers.push(LedgerBatch { source, rows });
    }

    let inputs = RawInputs {
        curve,
        budgets,
        schedules,
        ledgers,
    };
    info!(
        dir = %dir.display(),
        curve = inputs.curve.len(),
        budgets = inputs.budgets.len(),
        schedules = inputs.schedules.len(),
        transactions = inputs.transaction_count(),
        "snapshot loaded"
    );
    Ok(inputs)
}

/// Write unified rows as a pretty JSON array, replacing any existing file.
///
/// Rows go to a sibling temp file first and are renamed into place, so an
/// interrupted write leaves the previous output intact.
pub fn write_rows_json(path: &Path, rows: &[CurveRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let file = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, rows)?;
        w.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    info!(path = %path.display(), rows = rows.len(), "curve rows written");
    Ok(())
}

/// Read rows written by [`write_rows_json`].
pub fn read_rows_json(path: &Path) -> Result<Vec<CurveRow>> {
    read_records(path)
}
