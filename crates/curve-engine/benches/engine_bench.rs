use criterion::{black_box, criterion_group, criterion_main, Criterion};
use curve_core::raw::{LedgerBatch, RawBudgetRow, RawCurvePoint, RawInputs, RawScheduleRow, RawTransactionRow};
use curve_core::{EngineConfig, LedgerSource};
use serde_json::json;

fn build_inputs(n_entities: usize) -> RawInputs {
    let curve = (0..=100)
        .step_by(5)
        .map(|c| RawCurvePoint {
            sub_stage: json!("CONSTRUCTION"),
            completion_fraction: json!(format!("{:.2}", c as f64 / 100.0)),
            cumulative_spend_fraction: json!(format!("{:.2}", (c as f64 / 100.0).powf(1.5))),
        })
        .collect();
    let mut budgets = Vec::with_capacity(n_entities);
    let mut schedules = Vec::with_capacity(n_entities);
    let mut rows = Vec::with_capacity(n_entities * 24);
    for i in 0..n_entities {
        let p = format!("C{i:05}");
        budgets.push(RawBudgetRow {
            project_number: json!(p),
            stage: json!("03"),
            sub_stage: json!("CONSTRUCTION"),
            budget_current_approved: json!(1_000_000 + i as i64 * 250),
        });
        schedules.push(RawScheduleRow {
            project_number: json!(p),
            stage: json!("03"),
            sub_stage: json!("CONSTRUCTION"),
            current_start: json!("2022-01-01"),
            current_end: json!(format!("202{}-06-30", 4 + i % 5)),
        });
        for m in 1..=24 {
            rows.push(RawTransactionRow {
                project_number: json!(p),
                stage: json!("03"),
                sub_stage: json!("CONSTRUCTION"),
                invoice_date: json!(format!("{}-{:02}-15", 2022 + (m - 1) / 12, (m - 1) % 12 + 1)),
                actuals_cost: json!(10_000 + m * 37),
            });
        }
    }
    RawInputs {
        curve,
        budgets,
        schedules,
        ledgers: vec![LedgerBatch {
            source: LedgerSource::Invoice,
            rows,
        }],
    }
}

fn bench_portfolio(c: &mut Criterion) {
    let inputs = build_inputs(500);
    let cfg = EngineConfig {
        as_of: chrono::NaiveDate::from_ymd_opt(2024, 1, 1),
        ..EngineConfig::default()
    };
    c.bench_function("curves 500 entities", |b| {
        b.iter(|| {
            let _ = black_box(curve_engine::compute_curves(&inputs, &cfg));
        })
    });
}

criterion_group!(benches, bench_portfolio);
criterion_main!(benches);
