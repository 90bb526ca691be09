//! Criterion benchmarks for the page-parsing hot path.
//!
//! Benchmarks:
//! 1. Table location (HTML parse + largest-table selection)
//! 2. Aggregate and identity-offset extraction from a located table
//! 3. Number normalization over typical cell tokens

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use taifex_core::data::{detect_layout, extract_record, locate_data_table, parse_number, Strategy};
use taifex_core::domain::{Contract, FetchTask, Identity};

const FIXTURE: &str = include_str!("../tests/fixtures/fut_contracts_2024-06-03.html");

fn bench_locate(c: &mut Criterion) {
    c.bench_function("locate_data_table", |b| {
        b.iter(|| locate_data_table(black_box(FIXTURE)))
    });
}

fn bench_strategies(c: &mut Criterion) {
    let Some(table) = locate_data_table(FIXTURE) else {
        return;
    };
    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap_or_default();

    let mut group = c.benchmark_group("strategy");
    let strategies = [
        ("aggregate", Strategy::Aggregate),
        ("foreign_offset", Strategy::IdentityOffset(Identity::Foreign)),
    ];
    for (name, strategy) in strategies {
        group.bench_with_input(BenchmarkId::from_parameter(name), &strategy, |b, s| {
            b.iter(|| s.extract(black_box(&table), Contract::Mtx, date))
        });
    }
    group.finish();

    c.bench_function("detect_layout", |b| b.iter(|| detect_layout(black_box(&table))));
}

fn bench_full_page(c: &mut Criterion) {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap_or_default();
    let task = FetchTask::new(date, Contract::Te, Some(Identity::InvestmentTrust));
    c.bench_function("extract_record", |b| {
        b.iter(|| extract_record(black_box(FIXTURE), &task))
    });
}

fn bench_numbers(c: &mut Criterion) {
    let tokens = ["14,052", "-1,836,735", "0", "3,456.75", "", "N/A", "259,527,880"];
    c.bench_function("parse_number", |b| {
        b.iter(|| {
            for t in &tokens {
                black_box(parse_number(black_box(t)));
            }
        })
    });
}

criterion_group!(
    benches,
    bench_locate,
    bench_strategies,
    bench_full_page,
    bench_numbers
);
criterion_main!(benches);
