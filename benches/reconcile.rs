//! Reconciliation cost, in memory and end to end against a temp SQLite file.
//!
//! Run with: cargo bench --bench reconcile

use std::hint::black_box;
use std::time::{SystemTime, UNIX_EPOCH};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use schemagen::config::EngineConfig;
use schemagen::schema::{
    ColumnDef, FieldMap, FieldValue, StorageClass, TableSchema, reconcile,
};

fn wide_input(n: usize) -> FieldMap {
    (0..n)
        .map(|i| {
            let value = match i % 4 {
                0 => FieldValue::Integer(i as i64),
                1 => FieldValue::Real(i as f64 + 0.5),
                2 => FieldValue::Text(format!("v{i}")),
                _ => FieldValue::Null,
            };
            (format!("c{i}"), value)
        })
        .collect()
}

fn existing_schema(n: usize) -> TableSchema {
    TableSchema::from_columns(
        std::iter::once(ColumnDef::key())
            .chain((0..n / 2).map(|i| ColumnDef::new(format!("c{i}"), StorageClass::Integer))),
    )
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    for n in [4usize, 32, 256] {
        let input = wide_input(n);
        let absent = TableSchema::absent();
        let partial = existing_schema(n);

        group.bench_with_input(BenchmarkId::new("absent_table", n), &input, |b, input| {
            b.iter(|| reconcile(black_box("bench"), black_box(input), black_box(&absent)));
        });
        group.bench_with_input(BenchmarkId::new("half_existing", n), &input, |b, input| {
            b.iter(|| reconcile(black_box("bench"), black_box(input), black_box(&partial)));
        });
    }
    group.finish();
}

fn bench_create(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "schemagen-bench-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    let database_url = format!("sqlite:{}", temp_path.display());

    let engine = rt
        .block_on(schemagen::engine::spawn(&database_url, &EngineConfig::default()))
        .expect("engine should start");
    let input = wide_input(8);

    c.bench_function("create_stable_schema", |b| {
        b.to_async(&rt)
            .iter(|| async { engine.create("bench", input.clone()).await.expect("create") });
    });

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", temp_path.display()));
    }
}

criterion_group!(benches, bench_reconcile, bench_create);
criterion_main!(benches);
