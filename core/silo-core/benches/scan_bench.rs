// Scan and mutation benchmarks.
//
// Section 1: append throughput (chunk sealing + compression)
// Section 2: sequential and filtered scans over a 64k-row table
// Section 3: expression evaluation
// Section 4: record-batch export

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use silo_core::{ScanOpts, Scope, Table, TableOptions};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};

const ROWS: usize = 64 * 1024;
const BATCH: usize = 4096;

fn columns(lo: usize, hi: usize) -> Vec<ArrayRef> {
    let a: ArrayRef = Arc::new(Int64Array::from_iter_values((lo..hi).map(|v| v as i64)));
    let b: ArrayRef = Arc::new(Float64Array::from_iter_values(
        (lo..hi).map(|v| (v % 100) as f64 / 4.0),
    ));
    let tag: ArrayRef = Arc::new(StringArray::from_iter_values(
        (lo..hi).map(|v| format!("g{}", v % 8)),
    ));
    vec![a, b, tag]
}

fn make_table(rows: usize) -> Table {
    Table::from_arrays(
        columns(0, rows),
        vec!["a".to_string(), "b".to_string(), "tag".to_string()],
        TableOptions::new().with_chunklen(4096),
    )
    .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 1: append throughput
// ═══════════════════════════════════════════════════════════════════════════

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    let mut t = make_table(BATCH);
    let batch = columns(0, BATCH);
    group.bench_function("append_4096_rows", |b| {
        b.iter(|| {
            t.append(black_box(batch.clone())).unwrap();
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 2: scans
// ═══════════════════════════════════════════════════════════════════════════

fn bench_scans(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    group.sample_size(20);

    let t = make_table(ROWS);

    group.bench_function("rows_64k", |b| {
        b.iter(|| {
            let n = t.rows().unwrap().count();
            black_box(n);
        })
    });

    group.bench_function("where_rows_count", |b| {
        b.iter(|| {
            let n = t
                .where_rows(black_box("a % 7 = 0"), ScanOpts::new())
                .unwrap()
                .count();
            black_box(n);
        })
    });

    group.bench_function("fetch_where_one_outcol", |b| {
        b.iter(|| {
            let batch = t
                .fetch_where(black_box("a % 7 = 0"), ScanOpts::new().with_outcols(["a"]))
                .unwrap();
            black_box(batch.num_rows());
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 3: expression evaluation
// ═══════════════════════════════════════════════════════════════════════════

fn bench_eval(c: &mut Criterion) {
    let mut group = c.benchmark_group("eval");
    group.sample_size(20);

    let t = make_table(ROWS);

    group.bench_function("arithmetic_64k", |b| {
        b.iter(|| {
            let out = t.eval(black_box("a * 2 + b"), &Scope::new()).unwrap();
            black_box(out.len());
        })
    });

    group.bench_function("predicate_64k", |b| {
        b.iter(|| {
            let out = t
                .eval(black_box("(a % 7 = 0) & (b > 2.5)"), &Scope::new())
                .unwrap();
            black_box(out.len());
        })
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Section 4: export
// ═══════════════════════════════════════════════════════════════════════════

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");
    group.sample_size(20);

    let t = make_table(ROWS);

    group.bench_function("to_batches_64k", |b| {
        b.iter(|| {
            let batches = t.to_batches(None).unwrap();
            black_box(batches.len());
        })
    });

    group.finish();
}

criterion_group!(benches, bench_append, bench_scans, bench_eval, bench_export);
criterion_main!(benches);
