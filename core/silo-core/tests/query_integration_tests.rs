// Queries over disk-backed tables: predicates, projections, selectors.
//
// The fixture spans several sealed chunks plus a tail so every scan
// path crosses chunk boundaries.

use arrow::array::{Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use silo_core::{
    CellValue, Mode, NROW_COLUMN, ScanOpts, Scope, Selector, SiloError, SiloResult, Span, Table,
    TableOptions,
};
use std::sync::Arc;
use tempfile::tempdir;

const ROWS: i64 = 1000;

// ─── Helpers ────────────────────────────────────────────

fn fixture(root: Option<&std::path::Path>) -> Table {
    let schema = Arc::new(Schema::new(vec![
        Field::new("a", DataType::Int64, false),
        Field::new("b", DataType::Float64, false),
        Field::new("tag", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from((0..ROWS).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(
                (0..ROWS).map(|v| (v % 10) as f64 / 2.0).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                (0..ROWS).map(|v| format!("g{}", v % 4)).collect::<Vec<_>>(),
            )),
        ],
    )
    .unwrap();
    let mut opts = TableOptions::new().with_chunklen(64);
    if let Some(dir) = root {
        opts = opts.with_rootdir(dir);
    }
    Table::from_batch(batch, opts).unwrap()
}

fn collect_a(iter: silo_core::RowIter) -> Vec<i64> {
    iter.map(|row| match row.unwrap().get("a") {
        Some(CellValue::Int64(v)) => *v,
        other => panic!("unexpected cell: {other:?}"),
    })
    .collect()
}

fn brute(pred: impl Fn(i64) -> bool) -> Vec<i64> {
    (0..ROWS).filter(|v| pred(*v)).collect()
}

// ═══════════════════════════════════════════════════════════
// Predicate scans
// ═══════════════════════════════════════════════════════════

#[test]
fn where_rows_crosses_chunk_boundaries() -> SiloResult<()> {
    let dir = tempdir().unwrap();
    let t = fixture(Some(&dir.path().join("t")));

    let got = collect_a(t.where_rows("a % 7 = 0", ScanOpts::new())?);
    assert_eq!(got, brute(|v| v % 7 == 0));
    Ok(())
}

#[test]
fn compound_predicate_matches_brute_force() -> SiloResult<()> {
    let t = fixture(None);
    let got = collect_a(t.where_rows(
        "(a > 100 and a < 900) & ((b >= 3.5) | (tag = 'g1'))",
        ScanOpts::new(),
    )?);
    let want = brute(|v| (v > 100 && v < 900) && ((v % 10) as f64 / 2.0 >= 3.5 || v % 4 == 1));
    assert_eq!(got, want);
    Ok(())
}

#[test]
fn limit_and_skip_window_the_matches() -> SiloResult<()> {
    let t = fixture(None);
    let all = brute(|v| v % 3 == 0);

    let got = collect_a(t.where_rows(
        "a % 3 = 0",
        ScanOpts::new().with_skip(10).with_limit(25),
    )?);
    assert_eq!(got, all[10..35].to_vec());

    // skip beyond the matches drains to nothing
    let got = collect_a(t.where_rows("a % 3 = 0", ScanOpts::new().with_skip(5000))?);
    assert!(got.is_empty());
    Ok(())
}

#[test]
fn virtual_row_numbers_report_match_positions() -> SiloResult<()> {
    let t = fixture(None);
    let rows: Vec<(i64, i64)> = t
        .where_rows(
            "a % 250 = 0",
            ScanOpts::new().with_outcols(["a", NROW_COLUMN]),
        )?
        .map(|row| {
            let row = row.unwrap();
            let a = match row.get("a") {
                Some(CellValue::Int64(v)) => *v,
                other => panic!("unexpected cell: {other:?}"),
            };
            let pos = match row.get(NROW_COLUMN) {
                Some(CellValue::Int64(v)) => *v,
                other => panic!("unexpected cell: {other:?}"),
            };
            (a, pos)
        })
        .collect();
    assert_eq!(rows, vec![(0, 0), (250, 250), (500, 500), (750, 750)]);
    Ok(())
}

#[test]
fn mask_predicate_equals_expression_predicate() -> SiloResult<()> {
    let t = fixture(None);
    let mask = t.eval("a % 5 = 0", &Scope::new())?;
    let mask = mask
        .as_any()
        .downcast_ref::<BooleanArray>()
        .unwrap()
        .clone();

    let by_mask = collect_a(t.where_rows(mask, ScanOpts::new())?);
    let by_expr = collect_a(t.where_rows("a % 5 = 0", ScanOpts::new())?);
    assert_eq!(by_mask, by_expr);
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Range iteration
// ═══════════════════════════════════════════════════════════

#[test]
fn span_iteration_with_stride() -> SiloResult<()> {
    let t = fixture(None);
    let got = collect_a(t.iter_rows(Span::new(100, 200).with_step(33), ScanOpts::new())?);
    assert_eq!(got, vec![100, 133, 166, 199]);

    // negative endpoints wrap
    let got = collect_a(t.iter_rows(Span::new(-5, -1), ScanOpts::new())?);
    assert_eq!(got, vec![995, 996, 997, 998]);
    Ok(())
}

#[test]
fn tuples_stream_whole_rows() -> SiloResult<()> {
    let t = fixture(None);
    let mut seen = 0usize;
    for tuple in t.iter_rows(Span::new(0, 8), ScanOpts::new())?.tuples() {
        let values = tuple?;
        assert_eq!(values.len(), 3);
        seen += 1;
    }
    assert_eq!(seen, 8);
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Blocks and fetch
// ═══════════════════════════════════════════════════════════

#[test]
fn block_stream_concatenates_to_fetch() -> SiloResult<()> {
    let t = fixture(None);

    let fetched = t.fetch_where("a % 9 = 0", ScanOpts::new().with_outcols(["a"]))?;

    let mut from_blocks: Vec<i64> = Vec::new();
    for block in t.where_blocks("a % 9 = 0", Some(17), ScanOpts::new().with_outcols(["a"]))? {
        let block = block?;
        assert!(block.num_rows() <= 17);
        let col = block
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        from_blocks.extend(col.values().iter().copied());
    }

    let fetched_col = fetched
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(fetched_col.values().as_ref(), from_blocks.as_slice());
    Ok(())
}

#[test]
fn fetch_where_table_round_trips_matches() -> SiloResult<()> {
    let t = fixture(None);
    let sub = t.fetch_where_table(
        "a >= 990",
        ScanOpts::new().with_outcols(["a", "tag"]),
        TableOptions::new().with_chunklen(4),
    )?;
    assert_eq!(sub.len(), 10);
    assert_eq!(sub.names(), &["a", "tag"]);
    assert_eq!(
        collect_a(sub.rows()?),
        (990..1000).collect::<Vec<_>>()
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Selectors end to end
// ═══════════════════════════════════════════════════════════

#[test]
fn selector_shapes_round_trip() -> SiloResult<()> {
    let t = fixture(None);

    // single row, negative index
    let row = t.get(-1)?.into_row()?;
    assert_eq!(row.get("a"), Some(&CellValue::Int64(999)));

    // span to batch
    let batch = t.get(Span::new(10, 13))?.into_batch()?;
    assert_eq!(batch.num_rows(), 3);

    // name list to projection sharing columns
    let proj = t.get(vec!["a".to_string(), "b".to_string()])?.into_table()?;
    assert_eq!(proj.ncols(), 2);
    assert_eq!(proj.len(), t.len());

    // bare name to the column handle
    let col = t.get("b")?.into_column()?;
    assert_eq!(col.read().len(), 1000);

    // expression key to filtered batch
    let hits = t.get("a % 500 = 1")?.into_batch()?;
    assert_eq!(hits.num_rows(), 2);
    Ok(())
}

#[test]
fn predicate_assignment_updates_matches() -> SiloResult<()> {
    let dir = tempdir().unwrap();
    let mut t = fixture(Some(&dir.path().join("w")));

    // zero out b wherever a is in the last decade
    let replacement: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from((990..1000).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(vec![0.0; 10])),
        Arc::new(StringArray::from(vec!["gx"; 10])),
    ];
    t.set("a >= 990", replacement)?;

    let sub = t.fetch_where("tag = 'gx'", ScanOpts::new())?;
    assert_eq!(sub.num_rows(), 10);

    // and persisted
    let reopened = Table::open(dir.path().join("w"), Mode::ReadOnly)?;
    assert_eq!(
        reopened.fetch_where("tag = 'gx'", ScanOpts::new())?.num_rows(),
        10
    );
    Ok(())
}

#[test]
fn unsupported_selectors_stay_closed() {
    let mut t = fixture(None);
    let err = t
        .set(Selector::Rows(vec![1, 2]), vec![] as Vec<ArrayRef>)
        .unwrap_err();
    assert!(matches!(err, SiloError::Index(_)));
}

// ═══════════════════════════════════════════════════════════
// Eval with scopes
// ═══════════════════════════════════════════════════════════

#[test]
fn eval_joins_external_column_handles() -> SiloResult<()> {
    let t = fixture(None);

    let other_schema = Arc::new(Schema::new(vec![Field::new(
        "scale",
        DataType::Float64,
        false,
    )]));
    let other = Table::from_batch(
        RecordBatch::try_new(
            other_schema,
            vec![Arc::new(Float64Array::from(
                (0..ROWS).map(|_| 2.0).collect::<Vec<_>>(),
            ))],
        )
        .unwrap(),
        TableOptions::new(),
    )?;

    let scope = Scope::new().with_column("scale", other.col("scale")?);
    let out = t.eval("b * scale", &scope)?;
    let out = out.as_any().downcast_ref::<Float64Array>().unwrap();
    assert_eq!(out.value(3), 3.0);
    assert_eq!(out.len(), 1000);
    Ok(())
}

#[test]
fn queries_read_consistently_after_reopen() -> SiloResult<()> {
    let dir = tempdir().unwrap();
    let root = dir.path().join("persisted");
    fixture(Some(&root));

    let t = Table::open(&root, Mode::ReadOnly)?;
    let got = collect_a(t.where_rows("a % 2 = 0 and a < 20", ScanOpts::new())?);
    assert_eq!(got, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);

    // read-only tables refuse assignment but serve projections
    let proj = t.get(vec!["a".to_string()])?.into_table()?;
    assert_eq!(proj.len(), 1000);
    Ok(())
}
