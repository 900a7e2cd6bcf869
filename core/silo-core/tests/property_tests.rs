// Property tests: mutations against a plain Vec model, selector
// equivalences and scan windowing over generated data.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Int64Array};
use proptest::prelude::*;
use silo_core::{CellValue, Mode, RowIter, ScanOpts, Span, Table, TableOptions};
use tempfile::tempdir;

// ─────────────────────────────── Helpers ───────────────────────────────

fn table_of(values: &[i64]) -> Table {
    let col: ArrayRef = Arc::new(Int64Array::from(values.to_vec()));
    Table::from_arrays(
        vec![col],
        vec!["a".to_string()],
        TableOptions::new().with_chunklen(16),
    )
    .unwrap()
}

fn drain_a(iter: RowIter) -> Vec<i64> {
    iter.map(|row| match row.unwrap().get("a") {
        Some(CellValue::Int64(v)) => *v,
        other => panic!("unexpected cell {other:?}"),
    })
    .collect()
}

fn contents(t: &Table) -> Vec<i64> {
    drain_a(t.rows().unwrap())
}

#[derive(Debug, Clone)]
enum Op {
    Append(Vec<i64>),
    Trim(usize),
    Resize(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(any::<i64>(), 1..24).prop_map(Op::Append),
        (0usize..40).prop_map(Op::Trim),
        (0usize..80).prop_map(Op::Resize),
    ]
}

// ═══════════════════════════════════════════════════════════
// In-memory properties
// ═══════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Append/trim/resize behave exactly like the same operations on a
    /// Vec, and a trim past the row count leaves the table untouched.
    #[test]
    fn prop_mutations_track_vec_model(
        seed in prop::collection::vec(any::<i64>(), 1..40),
        ops in prop::collection::vec(arb_op(), 0..10),
    ) {
        let mut t = table_of(&seed);
        let mut model = seed.clone();

        for op in ops {
            match op {
                Op::Append(rows) => {
                    let col: ArrayRef = Arc::new(Int64Array::from(rows.clone()));
                    t.append(vec![col]).unwrap();
                    model.extend(rows);
                }
                Op::Trim(n) => {
                    if n > model.len() {
                        prop_assert!(t.trim(n).is_err());
                        prop_assert_eq!(t.len(), model.len());
                    } else {
                        t.trim(n).unwrap();
                        model.truncate(model.len() - n);
                    }
                }
                Op::Resize(n) => {
                    t.resize(n).unwrap();
                    model.resize(n, 0);
                }
            }
        }

        prop_assert_eq!(t.len(), model.len());
        prop_assert_eq!(contents(&t), model);
    }

    /// The scan window keeps `min(limit, matches - skip)` rows from the
    /// skip'th match on, regardless of where chunk boundaries fall.
    #[test]
    fn prop_limit_skip_window_the_matches(
        data in prop::collection::vec(-50i64..50, 0..150),
        skip in 0usize..40,
        limit in 0usize..40,
    ) {
        let t = table_of(&data);
        let matched: Vec<i64> = data.iter().copied().filter(|v| v % 3 == 0).collect();
        let lo = skip.min(matched.len());
        let hi = (skip + limit).min(matched.len());

        let got = drain_a(
            t.where_rows("a % 3 = 0", ScanOpts::new().with_skip(skip).with_limit(limit))
                .unwrap(),
        );
        prop_assert_eq!(got, &matched[lo..hi]);
    }

    /// Selecting through a boolean mask returns the same batch as
    /// gathering the mask's true positions by row number.
    #[test]
    fn prop_mask_selects_like_row_gather(
        (data, keep) in prop::collection::vec(any::<i64>(), 0..80).prop_flat_map(|data| {
            let n = data.len();
            (Just(data), prop::collection::vec(any::<bool>(), n))
        }),
    ) {
        let t = table_of(&data);
        let positions: Vec<i64> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i as i64))
            .collect();

        let by_mask = t
            .get(BooleanArray::from(keep.clone()))
            .unwrap()
            .into_batch()
            .unwrap();
        let by_rows = t.get(positions).unwrap().into_batch().unwrap();
        prop_assert_eq!(by_mask, by_rows);
    }

    /// Span iteration visits the rows a slice of `0..len` would: negative
    /// endpoints wrap, out-of-range endpoints clamp, the step strides.
    #[test]
    fn prop_span_steps_like_a_slice(
        len in 0usize..60,
        start in -70i64..70,
        stop in -70i64..70,
        step in 1i64..6,
    ) {
        let data: Vec<i64> = (0..len as i64).collect();
        let t = table_of(&data);

        let n = len as i64;
        let clamp = |v: i64| (if v < 0 { v + n } else { v }).clamp(0, n);
        let (lo, hi) = (clamp(start), clamp(stop).max(clamp(start)));
        let want: Vec<i64> = (lo..hi).step_by(step as usize).collect();

        let got = drain_a(
            t.iter_rows(Span::new(start, stop).with_step(step), ScanOpts::new())
                .unwrap(),
        );
        prop_assert_eq!(got, want);
    }
}

// ═══════════════════════════════════════════════════════════
// Disk properties
// ═══════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever the chunk length, a flushed table reopens with the same
    /// rows in the same order.
    #[test]
    fn prop_disk_round_trip_preserves_rows(
        data in prop::collection::vec(any::<i64>(), 1..200),
        chunklen in 1usize..64,
    ) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("t");
        {
            let col: ArrayRef = Arc::new(Int64Array::from(data.clone()));
            Table::from_arrays(
                vec![col],
                vec!["a".to_string()],
                TableOptions::new().with_rootdir(&root).with_chunklen(chunklen),
            )
            .unwrap();
        }

        let back = Table::open(&root, Mode::ReadOnly).unwrap();
        prop_assert_eq!(back.len(), data.len());
        prop_assert_eq!(contents(&back), data);
    }
}
