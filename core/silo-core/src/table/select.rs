//! Indexed access: `Table::get` and `Table::set` over typed selectors.
//!
//! The selector is a closed enum, so every supported key shape is
//! spelled out and everything else is unrepresentable. `get` answers
//! with a [`Selection`] whose shape follows the selector: single rows
//! come back as [`Row`], row subsets as `RecordBatch`, column
//! projections as a [`Table`] sharing the underlying column handles,
//! and a bare column name as the shared handle itself.

use crate::error::{SiloError, SiloResult};
use crate::expr::Scope;
use crate::query::Row;
use crate::storage::{CellValue, SharedColumn};
use crate::table::mutate::RowGroup;
use crate::table::{Mode, Table};
use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::record_batch::RecordBatch;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

/// Half-open row span with an optional stride, python-slice rules:
/// negative endpoints wrap from the end, overshoot clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Span {
    pub fn new(start: i64, stop: i64) -> Self {
        Span {
            start: Some(start),
            stop: Some(stop),
            step: None,
        }
    }

    /// The whole table.
    pub fn all() -> Self {
        Span::default()
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Resolve against a length: `(start, stop, step)` with
    /// `start <= stop <= len`. Non-positive steps are refused.
    pub(crate) fn normalize(&self, len: usize) -> SiloResult<(usize, usize, usize)> {
        let step = self.step.unwrap_or(1);
        if step <= 0 {
            return Err(SiloError::NotImplemented(format!(
                "span step must be positive, got {step}"
            )));
        }
        let start = clamp_endpoint(self.start.unwrap_or(0), len);
        let stop = clamp_endpoint(self.stop.unwrap_or(len as i64), len);
        Ok((start, stop.max(start), step as usize))
    }
}

fn clamp_endpoint(v: i64, len: usize) -> usize {
    let len = len as i64;
    let v = if v < 0 { v + len } else { v };
    v.clamp(0, len) as usize
}

/// The key shapes [`Table::get`] and [`Table::set`] accept.
pub enum Selector {
    /// One row; negative wraps from the end.
    Row(i64),
    /// Contiguous (possibly strided) rows.
    Span(Span),
    /// Explicit row list; order preserved, duplicates allowed.
    Rows(Vec<i64>),
    /// Column projection by name.
    Names(Vec<String>),
    /// Boolean row filter covering the whole table.
    Mask(BooleanArray),
    /// Column name, else predicate expression.
    Key(String),
}

impl From<i64> for Selector {
    fn from(row: i64) -> Self {
        Selector::Row(row)
    }
}

impl From<Span> for Selector {
    fn from(span: Span) -> Self {
        Selector::Span(span)
    }
}

impl From<Range<i64>> for Selector {
    fn from(r: Range<i64>) -> Self {
        Selector::Span(Span::new(r.start, r.end))
    }
}

impl From<RangeFrom<i64>> for Selector {
    fn from(r: RangeFrom<i64>) -> Self {
        Selector::Span(Span {
            start: Some(r.start),
            stop: None,
            step: None,
        })
    }
}

impl From<RangeTo<i64>> for Selector {
    fn from(r: RangeTo<i64>) -> Self {
        Selector::Span(Span {
            start: None,
            stop: Some(r.end),
            step: None,
        })
    }
}

impl From<RangeFull> for Selector {
    fn from(_: RangeFull) -> Self {
        Selector::Span(Span::all())
    }
}

impl From<Vec<i64>> for Selector {
    fn from(rows: Vec<i64>) -> Self {
        Selector::Rows(rows)
    }
}

impl From<&[i64]> for Selector {
    fn from(rows: &[i64]) -> Self {
        Selector::Rows(rows.to_vec())
    }
}

impl From<Vec<String>> for Selector {
    fn from(names: Vec<String>) -> Self {
        Selector::Names(names)
    }
}

impl From<&[&str]> for Selector {
    fn from(names: &[&str]) -> Self {
        Selector::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Selector {
    fn from(names: [&str; N]) -> Self {
        Selector::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<BooleanArray> for Selector {
    fn from(mask: BooleanArray) -> Self {
        Selector::Mask(mask)
    }
}

impl From<&str> for Selector {
    fn from(key: &str) -> Self {
        Selector::Key(key.to_string())
    }
}

impl From<String> for Selector {
    fn from(key: String) -> Self {
        Selector::Key(key)
    }
}

// One-element tuple unwraps to its element; wider tuples do not exist
// as selectors.
impl<S: Into<Selector>> From<(S,)> for Selector {
    fn from((s,): (S,)) -> Self {
        s.into()
    }
}

/// What [`Table::get`] yields; the variant follows the selector shape.
pub enum Selection {
    Row(Row),
    Batch(RecordBatch),
    Table(Table),
    Column(SharedColumn),
}

impl Selection {
    fn kind(&self) -> &'static str {
        match self {
            Selection::Row(_) => "row",
            Selection::Batch(_) => "batch",
            Selection::Table(_) => "table",
            Selection::Column(_) => "column",
        }
    }

    pub fn into_row(self) -> SiloResult<Row> {
        match self {
            Selection::Row(row) => Ok(row),
            other => Err(mismatch("row", &other)),
        }
    }

    pub fn into_batch(self) -> SiloResult<RecordBatch> {
        match self {
            Selection::Batch(batch) => Ok(batch),
            other => Err(mismatch("batch", &other)),
        }
    }

    pub fn into_table(self) -> SiloResult<Table> {
        match self {
            Selection::Table(table) => Ok(table),
            other => Err(mismatch("table", &other)),
        }
    }

    pub fn into_column(self) -> SiloResult<SharedColumn> {
        match self {
            Selection::Column(col) => Ok(col),
            other => Err(mismatch("column", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &Selection) -> SiloError {
    SiloError::TypeMismatch {
        expected: expected.to_string(),
        actual: got.kind().to_string(),
    }
}

impl Table {
    // ════════════════════════════ Get ════════════════════════════

    /// Read through a selector.
    pub fn get(&self, key: impl Into<Selector>) -> SiloResult<Selection> {
        if self.cols.is_empty() {
            return Err(SiloError::NoColumns);
        }
        match key.into() {
            Selector::Row(i) => {
                let row = self.resolve_row(i)?;
                Ok(Selection::Row(self.read_row(row)?))
            }
            Selector::Span(span) => {
                let (start, stop, step) = span.normalize(self.len())?;
                if step == 1 {
                    Ok(Selection::Batch(self.slice_batch(start, stop)?))
                } else {
                    let positions: Vec<usize> = (start..stop).step_by(step).collect();
                    Ok(Selection::Batch(self.gather_batch(&positions)?))
                }
            }
            Selector::Rows(rows) => {
                let positions = rows
                    .iter()
                    .map(|&i| self.resolve_row(i))
                    .collect::<SiloResult<Vec<_>>>()?;
                Ok(Selection::Batch(self.gather_batch(&positions)?))
            }
            Selector::Names(names) => Ok(Selection::Table(self.project(&names)?)),
            Selector::Mask(mask) => Ok(Selection::Batch(self.filter_batch(&mask)?)),
            Selector::Key(key) => {
                if let Some(col) = self.cols.get(&key) {
                    return Ok(Selection::Column(col.clone()));
                }
                let mask = self.key_mask(&key)?;
                Ok(Selection::Batch(self.filter_batch(&mask)?))
            }
        }
    }

    /// One composite row by position, negative wrapping from the end.
    pub fn row(&self, i: i64) -> SiloResult<Row> {
        self.get(Selector::Row(i))?.into_row()
    }

    // ════════════════════════════ Set ════════════════════════════

    /// Write through a selector. The supported shapes are a column key
    /// (name or predicate expression), a single row, and a span; the
    /// rest are refused.
    pub fn set(&mut self, key: impl Into<Selector>, rows: impl Into<RowGroup>) -> SiloResult<()> {
        self.ensure_writable()?;
        if self.cols.is_empty() {
            return Err(SiloError::NoColumns);
        }
        match key.into() {
            Selector::Key(key) => {
                if self.cols.contains(&key) {
                    let array = single_column(rows.into())?;
                    self.set_col(&key, &array)
                } else {
                    let mask = self.key_mask(&key)?;
                    let positions: Vec<usize> =
                        (0..mask.len()).filter(|&i| mask.value(i)).collect();
                    self.set_positions(&positions, rows.into())
                }
            }
            Selector::Row(i) => {
                let pos = self.resolve_row(i)?;
                self.set_positions(&[pos], rows.into())
            }
            Selector::Span(span) => {
                let (start, stop, step) = span.normalize(self.len())?;
                let positions: Vec<usize> = (start..stop).step_by(step).collect();
                self.set_positions(&positions, rows.into())
            }
            Selector::Rows(_) | Selector::Names(_) | Selector::Mask(_) => Err(SiloError::Index(
                "unsupported assignment key; assign through a row, a span, a column name or a \
                 predicate expression"
                    .to_string(),
            )),
        }
    }

    // ════════════════════════════ Internal ════════════════════════════

    fn resolve_row(&self, i: i64) -> SiloResult<usize> {
        let len = self.len() as i64;
        let wrapped = if i < 0 { i + len } else { i };
        if wrapped < 0 || wrapped >= len {
            return Err(SiloError::Index(format!(
                "row {i} out of range for table of {len} rows"
            )));
        }
        Ok(wrapped as usize)
    }

    fn read_row(&self, row: usize) -> SiloResult<Row> {
        let values = self
            .cols
            .iter()
            .map(|(_, col)| col.read().get(row))
            .collect::<SiloResult<Vec<_>>>()?;
        Ok(Row::from_parts(self.schema(), values))
    }

    pub(crate) fn gather_batch(&self, positions: &[usize]) -> SiloResult<RecordBatch> {
        let arrays = self
            .cols
            .iter()
            .map(|(_, col)| col.read().gather(positions))
            .collect::<SiloResult<Vec<_>>>()?;
        Ok(RecordBatch::try_new(self.schema(), arrays)?)
    }

    pub(crate) fn filter_batch(&self, mask: &BooleanArray) -> SiloResult<RecordBatch> {
        if mask.len() != self.len() {
            return Err(SiloError::Validation(format!(
                "boolean mask has {} rows, table has {}",
                mask.len(),
                self.len()
            )));
        }
        if mask.null_count() > 0 {
            return Err(SiloError::Validation(
                "boolean mask carries nulls".to_string(),
            ));
        }
        let arrays = self
            .cols
            .iter()
            .map(|(_, col)| col.read().filter_mask(mask))
            .collect::<SiloResult<Vec<_>>>()?;
        Ok(RecordBatch::try_new(self.schema(), arrays)?)
    }

    /// Projection sharing the column handles; mutation through either
    /// table is visible through the other.
    fn project(&self, names: &[String]) -> SiloResult<Table> {
        use crate::table::attrs::Attrs;
        use crate::table::registry::ColumnRegistry;
        use arrow::datatypes::Schema;
        use std::sync::Arc;

        let mut cols = ColumnRegistry::new();
        for name in names {
            let col = self.col(name)?;
            cols.push(name.clone(), col)?;
        }
        let mode = if self.mode == Mode::ReadOnly {
            Mode::ReadOnly
        } else {
            Mode::Memory
        };
        let mut table = Table {
            cols,
            mode,
            rootdir: None,
            cparams: self.cparams,
            chunklen: self.chunklen,
            auto_flush: false,
            attrs: Attrs::new_memory(),
            schema: Arc::new(Schema::empty()),
        };
        table.attrs.restore(self.attrs.to_map())?;
        table.rebuild_schema();
        Ok(table)
    }

    /// Resolve a key expression to a boolean mask; a non-boolean result
    /// is an index error naming the key.
    fn key_mask(&self, key: &str) -> SiloResult<BooleanArray> {
        let array = self.eval(key, &Scope::new())?;
        let mask = array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .cloned()
            .ok_or_else(|| {
                SiloError::Index(format!(
                    "key '{key}' is neither a column name nor a boolean expression"
                ))
            })?;
        if mask.null_count() > 0 {
            return Err(SiloError::Validation(
                "boolean mask carries nulls".to_string(),
            ));
        }
        Ok(mask)
    }

    /// Write `rows` onto explicit positions: one row per position, or a
    /// single row broadcast to all of them.
    fn set_positions(&mut self, positions: &[usize], rows: RowGroup) -> SiloResult<()> {
        let (arrays, rows_in) = self.resolve_rows(rows)?;
        if rows_in != positions.len() && rows_in != 1 {
            return Err(SiloError::Validation(format!(
                "assignment carries {rows_in} rows for {} selected rows",
                positions.len()
            )));
        }
        for ((_, col), array) in self.cols.iter().zip(&arrays) {
            let mut updates = Vec::with_capacity(positions.len());
            for (k, &pos) in positions.iter().enumerate() {
                let idx = if rows_in == 1 { 0 } else { k };
                updates.push((pos, CellValue::from_array(array, idx)?));
            }
            col.write().update_rows(&updates)?;
        }
        self.maybe_flush()
    }
}

/// The one-column array a whole-column assignment must carry.
fn single_column(rows: RowGroup) -> SiloResult<ArrayRef> {
    match rows {
        RowGroup::Columns(mut arrays) if arrays.len() == 1 => Ok(arrays.remove(0)),
        RowGroup::Batch(batch) if batch.num_columns() == 1 => Ok(batch.column(0).clone()),
        _ => Err(SiloError::Validation(
            "whole-column assignment takes exactly one column".to_string(),
        )),
    }
}
