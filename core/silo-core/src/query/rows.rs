//! Composite rows and the streaming row iterator.
//!
//! [`RowIter`] zips one cell cursor per output column. The cursors carry
//! their own skip/limit accounting and keep the last decoded chunk local,
//! so advancing a row costs constant work plus one small value vec.

use crate::error::{SiloError, SiloResult};
use crate::storage::{CellValue, MaskCursor, RangeCursor};
use arrow::array::BooleanArray;
use arrow::datatypes::SchemaRef;
use std::sync::Arc;

/// One composite row: a schema plus index-aligned values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    schema: SchemaRef,
    values: Vec<CellValue>,
}

impl Row {
    /// Build a row, checking that the values line up with the schema.
    pub fn new(schema: SchemaRef, values: Vec<CellValue>) -> SiloResult<Row> {
        if schema.fields().len() != values.len() {
            return Err(SiloError::Validation(format!(
                "{} values for a schema of {} fields",
                values.len(),
                schema.fields().len()
            )));
        }
        Ok(Row { schema, values })
    }

    pub(crate) fn from_parts(schema: SchemaRef, values: Vec<CellValue>) -> Row {
        Row { schema, values }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Value by column name.
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        let idx = self.schema.index_of(name).ok()?;
        self.values.get(idx)
    }

    /// Value by position.
    pub fn get_at(&self, idx: usize) -> Option<&CellValue> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<CellValue> {
        self.values
    }
}

/// One cell stream feeding a row iterator. Real columns stream through
/// the storage cursors; the `nrow__` pseudo-column streams the matching
/// positions themselves.
pub(crate) enum CellStream {
    Range(RangeCursor),
    Mask(MaskCursor),
    RangePos(RangePosCursor),
    MaskPos(MaskPosCursor),
}

impl CellStream {
    fn next_cell(&mut self) -> Option<SiloResult<CellValue>> {
        match self {
            CellStream::Range(c) => c.next(),
            CellStream::Mask(c) => c.next(),
            CellStream::RangePos(c) => c.next(),
            CellStream::MaskPos(c) => c.next(),
        }
    }
}

/// Positional counterpart of the range cursor: yields the row offsets a
/// range scan visits, as `Int64` cells.
pub(crate) struct RangePosCursor {
    next: usize,
    stop: usize,
    step: usize,
    remaining: Option<usize>,
}

impl RangePosCursor {
    pub(crate) fn new(start: usize, stop: usize, step: usize, limit: Option<usize>, skip: usize) -> Self {
        let step = step.max(1);
        RangePosCursor {
            next: start.saturating_add(skip.saturating_mul(step)),
            stop,
            step,
            remaining: limit,
        }
    }
}

impl Iterator for RangePosCursor {
    type Item = SiloResult<CellValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.stop || self.remaining == Some(0) {
            return None;
        }
        let pos = self.next;
        self.next = self.next.saturating_add(self.step);
        if let Some(r) = &mut self.remaining {
            *r -= 1;
        }
        Some(Ok(CellValue::Int64(pos as i64)))
    }
}

/// Positional counterpart of the mask cursor: yields the offsets of the
/// mask's true rows; limit and skip count matches.
pub(crate) struct MaskPosCursor {
    mask: BooleanArray,
    pos: usize,
    to_skip: usize,
    remaining: Option<usize>,
}

impl MaskPosCursor {
    pub(crate) fn new(mask: BooleanArray, limit: Option<usize>, skip: usize) -> Self {
        MaskPosCursor {
            mask,
            pos: 0,
            to_skip: skip,
            remaining: limit,
        }
    }
}

impl Iterator for MaskPosCursor {
    type Item = SiloResult<CellValue>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.mask.len() || self.remaining == Some(0) {
                return None;
            }
            let pos = self.pos;
            self.pos += 1;
            if !self.mask.value(pos) {
                continue;
            }
            if self.to_skip > 0 {
                self.to_skip -= 1;
                continue;
            }
            if let Some(r) = &mut self.remaining {
                *r -= 1;
            }
            return Some(Ok(CellValue::Int64(pos as i64)));
        }
    }
}

/// Streaming iterator of composite rows.
pub struct RowIter {
    schema: SchemaRef,
    streams: Vec<CellStream>,
}

impl RowIter {
    pub(crate) fn new(schema: SchemaRef, streams: Vec<CellStream>) -> Self {
        RowIter { schema, streams }
    }

    /// The output row layout.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// An unfilled buffer for [`RowIter::fill_next`].
    pub fn empty_row(&self) -> Row {
        Row::from_parts(
            Arc::clone(&self.schema),
            Vec::with_capacity(self.streams.len()),
        )
    }

    /// Positional variant: rows as bare value vecs, no schema handle.
    pub fn tuples(self) -> Tuples {
        Tuples { inner: self }
    }

    /// Fill a caller-owned row buffer; `Ok(false)` means exhausted.
    /// Reuses the buffer's value vec, so a scan loop allocates nothing
    /// per row.
    pub fn fill_next(&mut self, row: &mut Row) -> SiloResult<bool> {
        if !Arc::ptr_eq(&row.schema, &self.schema) {
            row.schema = Arc::clone(&self.schema);
        }
        row.values.clear();
        self.advance(&mut row.values)
    }

    /// Pull one cell from every stream into `values`. All streams share
    /// the same accounting, so they exhaust together.
    fn advance(&mut self, values: &mut Vec<CellValue>) -> SiloResult<bool> {
        for stream in &mut self.streams {
            match stream.next_cell() {
                Some(cell) => values.push(cell?),
                None => return Ok(false),
            }
        }
        Ok(!self.streams.is_empty())
    }
}

impl Iterator for RowIter {
    type Item = SiloResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut values = Vec::with_capacity(self.streams.len());
        match self.advance(&mut values) {
            Ok(true) => Some(Ok(Row::from_parts(Arc::clone(&self.schema), values))),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Rows as positional value vecs; the schema is on the parent iterator.
pub struct Tuples {
    inner: RowIter,
}

impl Iterator for Tuples {
    type Item = SiloResult<Vec<CellValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut values = Vec::with_capacity(self.inner.streams.len());
        match self.inner.advance(&mut values) {
            Ok(true) => Some(Ok(values)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field, Schema};

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Utf8, false),
        ]))
    }

    #[test]
    fn row_access_by_name_and_index() {
        let row = Row::new(
            schema(),
            vec![CellValue::Int64(7), CellValue::Utf8("x".to_string())],
        )
        .unwrap();
        assert_eq!(row.get("a"), Some(&CellValue::Int64(7)));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get_at(1), Some(&CellValue::Utf8("x".to_string())));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn row_new_checks_arity() {
        assert!(Row::new(schema(), vec![CellValue::Int64(1)]).is_err());
    }

    #[test]
    fn range_pos_cursor_accounting() {
        let cursor = RangePosCursor::new(2, 20, 3, Some(4), 2);
        let got: Vec<_> = cursor.map(|c| c.unwrap()).collect();
        // start 2, step 3, skip 2 positions -> first at 8
        assert_eq!(
            got,
            vec![
                CellValue::Int64(8),
                CellValue::Int64(11),
                CellValue::Int64(14),
                CellValue::Int64(17)
            ]
        );
    }

    #[test]
    fn mask_pos_cursor_counts_matches() {
        let mask = BooleanArray::from(vec![
            false, true, false, true, true, false, true, true,
        ]);
        let cursor = MaskPosCursor::new(mask, Some(3), 1);
        let got: Vec<_> = cursor.map(|c| c.unwrap()).collect();
        assert_eq!(
            got,
            vec![CellValue::Int64(3), CellValue::Int64(4), CellValue::Int64(6)]
        );
    }
}
