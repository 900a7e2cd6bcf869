//! Block-shaped query results.
//!
//! [`BlockIter`] drains a row iterator into `RecordBatch` blocks of at
//! most `blen` rows, rebuilding per-column arrays from the streamed
//! cells. The last block is short; an exhausted input ends iteration
//! with no empty terminal block.

use crate::error::SiloResult;
use crate::query::rows::RowIter;
use crate::storage::CellValue;
use crate::storage::value::cells_to_array;
use arrow::array::ArrayRef;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

/// Streaming iterator of row blocks.
pub struct BlockIter {
    inner: RowIter,
    blen: usize,
}

impl BlockIter {
    pub(crate) fn new(inner: RowIter, blen: usize) -> Self {
        BlockIter { inner, blen }
    }

    /// The output block layout.
    pub fn schema(&self) -> &SchemaRef {
        self.inner.schema()
    }

    fn assemble(&self, cells: Vec<Vec<CellValue>>, rows: usize) -> SiloResult<RecordBatch> {
        let schema = self.inner.schema().clone();
        if schema.fields().is_empty() {
            let options = RecordBatchOptions::new().with_row_count(Some(rows));
            return Ok(RecordBatch::try_new_with_options(schema, vec![], &options)?);
        }
        let arrays = schema
            .fields()
            .iter()
            .zip(&cells)
            .map(|(field, column)| cells_to_array(field.data_type(), column))
            .collect::<SiloResult<Vec<ArrayRef>>>()?;
        Ok(RecordBatch::try_new(schema, arrays)?)
    }
}

impl Iterator for BlockIter {
    type Item = SiloResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let width = self.inner.schema().fields().len();
        let mut cells: Vec<Vec<CellValue>> = (0..width)
            .map(|_| Vec::with_capacity(self.blen))
            .collect();
        let mut rows = 0;

        while rows < self.blen {
            match self.inner.next() {
                Some(Ok(row)) => {
                    for (column, cell) in cells.iter_mut().zip(row.into_values()) {
                        column.push(cell);
                    }
                    rows += 1;
                }
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }

        if rows == 0 {
            return None;
        }
        Some(self.assemble(cells, rows))
    }
}
