//! Query entry points: filtered and positional row iteration, block
//! iteration, and one-shot fetch materialization.
//!
//! A query names a predicate (expression text or precomputed mask), an
//! output column list, and skip/limit accounting over the matches. The
//! pseudo-column [`NROW_COLUMN`] may appear among the output columns and
//! yields each matching row's offset as `Int64`.

pub mod blocks;
pub mod rows;

pub use blocks::BlockIter;
pub use rows::{Row, RowIter, Tuples};

use crate::error::{SiloError, SiloResult};
use crate::storage::ColumnStore;
use crate::table::select::Span;
use crate::table::{Table, TableOptions};
use arrow::array::{Array, BooleanArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use rows::{CellStream, MaskPosCursor, RangePosCursor};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

/// Name of the row-offset pseudo-column accepted in `outcols`.
pub const NROW_COLUMN: &str = "nrow__";

/// What a filtered scan selects on.
pub enum Predicate {
    /// Boolean expression over the table's columns.
    Expr(String),
    /// Precomputed mask covering the whole table.
    Mask(BooleanArray),
}

impl From<&str> for Predicate {
    fn from(text: &str) -> Self {
        Predicate::Expr(text.to_string())
    }
}

impl From<String> for Predicate {
    fn from(text: String) -> Self {
        Predicate::Expr(text)
    }
}

impl From<BooleanArray> for Predicate {
    fn from(mask: BooleanArray) -> Self {
        Predicate::Mask(mask)
    }
}

/// Output shaping for scans: column list, limit, skip.
#[derive(Debug, Clone, Default)]
pub struct ScanOpts {
    /// Output columns in yield order; `None` means all columns in
    /// registry order. Entries must be registered names or
    /// [`NROW_COLUMN`].
    pub outcols: Option<Vec<String>>,
    /// Cap on yielded rows, applied after `skip`.
    pub limit: Option<usize>,
    /// Matches to drop before yielding starts.
    pub skip: usize,
}

impl ScanOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcols<I, S>(mut self, outcols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outcols = Some(outcols.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }
}

/// How a scan picks its rows.
enum RowPick {
    Range { start: usize, stop: usize, step: usize },
    Mask(BooleanArray),
}

impl Table {
    // ════════════════════════════ Row iteration ════════════════════════════

    /// Stream the rows where the predicate holds.
    ///
    /// Expression predicates evaluate once, over the table as of this
    /// call. With `skip` and `limit`, the yield count is
    /// `min(limit, max(0, matches - skip))`.
    pub fn where_rows(
        &self,
        pred: impl Into<Predicate>,
        opts: ScanOpts,
    ) -> SiloResult<RowIter> {
        let mask = self.predicate_mask(pred.into())?;
        self.build_row_iter(RowPick::Mask(mask), &opts)
    }

    /// Stream rows positionally over a span.
    pub fn iter_rows(&self, span: Span, opts: ScanOpts) -> SiloResult<RowIter> {
        let (start, stop, step) = span.normalize(self.len())?;
        self.build_row_iter(RowPick::Range { start, stop, step }, &opts)
    }

    /// Stream every row.
    pub fn rows(&self) -> SiloResult<RowIter> {
        self.iter_rows(Span::all(), ScanOpts::default())
    }

    // ════════════════════════════ Block iteration ════════════════════════════

    /// Like [`Table::where_rows`], but yields `RecordBatch` blocks of up
    /// to `blen` rows. The default `blen` is the smallest chunklen among
    /// the output columns.
    pub fn where_blocks(
        &self,
        pred: impl Into<Predicate>,
        blen: Option<usize>,
        opts: ScanOpts,
    ) -> SiloResult<BlockIter> {
        let outcols = self.resolve_outcols(&opts);
        let blen = match blen {
            Some(0) => {
                return Err(SiloError::Validation(
                    "block length must be positive".to_string(),
                ));
            }
            Some(n) => n,
            None => self.default_blen(&outcols)?,
        };
        let rows = self.where_rows(pred, opts)?;
        Ok(BlockIter::new(rows, blen))
    }

    /// Materialize every match as one batch; an empty batch keeps the
    /// projected schema.
    pub fn fetch_where(
        &self,
        pred: impl Into<Predicate>,
        opts: ScanOpts,
    ) -> SiloResult<RecordBatch> {
        let mut blocks = self.where_blocks(pred, None, opts)?;
        let schema = blocks.schema().clone();
        let mut batches: SmallVec<[RecordBatch; 8]> = SmallVec::new();
        for block in &mut blocks {
            batches.push(block?);
        }
        if batches.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }
        debug!(blocks = batches.len(), "materialized fetch result");
        Ok(concat_batches(&schema, batches.iter())?)
    }

    /// Materialize every match as a new table (disk-backed when
    /// `table_opts` carries a rootdir). The output columns become the new
    /// table's columns, so [`NROW_COLUMN`] is refused here.
    pub fn fetch_where_table(
        &self,
        pred: impl Into<Predicate>,
        opts: ScanOpts,
        table_opts: TableOptions,
    ) -> SiloResult<Table> {
        let mut blocks = self.where_blocks(pred, None, opts)?;
        let schema = blocks.schema().clone();
        let mut table = match blocks.next() {
            Some(first) => Table::from_batch(first?, table_opts)?,
            None => Table::from_batch(RecordBatch::new_empty(schema), table_opts)?,
        };
        for block in blocks {
            table.append(block?)?;
        }
        Ok(table)
    }

    // ════════════════════════════ Internal ════════════════════════════

    /// Resolve a predicate to a full-length, null-free mask. Expression
    /// predicates evaluate over the columns; mask predicates must already
    /// cover the table exactly. A predicate built on a NULL literal
    /// produces nulls and is refused here rather than treated as false.
    fn predicate_mask(&self, pred: Predicate) -> SiloResult<BooleanArray> {
        let mask = match pred {
            Predicate::Expr(text) => self.eval_mask(&text)?,
            Predicate::Mask(mask) => {
                if mask.len() != self.len() {
                    return Err(SiloError::Validation(format!(
                        "boolean mask has {} rows, table has {}",
                        mask.len(),
                        self.len()
                    )));
                }
                mask
            }
        };
        if mask.null_count() > 0 {
            return Err(SiloError::Validation(
                "boolean mask carries nulls".to_string(),
            ));
        }
        Ok(mask)
    }

    fn resolve_outcols(&self, opts: &ScanOpts) -> Vec<String> {
        match &opts.outcols {
            Some(outcols) => outcols.clone(),
            None => self.names().to_vec(),
        }
    }

    /// Schema of a scan's output rows.
    fn scan_schema(&self, outcols: &[String]) -> SiloResult<SchemaRef> {
        let mut fields = Vec::with_capacity(outcols.len());
        for name in outcols {
            if name == NROW_COLUMN {
                fields.push(Field::new(NROW_COLUMN, DataType::Int64, false));
            } else {
                let col = self.col(name)?;
                fields.push(Field::new(name, col.read().dtype().clone(), false));
            }
        }
        Ok(Arc::new(Schema::new(fields)))
    }

    /// Smallest chunklen among the real output columns.
    fn default_blen(&self, outcols: &[String]) -> SiloResult<usize> {
        let mut blen = None;
        for name in outcols {
            if name == NROW_COLUMN {
                continue;
            }
            let col = self.col(name)?;
            let chunklen = col.read().chunklen();
            blen = Some(blen.map_or(chunklen, |b: usize| b.min(chunklen)));
        }
        Ok(blen.unwrap_or_else(|| self.resolved_chunklen()))
    }

    fn build_row_iter(&self, pick: RowPick, opts: &ScanOpts) -> SiloResult<RowIter> {
        let outcols = self.resolve_outcols(opts);
        let schema = self.scan_schema(&outcols)?;

        let mut streams = Vec::with_capacity(outcols.len());
        for name in &outcols {
            let stream = match (&pick, name == NROW_COLUMN) {
                (RowPick::Range { start, stop, step }, false) => {
                    let col = self.col(name)?;
                    CellStream::Range(ColumnStore::iter_range(
                        &col, *start, *stop, *step, opts.limit, opts.skip,
                    ))
                }
                (RowPick::Range { start, stop, step }, true) => CellStream::RangePos(
                    RangePosCursor::new(*start, *stop, *step, opts.limit, opts.skip),
                ),
                (RowPick::Mask(mask), false) => {
                    let col = self.col(name)?;
                    CellStream::Mask(ColumnStore::iter_mask(
                        &col,
                        mask.clone(),
                        opts.limit,
                        opts.skip,
                    )?)
                }
                (RowPick::Mask(mask), true) => {
                    CellStream::MaskPos(MaskPosCursor::new(mask.clone(), opts.limit, opts.skip))
                }
            };
            streams.push(stream);
        }
        Ok(RowIter::new(schema, streams))
    }
}
