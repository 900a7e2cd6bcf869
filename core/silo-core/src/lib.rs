//! # silo — chunked, compressed column tables
//!
//! silo stores tables column by column. Each column is a chain of
//! fixed-length, individually compressed chunks plus a small mutable
//! tail, held in memory or persisted under a root directory. Appends
//! touch only the tail, scans decompress chunk by chunk through an LRU
//! cache, and string predicates filter tables without materializing
//! them whole.
//!
//! ## Highlights
//!
//! - **Chunked columns** — append-friendly layout, zstd-compressed
//!   chunks, LRU decode cache
//! - **Arrow-native** — columns materialize as arrow arrays; record
//!   batches and Parquet files import and export directly
//! - **String predicates** — `"qty > 4 and price < 3.0"` runs on arrow
//!   compute kernels with explicit name resolution
//! - **Streaming queries** — row and block iterators with output column
//!   selection, limit/skip and virtual row numbers
//! - **Disk persistence** — manifest plus per-column directories,
//!   reopened writable or read-only
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Float64Array, Int64Array};
//! use silo_core::{ScanOpts, Table, TableOptions};
//!
//! # fn main() -> silo_core::SiloResult<()> {
//! let qty: ArrayRef = Arc::new(Int64Array::from(vec![3, 9, 4, 12]));
//! let price: ArrayRef = Arc::new(Float64Array::from(vec![1.5, 0.25, 8.0, 2.0]));
//! let names = Some(vec!["qty".to_string(), "price".to_string()]);
//! let mut orders = Table::create(vec![qty, price], names, TableOptions::new())?;
//!
//! orders.append(vec![
//!     Arc::new(Int64Array::from(vec![5])) as ArrayRef,
//!     Arc::new(Float64Array::from(vec![3.0])) as ArrayRef,
//! ])?;
//!
//! let mut hits = 0;
//! for row in orders.where_rows("qty > 4 and price < 3.0", ScanOpts::new())? {
//!     let row = row?;
//!     assert!(row.get("qty").is_some());
//!     hits += 1;
//! }
//! assert_eq!(hits, 2);
//! # Ok(())
//! # }
//! ```
//!
//! On disk, a table survives the process:
//!
//! ```rust
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Int64Array};
//! use silo_core::{Mode, Table, TableOptions};
//!
//! # fn main() -> silo_core::SiloResult<()> {
//! let dir = tempfile::tempdir()?;
//! let root = dir.path().join("events");
//! {
//!     let ids: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
//!     let mut t = Table::create(
//!         vec![ids],
//!         Some(vec!["id".to_string()]),
//!         TableOptions::new().with_rootdir(&root),
//!     )?;
//!     t.attrs_mut().set("source", "demo")?;
//! }
//! let t = Table::open(&root, Mode::ReadOnly)?;
//! assert_eq!(t.len(), 3);
//! assert_eq!(t.attrs().len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## On-disk layout
//!
//! ```text
//! rootdir/
//! ├── __manifest__.json      column order and table settings
//! ├── __attrs__.json         user attrs
//! └── <column>/
//!     ├── meta.json          dtype, chunk geometry, counts
//!     ├── chunk-00000.blk    sealed compressed chunks
//!     └── tail.ipc           mutable tail, arrow IPC
//! ```
//!
//! ## Modules
//!
//! - [`table`] — the [`Table`]: registry, manifest, mutation, selectors
//! - [`storage`] — chunked column containers and codecs
//! - [`query`] — row/block iteration and predicate scans
//! - [`expr`] — string expression evaluation
//! - [`bridge`] — RecordBatch and Parquet interop
//! - [`error`] — [`SiloError`] / [`SiloResult`]

pub mod bridge;
pub mod error;
pub mod expr;
pub mod query;
pub mod storage;
pub mod table;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use error::{SiloError, SiloResult};
pub use expr::{Binding, Evaluator, Scope, SqlEvaluator};
pub use query::{BlockIter, NROW_COLUMN, Predicate, Row, RowIter, ScanOpts, Tuples};
pub use storage::{
    CellValue, Codec, ColumnOptions, ColumnStore, CompressionParams, DEFAULT_CHUNK_ROWS,
    SharedColumn,
};
pub use table::{
    AddCol, Attrs, ColRef, ColumnInput, ColumnSet, Mode, RowGroup, Selection, Selector, Span,
    Table, TableOptions, TableStats,
};
