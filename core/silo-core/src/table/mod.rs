//! Column tables.
//!
//! A [`Table`] is an ordered set of named, equal-length columns, each a
//! chunked compressed [`ColumnStore`](crate::storage::ColumnStore). The
//! table layer owns identity, ordering and coordination: the registry and
//! manifest, structural mutation, indexed access and the query entry
//! points. Everything chunk-shaped lives below it in [`crate::storage`].

pub mod attrs;
pub mod mutate;
pub mod registry;
pub mod select;

pub use attrs::Attrs;
pub use mutate::{AddCol, ColRef, ColumnInput, RowGroup};
pub use registry::ColumnRegistry;
pub use select::{Selection, Selector, Span};

use crate::error::{SiloError, SiloResult};
use crate::storage::{
    ColumnOptions, ColumnStore, CompressionParams, DEFAULT_CHUNK_ROWS, SharedColumn, shared,
};
use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use rayon::prelude::*;
use registry::validate_column_name;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// How a table came to exist and what it may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Ephemeral, no rootdir.
    Memory,
    /// Fresh on-disk table created by this process.
    Create,
    /// Reopened on-disk table, writable.
    Append,
    /// Reopened on-disk table, mutation refused.
    ReadOnly,
}

impl Mode {
    pub fn writable(&self) -> bool {
        !matches!(self, Mode::ReadOnly)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Memory => write!(f, "memory"),
            Mode::Create => write!(f, "create"),
            Mode::Append => write!(f, "append"),
            Mode::ReadOnly => write!(f, "read-only"),
        }
    }
}

/// Construction options for a table.
#[derive(Debug, Clone, Default)]
pub struct TableOptions {
    pub rootdir: Option<PathBuf>,
    pub cparams: CompressionParams,
    /// Rows per chunk for newly materialized columns; `None` uses
    /// [`DEFAULT_CHUNK_ROWS`].
    pub chunklen: Option<usize>,
    /// Flush after every mutating operation (disk tables only). Defaults
    /// to on; turning it off defers persistence to explicit `flush` calls.
    pub auto_flush: Option<bool>,
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rootdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rootdir = Some(dir.into());
        self
    }

    pub fn with_cparams(mut self, cparams: CompressionParams) -> Self {
        self.cparams = cparams;
        self
    }

    pub fn with_chunklen(mut self, chunklen: usize) -> Self {
        self.chunklen = Some(chunklen);
        self
    }

    pub fn with_auto_flush(mut self, on: bool) -> Self {
        self.auto_flush = Some(on);
        self
    }
}

/// The source shapes [`Table::create`] accepts.
pub enum ColumnSet {
    /// Already-built column stores, adopted as-is in memory or copied
    /// under the table root on disk.
    Stores(Vec<ColumnStore>),
    /// One raw array per column.
    Arrays(Vec<ArrayRef>),
    /// A composite batch; field names become column names.
    Batch(RecordBatch),
}

impl From<RecordBatch> for ColumnSet {
    fn from(batch: RecordBatch) -> Self {
        ColumnSet::Batch(batch)
    }
}

impl From<Vec<ArrayRef>> for ColumnSet {
    fn from(arrays: Vec<ArrayRef>) -> Self {
        ColumnSet::Arrays(arrays)
    }
}

impl From<Vec<ColumnStore>> for ColumnSet {
    fn from(stores: Vec<ColumnStore>) -> Self {
        ColumnSet::Stores(stores)
    }
}

/// Size accounting for a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableStats {
    /// Logical (uncompressed) bytes.
    pub nbytes: usize,
    /// Stored (compressed) bytes.
    pub cbytes: usize,
    /// `nbytes / cbytes`; 0 when nothing is stored.
    pub ratio: f64,
}

/// A column-oriented table over chunked compressed columns.
///
/// The row count is not cached: it reads from the first column, so tables
/// sharing column handles (projections) always agree on it.
#[derive(Debug)]
pub struct Table {
    /// Ordered name → column registry; order is the order of record.
    pub(crate) cols: ColumnRegistry,
    pub(crate) mode: Mode,
    pub(crate) rootdir: Option<PathBuf>,
    /// Compression for newly materialized columns.
    pub(crate) cparams: CompressionParams,
    /// Chunk rows for newly materialized columns.
    pub(crate) chunklen: Option<usize>,
    pub(crate) auto_flush: bool,
    pub(crate) attrs: Attrs,
    /// Cached composite row layout; rebuilt only when the column set
    /// changes, never on row access.
    pub(crate) schema: SchemaRef,
}

impl Table {
    // ════════════════════════════ Construction ════════════════════════════

    /// Create a table from one of the [`ColumnSet`] source shapes.
    ///
    /// `names` overrides the source's own names; with `None`, a batch
    /// contributes its field names and other sources get `f0..f{n-1}`.
    /// With a rootdir the directory must not already exist; a failure
    /// mid-construction removes the partially written root.
    #[instrument(skip(source, names, opts))]
    pub fn create(
        source: impl Into<ColumnSet>,
        names: Option<Vec<String>>,
        opts: TableOptions,
    ) -> SiloResult<Table> {
        let source = source.into();
        if let Some(dir) = &opts.rootdir {
            if dir.exists() {
                return Err(SiloError::RootDirExists(dir.display().to_string()));
            }
        }
        let created_root = opts.rootdir.clone();
        match Self::create_inner(source, names, opts) {
            Ok(table) => Ok(table),
            Err(e) => {
                if let Some(dir) = created_root {
                    if dir.exists() {
                        let _ = fs::remove_dir_all(&dir);
                    }
                }
                Err(e)
            }
        }
    }

    /// Create from a record batch; field names become column names.
    pub fn from_batch(batch: RecordBatch, opts: TableOptions) -> SiloResult<Table> {
        Self::create(ColumnSet::Batch(batch), None, opts)
    }

    /// Create from per-column arrays and names.
    pub fn from_arrays(
        arrays: Vec<ArrayRef>,
        names: Vec<String>,
        opts: TableOptions,
    ) -> SiloResult<Table> {
        Self::create(ColumnSet::Arrays(arrays), Some(names), opts)
    }

    /// Create from existing column stores and names.
    pub fn from_stores(
        stores: Vec<ColumnStore>,
        names: Vec<String>,
        opts: TableOptions,
    ) -> SiloResult<Table> {
        Self::create(ColumnSet::Stores(stores), Some(names), opts)
    }

    fn create_inner(
        source: ColumnSet,
        names: Option<Vec<String>>,
        opts: TableOptions,
    ) -> SiloResult<Table> {
        let (names, source) = resolve_names(source, names)?;
        for name in &names {
            validate_column_name(name)?;
        }
        if let Some(dup) = first_duplicate(&names) {
            return Err(SiloError::ColumnExists(dup.to_string()));
        }

        source_len(&source)?;
        let mode = if opts.rootdir.is_some() {
            Mode::Create
        } else {
            Mode::Memory
        };

        if let Some(dir) = &opts.rootdir {
            fs::create_dir_all(dir)?;
        }

        let attrs = match &opts.rootdir {
            Some(dir) => Attrs::new_disk(dir),
            None => Attrs::new_memory(),
        };

        let mut table = Table {
            cols: ColumnRegistry::new(),
            mode,
            rootdir: opts.rootdir,
            cparams: opts.cparams,
            chunklen: opts.chunklen,
            auto_flush: opts.auto_flush.unwrap_or(true),
            attrs,
            schema: Arc::new(Schema::empty()),
        };

        let stores = table.build_stores(&names, source)?;
        for (name, store) in names.iter().zip(stores) {
            table.cols.push(name.clone(), shared(store))?;
        }
        table.rebuild_schema();
        table.flush()?;

        info!(
            rows = table.len(),
            cols = table.cols.len(),
            mode = %table.mode,
            "created table"
        );
        Ok(table)
    }

    /// Reopen a persisted table. `mode` must be [`Mode::Append`] or
    /// [`Mode::ReadOnly`].
    #[instrument(skip(rootdir))]
    pub fn open(rootdir: impl AsRef<Path>, mode: Mode) -> SiloResult<Table> {
        let rootdir = rootdir.as_ref().to_path_buf();
        if !matches!(mode, Mode::Append | Mode::ReadOnly) {
            return Err(SiloError::Validation(format!(
                "open mode must be append or read-only, got {mode}"
            )));
        }
        info!("opening table at {:?}", rootdir);

        let read_only = mode == Mode::ReadOnly;
        let cols = ColumnRegistry::load(&rootdir, read_only)?;

        let mut first = None;
        for (name, col) in cols.iter() {
            let n = col.read().len();
            match first {
                None => first = Some(n),
                Some(expected) if expected != n => {
                    return Err(SiloError::Storage(format!(
                        "column '{name}' holds {n} rows, others hold {expected}"
                    )));
                }
                Some(_) => {}
            }
        }

        let (cparams, chunklen) = match cols.iter().next() {
            Some((_, col)) => {
                let store = col.read();
                (store.cparams(), Some(store.chunklen()))
            }
            None => (CompressionParams::default(), None),
        };

        let attrs = Attrs::load(&rootdir, read_only)?;
        let mut table = Table {
            cols,
            mode,
            rootdir: Some(rootdir),
            cparams,
            chunklen,
            auto_flush: true,
            attrs,
            schema: Arc::new(Schema::empty()),
        };
        table.rebuild_schema();

        info!(rows = table.len(), cols = table.cols.len(), "opened table");
        Ok(table)
    }

    // ════════════════════════════ Accessors ════════════════════════════

    /// Row count, read from the first column (0 with no columns).
    pub fn len(&self) -> usize {
        match self.cols.iter().next() {
            Some((_, col)) => col.read().len(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column count.
    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    /// Column names in registry order.
    pub fn names(&self) -> &[String] {
        self.cols.names()
    }

    /// The composite row layout.
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Shared handle to one column.
    pub fn col(&self, name: &str) -> SiloResult<SharedColumn> {
        self.cols
            .get(name)
            .cloned()
            .ok_or_else(|| SiloError::ColumnNotFound(name.to_string()))
    }

    /// Dtype of one column.
    pub fn dtype(&self, name: &str) -> SiloResult<arrow::datatypes::DataType> {
        Ok(self.col(name)?.read().dtype().clone())
    }

    pub fn rootdir(&self) -> Option<&Path> {
        self.rootdir.as_deref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cparams(&self) -> CompressionParams {
        self.cparams
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    /// Logical (uncompressed) bytes across all columns.
    pub fn nbytes(&self) -> usize {
        self.cols.iter().map(|(_, c)| c.read().nbytes()).sum()
    }

    /// Stored (compressed) bytes across all columns.
    pub fn cbytes(&self) -> usize {
        self.cols.iter().map(|(_, c)| c.read().cbytes()).sum()
    }

    pub fn stats(&self) -> TableStats {
        let nbytes = self.nbytes();
        let cbytes = self.cbytes();
        let ratio = if cbytes == 0 {
            0.0
        } else {
            nbytes as f64 / cbytes as f64
        };
        TableStats {
            nbytes,
            cbytes,
            ratio,
        }
    }

    // ════════════════════════════ Maintenance ════════════════════════════

    /// Flush every column, the manifest and attrs. No-op for memory
    /// tables. Skipping flush risks losing buffered tails and the latest
    /// row count on crash.
    pub fn flush(&mut self) -> SiloResult<()> {
        if self.rootdir.is_none() {
            return Ok(());
        }
        for (_, col) in self.cols.iter() {
            col.read().flush()?;
        }
        self.cols.persist(self.rootdir.as_deref())?;
        self.attrs.persist()?;
        Ok(())
    }

    /// Release every column's decoded-chunk cache.
    pub fn free_cachemem(&self) {
        for (_, col) in self.cols.iter() {
            col.read().free_cachemem();
        }
    }

    // ════════════════════════════ Internal ════════════════════════════

    pub(crate) fn ensure_writable(&self) -> SiloResult<()> {
        if !self.mode.writable() {
            return Err(SiloError::ReadOnly);
        }
        Ok(())
    }

    pub(crate) fn maybe_flush(&mut self) -> SiloResult<()> {
        if self.auto_flush && self.rootdir.is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Rebuild the cached composite schema after a column-set change.
    pub(crate) fn rebuild_schema(&mut self) {
        let fields: Vec<Field> = self
            .cols
            .iter()
            .map(|(name, col)| Field::new(name, col.read().dtype().clone(), false))
            .collect();
        self.schema = Arc::new(Schema::new(fields));
    }

    pub(crate) fn resolved_chunklen(&self) -> usize {
        self.chunklen.unwrap_or(DEFAULT_CHUNK_ROWS)
    }

    /// Options for a column newly materialized under this table.
    pub(crate) fn column_options(&self, name: &str) -> ColumnOptions {
        ColumnOptions {
            rootdir: self.rootdir.as_ref().map(|d| d.join(name)),
            cparams: self.cparams,
            chunklen: self.resolved_chunklen(),
            read_only: false,
        }
    }

    /// Contiguous rows `[start, stop)` as one batch over all columns.
    pub(crate) fn slice_batch(&self, start: usize, stop: usize) -> SiloResult<RecordBatch> {
        let stop = stop.min(self.len()).max(start);
        if self.cols.is_empty() {
            let options = RecordBatchOptions::new().with_row_count(Some(stop - start));
            return Ok(RecordBatch::try_new_with_options(
                self.schema(),
                vec![],
                &options,
            )?);
        }
        let arrays: Vec<ArrayRef> = self
            .cols
            .iter()
            .map(|(_, col)| col.read().materialize_range(start, stop))
            .collect::<SiloResult<_>>()?;
        Ok(RecordBatch::try_new(self.schema(), arrays)?)
    }

    fn build_stores(&self, names: &[String], source: ColumnSet) -> SiloResult<Vec<ColumnStore>> {
        match source {
            ColumnSet::Stores(stores) => {
                if self.rootdir.is_none() {
                    // Memory table adopts the stores without copying.
                    return Ok(stores);
                }
                names
                    .par_iter()
                    .zip(stores.par_iter())
                    .map(|(name, store)| {
                        // Copied stores keep their own chunk geometry and
                        // compression; only the location changes.
                        let opts = ColumnOptions {
                            rootdir: self.rootdir.as_ref().map(|d| d.join(name)),
                            cparams: store.cparams(),
                            chunklen: store.chunklen(),
                            read_only: false,
                        };
                        store.copy(opts)
                    })
                    .collect()
            }
            ColumnSet::Arrays(arrays) => names
                .par_iter()
                .zip(arrays.par_iter())
                .map(|(name, array)| ColumnStore::from_array(array, self.column_options(name)))
                .collect(),
            ColumnSet::Batch(batch) => {
                let arrays: Vec<ArrayRef> = batch.columns().to_vec();
                names
                    .par_iter()
                    .zip(arrays.par_iter())
                    .map(|(name, array)| ColumnStore::from_array(array, self.column_options(name)))
                    .collect()
            }
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        let len = self.len();
        writeln!(
            f,
            "silo table; rows: {len}, cols: {}, mode: {}",
            self.cols.len(),
            self.mode
        )?;
        if let Some(dir) = &self.rootdir {
            writeln!(f, "  rootdir: {}", dir.display())?;
        }
        writeln!(
            f,
            "  nbytes: {}, cbytes: {}, ratio: {:.2}",
            stats.nbytes, stats.cbytes, stats.ratio
        )?;
        if !self.cols.is_empty() && len > 0 {
            let preview = self
                .slice_batch(0, len.min(8))
                .ok()
                .and_then(|batch| arrow::util::pretty::pretty_format_batches(&[batch]).ok());
            match preview {
                Some(rendered) => write!(f, "{rendered}")?,
                None => write!(f, "  (preview unavailable)")?,
            }
        }
        Ok(())
    }
}

fn resolve_names(
    source: ColumnSet,
    names: Option<Vec<String>>,
) -> SiloResult<(Vec<String>, ColumnSet)> {
    let ncols = match &source {
        ColumnSet::Stores(stores) => stores.len(),
        ColumnSet::Arrays(arrays) => arrays.len(),
        ColumnSet::Batch(batch) => batch.num_columns(),
    };
    let names = match names {
        Some(names) => {
            if names.len() != ncols {
                return Err(SiloError::Validation(format!(
                    "{} names given for {ncols} columns",
                    names.len()
                )));
            }
            names
        }
        None => match &source {
            ColumnSet::Batch(batch) => batch
                .schema()
                .fields()
                .iter()
                .map(|fi| fi.name().clone())
                .collect(),
            _ => (0..ncols).map(|i| format!("f{i}")).collect(),
        },
    };
    Ok((names, source))
}

fn first_duplicate(names: &[String]) -> Option<&str> {
    let mut seen = ahash::AHashSet::new();
    names.iter().find(|n| !seen.insert(n.as_str())).map(|n| n.as_str())
}

fn source_len(source: &ColumnSet) -> SiloResult<usize> {
    let lens: Vec<usize> = match source {
        ColumnSet::Stores(stores) => stores.iter().map(ColumnStore::len).collect(),
        ColumnSet::Arrays(arrays) => arrays.iter().map(|a| a.len()).collect(),
        ColumnSet::Batch(batch) => return Ok(batch.num_rows()),
    };
    let mut lens = lens.into_iter();
    let Some(first) = lens.next() else {
        return Ok(0);
    };
    if let Some(odd) = lens.find(|n| *n != first) {
        return Err(SiloError::Validation(format!(
            "column lengths differ: {first} vs {odd}"
        )));
    }
    Ok(first)
}
