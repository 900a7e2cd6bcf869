//! Structural mutation: append, trim, resize, addcol, delcol, copy.
//!
//! Every operation here validates completely before touching any column.
//! Append runs in two phases: phase 1 resolves and type-adapts the input
//! against the registry without writing; phase 2 applies per column and
//! bumps the row count. A failed phase 1 leaves the table exactly as it
//! was.

use crate::error::{SiloError, SiloResult};
use crate::query::Row;
use crate::storage::{ColumnOptions, ColumnStore, CompressionParams, shared};
use crate::table::registry::validate_column_name;
use crate::table::{Mode, Table, TableOptions};
use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// The row shapes [`Table::append`] and [`Table::set`] accept.
pub enum RowGroup {
    /// One array per table column, in registry order.
    Columns(Vec<ArrayRef>),
    /// A batch matched to the table by field name; extra fields are
    /// ignored, missing ones error.
    Batch(RecordBatch),
    /// A single composite row matched by name.
    Record(Row),
}

impl From<Vec<ArrayRef>> for RowGroup {
    fn from(arrays: Vec<ArrayRef>) -> Self {
        RowGroup::Columns(arrays)
    }
}

impl From<RecordBatch> for RowGroup {
    fn from(batch: RecordBatch) -> Self {
        RowGroup::Batch(batch)
    }
}

impl From<Row> for RowGroup {
    fn from(row: Row) -> Self {
        RowGroup::Record(row)
    }
}

/// Column input for [`Table::addcol`].
pub enum ColumnInput {
    Array(ArrayRef),
    Store(ColumnStore),
}

impl From<ArrayRef> for ColumnInput {
    fn from(array: ArrayRef) -> Self {
        ColumnInput::Array(array)
    }
}

impl From<ColumnStore> for ColumnInput {
    fn from(store: ColumnStore) -> Self {
        ColumnInput::Store(store)
    }
}

/// Placement and materialization options for [`Table::addcol`].
#[derive(Default)]
pub struct AddCol {
    /// Column name; defaults to `f{pos}`.
    pub name: Option<String>,
    /// Insertion position; defaults to the end.
    pub pos: Option<usize>,
    /// Relocate a disk-backed store instead of copying it.
    pub move_data: bool,
    /// Compression for a freshly materialized column; defaults to the
    /// table's.
    pub cparams: Option<CompressionParams>,
}

impl AddCol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_pos(mut self, pos: usize) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn with_move_data(mut self, move_data: bool) -> Self {
        self.move_data = move_data;
        self
    }

    pub fn with_cparams(mut self, cparams: CompressionParams) -> Self {
        self.cparams = Some(cparams);
        self
    }
}

/// Which column [`Table::delcol`] removes. Name and position are
/// structurally exclusive.
pub enum ColRef {
    Name(String),
    Pos(usize),
}

impl From<&str> for ColRef {
    fn from(name: &str) -> Self {
        ColRef::Name(name.to_string())
    }
}

impl From<String> for ColRef {
    fn from(name: String) -> Self {
        ColRef::Name(name)
    }
}

impl From<usize> for ColRef {
    fn from(pos: usize) -> Self {
        ColRef::Pos(pos)
    }
}

impl Table {
    // ════════════════════════════ Append ════════════════════════════

    /// Append rows; returns the new row count.
    ///
    /// Phase 1 resolves the input against the registry and type-adapts
    /// every array; phase 2 applies. Nothing is written until the whole
    /// input has validated.
    pub fn append(&mut self, rows: impl Into<RowGroup>) -> SiloResult<usize> {
        self.ensure_writable()?;
        if self.cols.is_empty() {
            return Err(SiloError::NoColumns);
        }

        let (arrays, rows_in) = self.resolve_rows(rows.into())?;

        for ((_, col), array) in self.cols.iter().zip(&arrays) {
            col.write().append(array)?;
        }
        self.maybe_flush()?;
        debug!(rows_in, total = self.len(), "appended rows");
        Ok(self.len())
    }

    /// Append another table, projected onto this table's column names.
    pub fn append_table(&mut self, other: &Table) -> SiloResult<usize> {
        self.ensure_writable()?;
        if self.cols.is_empty() {
            return Err(SiloError::NoColumns);
        }
        let mut arrays = Vec::with_capacity(self.ncols());
        for name in self.names() {
            let col = other.col(name)?;
            let array = col.read().to_array()?;
            arrays.push(array);
        }
        self.append(RowGroup::Columns(arrays))
    }

    /// Phase 1: per-column arrays aligned with registry order, plus the
    /// agreed row count. Read-only with respect to the table.
    pub(super) fn resolve_rows(&self, rows: RowGroup) -> SiloResult<(Vec<ArrayRef>, usize)> {
        use crate::storage::value::{adapt_array, cells_to_array};

        match rows {
            RowGroup::Columns(arrays) => {
                if arrays.len() != self.ncols() {
                    return Err(SiloError::Validation(format!(
                        "{} arrays given for {} columns",
                        arrays.len(),
                        self.ncols()
                    )));
                }
                let rows_in = arrays.first().map_or(0, |a| a.len());
                if let Some(odd) = arrays.iter().find(|a| a.len() != rows_in) {
                    return Err(SiloError::Validation(format!(
                        "appended column lengths differ: {rows_in} vs {}",
                        odd.len()
                    )));
                }
                let adapted = self
                    .cols
                    .iter()
                    .zip(&arrays)
                    .map(|((_, col), array)| adapt_array(array, col.read().dtype()))
                    .collect::<SiloResult<Vec<_>>>()?;
                Ok((adapted, rows_in))
            }
            RowGroup::Batch(batch) => {
                let rows_in = batch.num_rows();
                let mut adapted = Vec::with_capacity(self.ncols());
                for (name, col) in self.cols.iter() {
                    let array = batch.column_by_name(name).ok_or_else(|| {
                        SiloError::Validation(format!("appended batch is missing column '{name}'"))
                    })?;
                    adapted.push(adapt_array(array, col.read().dtype())?);
                }
                Ok((adapted, rows_in))
            }
            RowGroup::Record(row) => {
                let mut adapted = Vec::with_capacity(self.ncols());
                for (name, col) in self.cols.iter() {
                    let cell = row.get(name).ok_or_else(|| {
                        SiloError::Validation(format!("appended record is missing column '{name}'"))
                    })?;
                    let one = cells_to_array(&cell.data_type(), std::slice::from_ref(cell))?;
                    adapted.push(adapt_array(&one, col.read().dtype())?);
                }
                Ok((adapted, 1))
            }
        }
    }

    // ════════════════════════════ Trim / resize ════════════════════════════

    /// Remove the last `n` rows from every column. Removing more rows
    /// than the table holds is an error and leaves the table untouched.
    pub fn trim(&mut self, n: usize) -> SiloResult<()> {
        self.ensure_writable()?;
        if self.cols.is_empty() {
            return Err(SiloError::NoColumns);
        }
        if n > self.len() {
            return Err(SiloError::Validation(format!(
                "cannot trim {n} rows from a table of {} rows",
                self.len()
            )));
        }
        for (_, col) in self.cols.iter() {
            col.write().trim(n)?;
        }
        self.maybe_flush()?;
        debug!(trimmed = n, total = self.len(), "trimmed rows");
        Ok(())
    }

    /// Grow every column with its dtype's fill value, or shrink via trim.
    pub fn resize(&mut self, n: usize) -> SiloResult<()> {
        self.ensure_writable()?;
        if self.cols.is_empty() {
            return Err(SiloError::NoColumns);
        }
        for (_, col) in self.cols.iter() {
            col.write().resize(n)?;
        }
        self.maybe_flush()
    }

    // ════════════════════════════ Addcol / delcol ════════════════════════════

    /// Add a column. The data length must equal the table's row count;
    /// an empty table adopts the incoming length.
    pub fn addcol(&mut self, data: impl Into<ColumnInput>, mut spec: AddCol) -> SiloResult<()> {
        self.ensure_writable()?;
        let data = data.into();

        let pos = spec.pos.unwrap_or(self.ncols());
        if pos > self.ncols() {
            return Err(SiloError::Validation(format!(
                "position {pos} out of range for {} columns",
                self.ncols()
            )));
        }
        let name = spec.name.take().unwrap_or_else(|| format!("f{pos}"));
        validate_column_name(&name)?;
        if self.cols.contains(&name) {
            return Err(SiloError::ColumnExists(name));
        }

        let incoming_len = match &data {
            ColumnInput::Array(array) => array.len(),
            ColumnInput::Store(store) => store.len(),
        };
        if !self.cols.is_empty() && incoming_len != self.len() {
            return Err(SiloError::Validation(format!(
                "new column has {incoming_len} rows, table has {}",
                self.len()
            )));
        }

        let store = self.materialize_addcol(data, &name, &spec)?;
        self.cols.insert_at(pos, name.clone(), shared(store))?;
        self.rebuild_schema();
        self.maybe_flush()?;
        info!(name = %name, pos, "added column");
        Ok(())
    }

    fn materialize_addcol(
        &self,
        data: ColumnInput,
        name: &str,
        spec: &AddCol,
    ) -> SiloResult<ColumnStore> {
        let mut opts = self.column_options(name);
        if let Some(cparams) = spec.cparams {
            opts.cparams = cparams;
        }

        match data {
            ColumnInput::Array(array) => ColumnStore::from_array(&array, opts),
            ColumnInput::Store(store) => {
                let target = self.rootdir.as_ref().map(|d| d.join(name));
                match (&target, store.rootdir(), spec.move_data) {
                    (Some(target), Some(src), true) => {
                        // Relocate the column directory; fall back to
                        // copy + purge when rename cannot cross devices.
                        store.flush()?;
                        let src = src.to_path_buf();
                        match fs::rename(&src, target) {
                            Ok(()) => ColumnStore::open(target, false),
                            Err(e) => {
                                warn!(error = %e, "rename failed, copying column instead");
                                let copy_opts = ColumnOptions {
                                    rootdir: Some(target.clone()),
                                    cparams: store.cparams(),
                                    chunklen: store.chunklen(),
                                    read_only: false,
                                };
                                let copied = store.copy(copy_opts)?;
                                store.purge()?;
                                Ok(copied)
                            }
                        }
                    }
                    (Some(target), _, _) => {
                        // Copied stores keep their own geometry.
                        let copy_opts = ColumnOptions {
                            rootdir: Some(target.clone()),
                            cparams: store.cparams(),
                            chunklen: store.chunklen(),
                            read_only: false,
                        };
                        store.copy(copy_opts)
                    }
                    (None, _, _) => Ok(store),
                }
            }
        }
    }

    /// Remove a column. On-disk data is purged unless `keep` is set.
    pub fn delcol(&mut self, which: impl Into<ColRef>, keep: bool) -> SiloResult<()> {
        self.ensure_writable()?;
        let name = match which.into() {
            ColRef::Name(name) => {
                if !self.cols.contains(&name) {
                    return Err(SiloError::ColumnNotFound(name));
                }
                name
            }
            ColRef::Pos(pos) => self
                .cols
                .name_at(pos)
                .map(str::to_string)
                .ok_or_else(|| {
                    SiloError::Index(format!(
                        "position {pos} out of range for {} columns",
                        self.cols.len()
                    ))
                })?,
        };

        let col = self.cols.remove(&name)?;
        if !keep {
            col.read().purge()?;
        }
        self.rebuild_schema();
        self.maybe_flush()?;
        info!(name = %name, kept = keep, "removed column");
        Ok(())
    }

    // ════════════════════════════ Column replace ════════════════════════════

    /// Replace a column's content in place (length and dtype preserved),
    /// or add it as a new trailing column when the name is free.
    pub fn set_col(&mut self, name: &str, array: &ArrayRef) -> SiloResult<()> {
        self.ensure_writable()?;
        if let Some(col) = self.cols.get(name) {
            col.write().overwrite(array)?;
            self.maybe_flush()
        } else {
            self.addcol(
                ColumnInput::Array(array.clone()),
                AddCol::new().with_name(name),
            )
        }
    }

    // ════════════════════════════ Copy ════════════════════════════

    /// Deep copy into a new table. Columns re-compress under
    /// `opts.cparams`; `opts.chunklen` overrides each column's chunk
    /// geometry when set. Attrs come along. Copying onto the source's
    /// own rootdir is an error.
    pub fn copy(&self, opts: TableOptions) -> SiloResult<Table> {
        if let (Some(src), Some(dst)) = (&self.rootdir, &opts.rootdir) {
            if same_path(src, dst) {
                return Err(SiloError::CopyOntoSelf(src.display().to_string()));
            }
        }
        if let Some(dir) = &opts.rootdir {
            if dir.exists() {
                return Err(SiloError::RootDirExists(dir.display().to_string()));
            }
        }

        let created_root = opts.rootdir.clone();
        match self.copy_inner(opts) {
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

    fn copy_inner(&self, opts: TableOptions) -> SiloResult<Table> {
        use crate::table::attrs::Attrs;
        use crate::table::registry::ColumnRegistry;
        use arrow::datatypes::Schema;
        use std::sync::Arc;

        if let Some(dir) = &opts.rootdir {
            fs::create_dir_all(dir)?;
        }
        let mode = if opts.rootdir.is_some() {
            Mode::Create
        } else {
            Mode::Memory
        };
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

        for (name, col) in self.cols.iter() {
            let store = col.read();
            let copy_opts = ColumnOptions {
                rootdir: table.rootdir.as_ref().map(|d| d.join(name)),
                cparams: opts.cparams,
                chunklen: opts.chunklen.unwrap_or_else(|| store.chunklen()),
                read_only: false,
            };
            let copied = store.copy(copy_opts)?;
            table.cols.push(name, shared(copied))?;
        }

        table.attrs.restore(self.attrs.to_map())?;
        table.rebuild_schema();
        table.flush()?;
        info!(rows = table.len(), cols = table.cols.len(), "copied table");
        Ok(table)
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CellValue;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn two_col_table(n: i64) -> Table {
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from((0..n).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(
                (0..n).map(|i| i as f64).collect::<Vec<_>>(),
            )),
        ];
        Table::from_arrays(
            arrays,
            vec!["a".to_string(), "b".to_string()],
            TableOptions::default().with_chunklen(8),
        )
        .unwrap()
    }

    fn batch_for(n: i64, offset: i64) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Float64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from((offset..offset + n).collect::<Vec<_>>())),
                Arc::new(Float64Array::from(
                    (offset..offset + n).map(|i| i as f64).collect::<Vec<_>>(),
                )),
            ],
        )
        .unwrap()
    }

    #[test]
    fn append_batch_grows_table() {
        let mut table = two_col_table(10);
        let total = table.append(batch_for(5, 10)).unwrap();
        assert_eq!(total, 15);
        assert_eq!(table.len(), 15);
        let col = table.col("a").unwrap();
        assert_eq!(col.read().get(14).unwrap(), CellValue::Int64(14));
    }

    #[test]
    fn append_batch_missing_column_is_rejected_before_writing() {
        let mut table = two_col_table(4);
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let partial =
            RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![9])) as ArrayRef])
                .unwrap();
        assert!(table.append(partial).is_err());
        assert_eq!(table.len(), 4);
        let col = table.col("b").unwrap();
        assert_eq!(col.read().len(), 4);
    }

    #[test]
    fn append_batch_extra_fields_ignored() {
        let mut table = two_col_table(2);
        let schema = Arc::new(Schema::new(vec![
            Field::new("b", DataType::Float64, false),
            Field::new("zzz", DataType::Int64, false),
            Field::new("a", DataType::Int64, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![9.0])) as ArrayRef,
                Arc::new(Int64Array::from(vec![0])) as ArrayRef,
                Arc::new(Int64Array::from(vec![9])) as ArrayRef,
            ],
        )
        .unwrap();
        table.append(batch).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn append_columns_positionally() {
        let mut table = two_col_table(2);
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![7, 8])),
            Arc::new(Float64Array::from(vec![7.0, 8.0])),
        ];
        table.append(arrays).unwrap();
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn append_mismatched_lengths_rejected() {
        let mut table = two_col_table(2);
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![7, 8])),
            Arc::new(Float64Array::from(vec![7.0])),
        ];
        assert!(table.append(arrays).is_err());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn append_table_projects_by_name() {
        let mut table = two_col_table(3);
        // source with reversed column order and an extra column
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from(vec![30.0, 31.0])),
            Arc::new(Int64Array::from(vec![30, 31])),
            Arc::new(Int64Array::from(vec![0, 0])),
        ];
        let other = Table::from_arrays(
            arrays,
            vec!["b".to_string(), "a".to_string(), "extra".to_string()],
            TableOptions::default(),
        )
        .unwrap();
        table.append_table(&other).unwrap();
        assert_eq!(table.len(), 5);
        let col = table.col("a").unwrap();
        assert_eq!(col.read().get(4).unwrap(), CellValue::Int64(31));
    }

    #[test]
    fn trim_underflow_is_rejected() {
        let mut table = two_col_table(5);
        assert!(table.trim(6).is_err());
        assert_eq!(table.len(), 5);
        table.trim(5).unwrap();
        assert_eq!(table.len(), 0);
        assert_eq!(table.ncols(), 2);
    }

    #[test]
    fn resize_fills_and_shrinks() {
        let mut table = two_col_table(3);
        table.resize(6).unwrap();
        assert_eq!(table.len(), 6);
        let col = table.col("b").unwrap();
        assert_eq!(col.read().get(5).unwrap(), CellValue::Float64(0.0));
        table.resize(2).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn addcol_at_position_and_delcol_restores_order() {
        let mut table = two_col_table(3);
        let c: ArrayRef = Arc::new(Int64Array::from(vec![9, 9, 9]));
        table.addcol(c, AddCol::new().with_name("c").with_pos(1)).unwrap();
        assert_eq!(table.names(), &["a", "c", "b"]);
        assert_eq!(table.schema().fields().len(), 3);

        table.delcol("c", false).unwrap();
        assert_eq!(table.names(), &["a", "b"]);
    }

    #[test]
    fn addcol_default_name_comes_from_pos() {
        let mut table = two_col_table(2);
        let c: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        table.addcol(c, AddCol::new()).unwrap();
        assert_eq!(table.names(), &["a", "b", "f2"]);
    }

    #[test]
    fn addcol_wrong_length_rejected() {
        let mut table = two_col_table(3);
        let c: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        assert!(table.addcol(c, AddCol::new()).is_err());
        assert_eq!(table.ncols(), 2);
    }

    #[test]
    fn delcol_by_pos() {
        let mut table = two_col_table(2);
        table.delcol(0usize, false).unwrap();
        assert_eq!(table.names(), &["b"]);
        assert!(table.delcol(5usize, false).is_err());
    }

    #[test]
    fn delcol_last_column_resets_len() {
        let mut table = two_col_table(4);
        table.delcol("a", false).unwrap();
        table.delcol("b", false).unwrap();
        assert_eq!(table.ncols(), 0);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn delcol_purges_disk_data_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("t");
        let mut table = Table::from_batch(
            batch_for(10, 0),
            TableOptions::default().with_rootdir(&root),
        )
        .unwrap();

        let a_dir = root.join("a");
        let b_dir = root.join("b");
        assert!(a_dir.is_dir());

        table.delcol("a", false).unwrap();
        assert!(!a_dir.exists());

        table.delcol("b", true).unwrap();
        assert!(b_dir.is_dir());
    }

    #[test]
    fn addcol_moves_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("t");
        let mut table = Table::from_batch(
            batch_for(3, 0),
            TableOptions::default().with_rootdir(&root),
        )
        .unwrap();

        let loose_dir = dir.path().join("loose");
        let array: ArrayRef = Arc::new(Int64Array::from(vec![5, 6, 7]));
        let store = ColumnStore::from_array(
            &array,
            ColumnOptions::default().with_rootdir(&loose_dir),
        )
        .unwrap();
        store.flush().unwrap();

        table
            .addcol(store, AddCol::new().with_name("c").with_move_data(true))
            .unwrap();
        assert!(!loose_dir.exists());
        assert!(root.join("c").is_dir());
        let col = table.col("c").unwrap();
        assert_eq!(col.read().get(2).unwrap(), CellValue::Int64(7));
    }

    #[test]
    fn set_col_replaces_in_place() {
        let mut table = two_col_table(3);
        let replacement: ArrayRef = Arc::new(Int64Array::from(vec![9, 8, 7]));
        table.set_col("a", &replacement).unwrap();
        let col = table.col("a").unwrap();
        assert_eq!(col.read().get(0).unwrap(), CellValue::Int64(9));

        let wrong_len: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        assert!(table.set_col("a", &wrong_len).is_err());
    }

    #[test]
    fn set_col_adds_when_absent() {
        let mut table = two_col_table(2);
        let fresh: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        table.set_col("c", &fresh).unwrap();
        assert_eq!(table.names(), &["a", "b", "c"]);
    }

    #[test]
    fn copy_to_memory_is_independent() {
        let mut table = two_col_table(5);
        table.attrs_mut().set("k", "v").unwrap();
        let copy = table.copy(TableOptions::default()).unwrap();
        assert_eq!(copy.len(), 5);
        assert_eq!(copy.attrs().get("k"), Some(&serde_json::json!("v")));

        table.trim(2).unwrap();
        assert_eq!(copy.len(), 5);
    }

    #[test]
    fn copy_onto_own_rootdir_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("t");
        let table = Table::from_batch(
            batch_for(3, 0),
            TableOptions::default().with_rootdir(&root),
        )
        .unwrap();
        let err = table.copy(TableOptions::default().with_rootdir(&root));
        assert!(matches!(err, Err(SiloError::CopyOntoSelf(_))));
        // source stays intact
        assert!(root.join("a").is_dir());
    }

    #[test]
    fn copy_to_disk_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let table = two_col_table(20);
        let dest = dir.path().join("copy");
        table
            .copy(TableOptions::default().with_rootdir(&dest))
            .unwrap();

        let reopened = Table::open(&dest, Mode::Append).unwrap();
        assert_eq!(reopened.len(), 20);
        assert_eq!(reopened.names(), &["a", "b"]);
    }

    #[test]
    fn read_only_table_refuses_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("t");
        Table::from_batch(batch_for(3, 0), TableOptions::default().with_rootdir(&root)).unwrap();

        let mut frozen = Table::open(&root, Mode::ReadOnly).unwrap();
        assert!(matches!(
            frozen.append(batch_for(1, 0)),
            Err(SiloError::ReadOnly)
        ));
        assert!(matches!(frozen.trim(1), Err(SiloError::ReadOnly)));
        let c: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
        assert!(matches!(
            frozen.addcol(c, AddCol::new()),
            Err(SiloError::ReadOnly)
        ));
        assert!(matches!(frozen.delcol("a", false), Err(SiloError::ReadOnly)));
    }
}
