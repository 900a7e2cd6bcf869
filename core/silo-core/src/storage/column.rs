//! Chunked, compressed column sequences.
//!
//! A `ColumnStore` holds one column as a run of sealed chunks (each exactly
//! `chunklen` rows, compressed) plus an uncompressed in-memory tail of fewer
//! than `chunklen` cells. Appends fill the tail and seal it into a chunk
//! whenever it reaches `chunklen`; bulk appends seal full chunks straight
//! from array slices. Reads decode whole chunks and keep recently decoded
//! arrays in a small LRU cache.
//!
//! Disk-backed columns live in their own directory: one payload file per
//! chunk (written at seal time), `meta.json` and `tail.ipc` written on
//! [`ColumnStore::flush`].

use crate::error::{SiloError, SiloResult};
use crate::storage::chunk::{Chunk, chunk_path};
use crate::storage::compression::CompressionParams;
use crate::storage::ipc::{read_ipc_array, write_ipc_array};
use crate::storage::value::{
    CellValue, adapt_array, array_to_cells, cells_to_array, dtype_from_string, dtype_matches,
    dtype_to_string, empty_array, ensure_supported, repeat_cell,
};
use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::{concat, filter};
use arrow::datatypes::DataType;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Rows per sealed chunk unless overridden.
pub const DEFAULT_CHUNK_ROWS: usize = 4096;

/// Decoded chunks kept hot per column.
const DECODED_CACHE_CHUNKS: NonZeroUsize = NonZeroUsize::new(16).unwrap();

const META_FILE: &str = "meta.json";
const TAIL_FILE: &str = "tail.ipc";

/// Shared handle to a column; projected tables alias columns through this.
pub type SharedColumn = Arc<RwLock<ColumnStore>>;

/// Wrap a store into the shared handle form.
pub fn shared(store: ColumnStore) -> SharedColumn {
    Arc::new(RwLock::new(store))
}

/// Construction options for a single column.
#[derive(Debug, Clone)]
pub struct ColumnOptions {
    pub rootdir: Option<PathBuf>,
    pub cparams: CompressionParams,
    pub chunklen: usize,
    pub read_only: bool,
}

impl Default for ColumnOptions {
    fn default() -> Self {
        Self {
            rootdir: None,
            cparams: CompressionParams::default(),
            chunklen: DEFAULT_CHUNK_ROWS,
            read_only: false,
        }
    }
}

impl ColumnOptions {
    pub fn with_rootdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rootdir = Some(dir.into());
        self
    }

    pub fn with_cparams(mut self, cparams: CompressionParams) -> Self {
        self.cparams = cparams;
        self
    }

    pub fn with_chunklen(mut self, chunklen: usize) -> Self {
        self.chunklen = chunklen;
        self
    }
}

/// Column metadata persisted as `meta.json`.
#[derive(Serialize, Deserialize)]
struct ColumnMeta {
    dtype: String,
    rows: usize,
    chunklen: usize,
    cparams: CompressionParams,
    chunks: Vec<ChunkMeta>,
}

#[derive(Serialize, Deserialize)]
struct ChunkMeta {
    nbytes: usize,
    cbytes: usize,
}

/// One column: sealed chunks + tail + decoded-chunk cache.
#[derive(Debug)]
pub struct ColumnStore {
    dtype: DataType,
    chunklen: usize,
    cparams: CompressionParams,
    rootdir: Option<PathBuf>,
    read_only: bool,
    chunks: Vec<Chunk>,
    tail: Vec<CellValue>,
    cache: Mutex<LruCache<usize, ArrayRef>>,
}

impl ColumnStore {
    /// Create an empty column.
    ///
    /// With a rootdir the directory must not already exist; it is created
    /// here and owned by this column from then on.
    pub fn new(dtype: DataType, opts: ColumnOptions) -> SiloResult<Self> {
        ensure_supported(&dtype)?;
        if opts.chunklen == 0 {
            return Err(SiloError::Validation("chunklen must be positive".to_string()));
        }
        if let Some(dir) = &opts.rootdir {
            if dir.exists() {
                return Err(SiloError::RootDirExists(dir.display().to_string()));
            }
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            dtype,
            chunklen: opts.chunklen,
            cparams: opts.cparams,
            rootdir: opts.rootdir,
            read_only: opts.read_only,
            chunks: Vec::new(),
            tail: Vec::new(),
            cache: Mutex::new(LruCache::new(DECODED_CACHE_CHUNKS)),
        })
    }

    /// Create a column and fill it from an array.
    pub fn from_array(array: &ArrayRef, opts: ColumnOptions) -> SiloResult<Self> {
        let mut store = Self::new(array.data_type().clone(), opts)?;
        store.append(array)?;
        Ok(store)
    }

    /// Reopen a persisted column from its directory.
    pub fn open(dir: impl Into<PathBuf>, read_only: bool) -> SiloResult<Self> {
        let dir = dir.into();
        let meta_path = dir.join(META_FILE);
        if !meta_path.is_file() {
            return Err(SiloError::RootDirMissing(dir.display().to_string()));
        }
        let meta: ColumnMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
        let dtype = dtype_from_string(&meta.dtype)?;
        ensure_supported(&dtype)?;
        if meta.chunklen == 0 {
            return Err(SiloError::Storage(format!(
                "column at '{}' has zero chunklen",
                dir.display()
            )));
        }

        let chunks: Vec<Chunk> = meta
            .chunks
            .iter()
            .enumerate()
            .map(|(i, c)| Chunk::attach(chunk_path(&dir, i), meta.chunklen, c.nbytes, c.cbytes))
            .collect();

        let tail_path = dir.join(TAIL_FILE);
        let tail = if tail_path.is_file() {
            let array = read_ipc_array(&fs::read(&tail_path)?)?;
            array_to_cells(&array)?
        } else {
            Vec::new()
        };

        let total = chunks.len() * meta.chunklen + tail.len();
        if total != meta.rows {
            return Err(SiloError::Storage(format!(
                "column at '{}' holds {total} rows, metadata says {}",
                dir.display(),
                meta.rows
            )));
        }

        Ok(Self {
            dtype,
            chunklen: meta.chunklen,
            cparams: meta.cparams,
            rootdir: Some(dir),
            read_only,
            chunks,
            tail,
            cache: Mutex::new(LruCache::new(DECODED_CACHE_CHUNKS)),
        })
    }

    // ════════════════════════════ Accessors ════════════════════════════

    pub fn dtype(&self) -> &DataType {
        &self.dtype
    }

    pub fn chunklen(&self) -> usize {
        self.chunklen
    }

    pub fn cparams(&self) -> CompressionParams {
        self.cparams
    }

    pub fn rootdir(&self) -> Option<&Path> {
        self.rootdir.as_deref()
    }

    pub fn len(&self) -> usize {
        self.chunks.len() * self.chunklen + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nchunks(&self) -> usize {
        self.chunks.len()
    }

    /// Rows held by sealed chunks (everything before the tail).
    pub fn sealed_rows(&self) -> usize {
        self.chunks.len() * self.chunklen
    }

    /// Logical size: uncompressed payload bytes plus the tail estimate.
    pub fn nbytes(&self) -> usize {
        self.chunks.iter().map(Chunk::nbytes).sum::<usize>() + self.tail_bytes()
    }

    /// Stored size: compressed payload bytes; the tail counts uncompressed.
    pub fn cbytes(&self) -> usize {
        self.chunks.iter().map(Chunk::cbytes).sum::<usize>() + self.tail_bytes()
    }

    fn tail_bytes(&self) -> usize {
        self.tail.iter().map(cell_bytes).sum()
    }

    /// Decoded chunks currently cached.
    pub fn cached_chunks(&self) -> usize {
        self.cache.lock().len()
    }

    fn ensure_writable(&self) -> SiloResult<()> {
        if self.read_only {
            return Err(SiloError::ReadOnly);
        }
        Ok(())
    }

    // ════════════════════════════ Writes ════════════════════════════

    /// Append an array, adapting its dtype to the column's.
    pub fn append(&mut self, array: &ArrayRef) -> SiloResult<()> {
        self.ensure_writable()?;
        let array = adapt_array(array, &self.dtype)?;

        let mut offset = 0;
        while offset < array.len() {
            let remaining = array.len() - offset;
            if self.tail.is_empty() && remaining >= self.chunklen {
                // Seal straight from the slice, no per-cell detour.
                let slice = array.slice(offset, self.chunklen);
                self.seal_chunk(&slice)?;
                offset += self.chunklen;
            } else {
                let take = (self.chunklen - self.tail.len()).min(remaining);
                for i in offset..offset + take {
                    self.tail.push(CellValue::from_array(&array, i)?);
                }
                offset += take;
                if self.tail.len() == self.chunklen {
                    self.seal_tail()?;
                }
            }
        }
        Ok(())
    }

    /// Append a single cell.
    pub fn push(&mut self, cell: CellValue) -> SiloResult<()> {
        self.ensure_writable()?;
        let cell = self.coerce_cell(cell)?;
        self.tail.push(cell);
        if self.tail.len() == self.chunklen {
            self.seal_tail()?;
        }
        Ok(())
    }

    fn seal_tail(&mut self) -> SiloResult<()> {
        let array = cells_to_array(&self.dtype, &self.tail)?;
        self.tail.clear();
        self.seal_chunk(&array)
    }

    fn seal_chunk(&mut self, array: &ArrayRef) -> SiloResult<()> {
        let idx = self.chunks.len();
        let dest = self.rootdir.as_ref().map(|d| chunk_path(d, idx));
        let chunk = Chunk::seal(array, &self.cparams, dest)?;
        debug!(idx, rows = chunk.rows(), cbytes = chunk.cbytes(), "sealed chunk");
        self.chunks.push(chunk);
        Ok(())
    }

    /// Overwrite one cell.
    pub fn set(&mut self, row: usize, cell: CellValue) -> SiloResult<()> {
        self.update_rows(&[(row, cell)])
    }

    /// Overwrite a set of cells, re-sealing each touched chunk once. Rows
    /// and cells are validated before anything is written.
    pub fn update_rows(&mut self, updates: &[(usize, CellValue)]) -> SiloResult<()> {
        self.ensure_writable()?;
        let len = self.len();
        let sealed = self.sealed_rows();

        let mut tail_patches: Vec<(usize, CellValue)> = Vec::new();
        let mut by_chunk: BTreeMap<usize, Vec<(usize, CellValue)>> = BTreeMap::new();
        for (row, cell) in updates {
            if *row >= len {
                return Err(SiloError::Index(format!(
                    "row {row} out of range for column of {len} rows"
                )));
            }
            let cell = self.coerce_cell(cell.clone())?;
            if *row < sealed {
                by_chunk
                    .entry(row / self.chunklen)
                    .or_default()
                    .push((row % self.chunklen, cell));
            } else {
                tail_patches.push((row - sealed, cell));
            }
        }

        for (offset, cell) in tail_patches {
            self.tail[offset] = cell;
        }

        for (idx, patches) in by_chunk {
            let array = self.decode_chunk(idx)?;
            let mut cells = array_to_cells(&array)?;
            for (offset, cell) in patches {
                cells[offset] = cell;
            }
            let rebuilt = cells_to_array(&self.dtype, &cells)?;
            let dest = self.rootdir.as_ref().map(|d| chunk_path(d, idx));
            self.chunks[idx] = Chunk::seal(&rebuilt, &self.cparams, dest)?;
            self.cache.lock().pop(&idx);
        }
        Ok(())
    }

    /// Remove the last `n` rows. Removing more rows than the column holds
    /// is an error and leaves the column untouched.
    pub fn trim(&mut self, n: usize) -> SiloResult<()> {
        self.ensure_writable()?;
        let len = self.len();
        if n > len {
            return Err(SiloError::Validation(format!(
                "cannot trim {n} rows from a column of {len} rows"
            )));
        }

        let mut left = n;
        let from_tail = left.min(self.tail.len());
        self.tail.truncate(self.tail.len() - from_tail);
        left -= from_tail;

        while left >= self.chunklen {
            if let Some(chunk) = self.chunks.pop() {
                self.cache.lock().pop(&self.chunks.len());
                chunk.remove_file()?;
            }
            left -= self.chunklen;
        }

        if left > 0 {
            // A partially trimmed chunk reopens as the new tail.
            let idx = self.chunks.len() - 1;
            let array = self.decode_chunk(idx)?;
            let mut cells = array_to_cells(&array)?;
            cells.truncate(self.chunklen - left);
            if let Some(chunk) = self.chunks.pop() {
                self.cache.lock().pop(&idx);
                chunk.remove_file()?;
            }
            self.tail = cells;
        }
        Ok(())
    }

    /// Replace the whole content in place, keeping dtype, chunking and
    /// compression settings. The incoming array must match the current
    /// length. Shared handles observe the new content.
    pub fn overwrite(&mut self, array: &ArrayRef) -> SiloResult<()> {
        self.ensure_writable()?;
        let len = self.len();
        if array.len() != len {
            return Err(SiloError::Validation(format!(
                "replacement has {} rows, column has {len}",
                array.len()
            )));
        }
        // Validate the cast before clearing.
        let array = adapt_array(array, &self.dtype)?;
        self.trim(len)?;
        self.append(&array)
    }

    /// Grow with the dtype's fill value or shrink via [`ColumnStore::trim`].
    pub fn resize(&mut self, n: usize) -> SiloResult<()> {
        let len = self.len();
        if n < len {
            self.trim(len - n)
        } else if n > len {
            let fill = CellValue::fill_for(&self.dtype)?;
            let filler = repeat_cell(&self.dtype, &fill, n - len)?;
            self.append(&filler)
        } else {
            Ok(())
        }
    }

    fn coerce_cell(&self, cell: CellValue) -> SiloResult<CellValue> {
        if cell.is_null() {
            return Err(SiloError::Validation(
                "null cell; columns do not hold nulls".to_string(),
            ));
        }
        if dtype_matches(&cell.data_type(), &self.dtype) {
            return Ok(cell);
        }
        let one = cells_to_array(&cell.data_type(), std::slice::from_ref(&cell))?;
        let adapted = adapt_array(&one, &self.dtype)?;
        CellValue::from_array(&adapted, 0)
    }

    // ════════════════════════════ Reads ════════════════════════════

    /// Read one cell.
    pub fn get(&self, row: usize) -> SiloResult<CellValue> {
        let len = self.len();
        if row >= len {
            return Err(SiloError::Index(format!(
                "row {row} out of range for column of {len} rows"
            )));
        }
        let sealed = self.sealed_rows();
        if row < sealed {
            let array = self.decode_chunk(row / self.chunklen)?;
            CellValue::from_array(&array, row % self.chunklen)
        } else {
            Ok(self.tail[row - sealed].clone())
        }
    }

    pub(crate) fn tail_cell(&self, offset: usize) -> SiloResult<CellValue> {
        self.tail.get(offset).cloned().ok_or_else(|| {
            SiloError::Index(format!("tail offset {offset} out of range"))
        })
    }

    /// Decode the chunk at `idx`, going through the LRU cache.
    pub(crate) fn decode_chunk(&self, idx: usize) -> SiloResult<ArrayRef> {
        if let Some(array) = self.cache.lock().get(&idx) {
            return Ok(Arc::clone(array));
        }
        let array = self.chunks[idx].decode(&self.cparams)?;
        self.cache.lock().put(idx, Arc::clone(&array));
        Ok(array)
    }

    /// Materialize `[start, stop)` as one array.
    pub fn materialize_range(&self, start: usize, stop: usize) -> SiloResult<ArrayRef> {
        let stop = stop.min(self.len());
        if start >= stop {
            return empty_array(&self.dtype);
        }

        let mut pieces: Vec<ArrayRef> = Vec::new();
        let sealed = self.sealed_rows();

        let mut pos = start;
        while pos < stop.min(sealed) {
            let idx = pos / self.chunklen;
            let chunk_start = idx * self.chunklen;
            let lo = pos - chunk_start;
            let hi = (stop - chunk_start).min(self.chunklen);
            let array = self.decode_chunk(idx)?;
            pieces.push(array.slice(lo, hi - lo));
            pos = chunk_start + hi;
        }

        if stop > sealed {
            let lo = start.max(sealed) - sealed;
            let hi = stop - sealed;
            pieces.push(cells_to_array(&self.dtype, &self.tail[lo..hi])?);
        }

        if pieces.len() == 1 {
            return Ok(pieces.remove(0));
        }
        let refs: Vec<&dyn Array> = pieces.iter().map(|a| a.as_ref()).collect();
        Ok(concat(&refs)?)
    }

    /// The whole column as one array.
    pub fn to_array(&self) -> SiloResult<ArrayRef> {
        self.materialize_range(0, self.len())
    }

    /// Gather rows at explicit positions, preserving order and duplicates.
    pub fn gather(&self, rows: &[usize]) -> SiloResult<ArrayRef> {
        let mut cells = Vec::with_capacity(rows.len());
        for &row in rows {
            cells.push(self.get(row)?);
        }
        cells_to_array(&self.dtype, &cells)
    }

    /// Keep rows where the mask is true. The mask must cover the whole
    /// column exactly.
    pub fn filter_mask(&self, mask: &BooleanArray) -> SiloResult<ArrayRef> {
        let len = self.len();
        if mask.len() != len {
            return Err(SiloError::Validation(format!(
                "boolean mask has {} rows, column has {len}",
                mask.len()
            )));
        }
        if mask.null_count() > 0 {
            return Err(SiloError::Validation(
                "boolean mask carries nulls".to_string(),
            ));
        }

        let mut pieces: Vec<ArrayRef> = Vec::new();
        for idx in 0..self.chunks.len() {
            let array = self.decode_chunk(idx)?;
            let mask_slice = mask.slice(idx * self.chunklen, self.chunklen);
            pieces.push(filter(array.as_ref(), &mask_slice)?);
        }

        let sealed = self.sealed_rows();
        if !self.tail.is_empty() {
            let mut kept = Vec::new();
            for (offset, cell) in self.tail.iter().enumerate() {
                if mask.value(sealed + offset) {
                    kept.push(cell.clone());
                }
            }
            pieces.push(cells_to_array(&self.dtype, &kept)?);
        }

        if pieces.is_empty() {
            return empty_array(&self.dtype);
        }
        if pieces.len() == 1 {
            return Ok(pieces.remove(0));
        }
        let refs: Vec<&dyn Array> = pieces.iter().map(|a| a.as_ref()).collect();
        Ok(concat(&refs)?)
    }

    // ════════════════════════════ Persistence ════════════════════════════

    /// Persist metadata and the tail. Sealed chunk payloads are already on
    /// disk; skipping flush risks losing only the buffered tail and the
    /// row-count update.
    pub fn flush(&self) -> SiloResult<()> {
        let Some(dir) = &self.rootdir else {
            return Ok(());
        };

        let tail_path = dir.join(TAIL_FILE);
        if self.tail.is_empty() {
            remove_if_present(&tail_path)?;
        } else {
            let array = cells_to_array(&self.dtype, &self.tail)?;
            write_atomic(&tail_path, &write_ipc_array(&array)?)?;
        }

        let meta = ColumnMeta {
            dtype: dtype_to_string(&self.dtype),
            rows: self.len(),
            chunklen: self.chunklen,
            cparams: self.cparams,
            chunks: self
                .chunks
                .iter()
                .map(|c| ChunkMeta {
                    nbytes: c.nbytes(),
                    cbytes: c.cbytes(),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&meta)?;
        write_atomic(&dir.join(META_FILE), json.as_bytes())?;
        debug!(rows = meta.rows, nchunks = meta.chunks.len(), "flushed column meta");
        Ok(())
    }

    /// Drop every cached decoded chunk.
    pub fn free_cachemem(&self) {
        self.cache.lock().clear();
    }

    /// Deep copy into a fresh store (re-chunked and re-compressed under the
    /// destination options).
    pub fn copy(&self, opts: ColumnOptions) -> SiloResult<ColumnStore> {
        let mut dest = ColumnStore::new(self.dtype.clone(), opts)?;
        for idx in 0..self.chunks.len() {
            let array = self.decode_chunk(idx)?;
            dest.append(&array)?;
        }
        if !self.tail.is_empty() {
            let array = cells_to_array(&self.dtype, &self.tail)?;
            dest.append(&array)?;
        }
        dest.flush()?;
        Ok(dest)
    }

    /// Delete the column's on-disk data.
    pub fn purge(&self) -> SiloResult<()> {
        if let Some(dir) = &self.rootdir {
            if dir.exists() {
                fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }

    // ════════════════════════════ Cursors ════════════════════════════

    /// Cell cursor over `[start, stop)` with stride `step`, skipping the
    /// first `skip` positions and yielding at most `limit`.
    pub fn iter_range(
        col: &SharedColumn,
        start: usize,
        stop: usize,
        step: usize,
        limit: Option<usize>,
        skip: usize,
    ) -> RangeCursor {
        RangeCursor {
            col: Arc::clone(col),
            next: start.saturating_add(skip.saturating_mul(step)),
            stop,
            step: step.max(1),
            remaining: limit,
            chunk: None,
        }
    }

    /// Cell cursor over mask-true positions with skip/limit accounting.
    /// The mask must cover the whole column exactly.
    pub fn iter_mask(
        col: &SharedColumn,
        mask: BooleanArray,
        limit: Option<usize>,
        skip: usize,
    ) -> SiloResult<MaskCursor> {
        {
            let store = col.read();
            if mask.len() != store.len() {
                return Err(SiloError::Validation(format!(
                    "boolean mask has {} rows, column has {}",
                    mask.len(),
                    store.len()
                )));
            }
            if mask.null_count() > 0 {
                return Err(SiloError::Validation(
                    "boolean mask carries nulls".to_string(),
                ));
            }
        }
        Ok(MaskCursor {
            col: Arc::clone(col),
            mask,
            pos: 0,
            to_skip: skip,
            remaining: limit,
            chunk: None,
        })
    }
}

fn cell_bytes(cell: &CellValue) -> usize {
    match cell {
        CellValue::Null => 0,
        CellValue::Boolean(_) => 1,
        CellValue::Int32(_) => 4,
        CellValue::Int64(_) | CellValue::Float64(_) => 8,
        CellValue::Utf8(s) => s.len(),
        CellValue::FixedList(vs) => vs.iter().map(cell_bytes).sum(),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> SiloResult<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> SiloResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Read the cell at `pos`, keeping the last decoded chunk cursor-local.
fn read_cell(
    col: &SharedColumn,
    chunk: &mut Option<(usize, ArrayRef)>,
    pos: usize,
) -> SiloResult<CellValue> {
    let store = col.read();
    let sealed = store.sealed_rows();
    if pos < sealed {
        let idx = pos / store.chunklen;
        let array = match chunk {
            Some((i, a)) if *i == idx => Arc::clone(a),
            _ => {
                let a = store.decode_chunk(idx)?;
                *chunk = Some((idx, Arc::clone(&a)));
                a
            }
        };
        CellValue::from_array(&array, pos % store.chunklen)
    } else {
        store.tail_cell(pos - sealed)
    }
}

/// Strided positional cell cursor.
pub struct RangeCursor {
    col: SharedColumn,
    next: usize,
    stop: usize,
    step: usize,
    remaining: Option<usize>,
    chunk: Option<(usize, ArrayRef)>,
}

impl Iterator for RangeCursor {
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
        Some(read_cell(&self.col, &mut self.chunk, pos))
    }
}

/// Mask-driven cell cursor; limit and skip count matches, not positions.
pub struct MaskCursor {
    col: SharedColumn,
    mask: BooleanArray,
    pos: usize,
    to_skip: usize,
    remaining: Option<usize>,
    chunk: Option<(usize, ArrayRef)>,
}

impl Iterator for MaskCursor {
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
            return Some(read_cell(&self.col, &mut self.chunk, pos));
        }
    }
}
