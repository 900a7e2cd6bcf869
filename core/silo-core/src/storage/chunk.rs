//! Sealed column chunks.
//!
//! A chunk is one immutable block of a column: the array encoded as Arrow
//! IPC bytes, then run through the column's codec. Memory-backed chunks keep
//! the compressed payload inline; disk-backed chunks write it to a file at
//! seal time and keep only the path.
//!
//! Chunks never change in place. Point writes and partial trims go through
//! decode + re-seal of the affected chunk only.

use crate::error::{SiloError, SiloResult};
use crate::storage::compression::CompressionParams;
use crate::storage::ipc::{read_ipc_array, write_ipc_array};
use arrow::array::ArrayRef;
use std::fs;
use std::path::{Path, PathBuf};

/// Payload location for a sealed chunk.
#[derive(Debug, Clone)]
enum ChunkData {
    Mem(Vec<u8>),
    Disk { path: PathBuf, cbytes: usize },
}

/// One sealed block of a column.
#[derive(Debug, Clone)]
pub struct Chunk {
    rows: usize,
    /// Uncompressed IPC payload size; the logical-size side of the ratio.
    nbytes: usize,
    data: ChunkData,
}

impl Chunk {
    /// Encode and compress an array; write the payload to `dest` when given.
    pub fn seal(
        array: &ArrayRef,
        cparams: &CompressionParams,
        dest: Option<PathBuf>,
    ) -> SiloResult<Self> {
        let ipc = write_ipc_array(array)?;
        let nbytes = ipc.len();
        let packed = cparams.compress(&ipc)?;
        let data = match dest {
            Some(path) => {
                let cbytes = packed.len();
                fs::write(&path, &packed)?;
                ChunkData::Disk { path, cbytes }
            }
            None => ChunkData::Mem(packed),
        };
        Ok(Self {
            rows: array.len(),
            nbytes,
            data,
        })
    }

    /// Reattach a chunk whose payload already sits in a file.
    pub fn attach(path: PathBuf, rows: usize, nbytes: usize, cbytes: usize) -> Self {
        Self {
            rows,
            nbytes,
            data: ChunkData::Disk { path, cbytes },
        }
    }

    /// Decompress and decode the payload back to an array.
    pub fn decode(&self, cparams: &CompressionParams) -> SiloResult<ArrayRef> {
        let packed = match &self.data {
            ChunkData::Mem(bytes) => bytes.clone(),
            ChunkData::Disk { path, .. } => fs::read(path)?,
        };
        let ipc = cparams.decompress(&packed)?;
        let array = read_ipc_array(&ipc)?;
        if array.len() != self.rows {
            return Err(SiloError::Storage(format!(
                "chunk decoded to {} rows, metadata says {}",
                array.len(),
                self.rows
            )));
        }
        Ok(array)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn nbytes(&self) -> usize {
        self.nbytes
    }

    pub fn cbytes(&self) -> usize {
        match &self.data {
            ChunkData::Mem(bytes) => bytes.len(),
            ChunkData::Disk { cbytes, .. } => *cbytes,
        }
    }

    /// Delete the payload file of a disk-backed chunk.
    pub fn remove_file(&self) -> SiloResult<()> {
        if let ChunkData::Disk { path, .. } = &self.data {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Payload file for the chunk at `idx` under a column directory.
pub fn chunk_path(dir: &Path, idx: usize) -> PathBuf {
    dir.join(format!("chunk-{idx:05}.blk"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use std::sync::Arc;

    fn sample() -> ArrayRef {
        Arc::new(Int64Array::from((0..100).collect::<Vec<i64>>()))
    }

    #[test]
    fn seal_and_decode_in_memory() {
        let cparams = CompressionParams::default();
        let chunk = Chunk::seal(&sample(), &cparams, None).unwrap();
        assert_eq!(chunk.rows(), 100);
        assert!(chunk.cbytes() > 0);
        let back = chunk.decode(&cparams).unwrap();
        assert_eq!(back.len(), 100);
    }

    #[test]
    fn seal_and_decode_on_disk() {
        let cparams = CompressionParams::zstd_level(1);
        let dir = tempfile::tempdir().unwrap();
        let path = chunk_path(dir.path(), 0);
        let chunk = Chunk::seal(&sample(), &cparams, Some(path.clone())).unwrap();
        assert!(path.exists());

        let reattached = Chunk::attach(path, chunk.rows(), chunk.nbytes(), chunk.cbytes());
        let back = reattached.decode(&cparams).unwrap();
        assert_eq!(back.len(), 100);
    }

    #[test]
    fn remove_file_deletes_payload() {
        let cparams = CompressionParams::default();
        let dir = tempfile::tempdir().unwrap();
        let path = chunk_path(dir.path(), 3);
        let chunk = Chunk::seal(&sample(), &cparams, Some(path.clone())).unwrap();
        chunk.remove_file().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn uncompressed_codec_stores_raw_ipc() {
        let cparams = CompressionParams::none();
        let chunk = Chunk::seal(&sample(), &cparams, None).unwrap();
        assert_eq!(chunk.cbytes(), chunk.nbytes());
    }
}
