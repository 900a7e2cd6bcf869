//! Storage module — chunked column containers.
//!
//! The table layer composes [`column::ColumnStore`] instances and never
//! touches chunk files or codecs directly; everything below the registry
//! goes through this module.

pub mod chunk;
pub mod column;
pub mod compression;
pub mod ipc;
pub mod value;

pub use column::{
    ColumnOptions, ColumnStore, DEFAULT_CHUNK_ROWS, MaskCursor, RangeCursor, SharedColumn, shared,
};
pub use compression::{Codec, CompressionParams};
pub use value::CellValue;
