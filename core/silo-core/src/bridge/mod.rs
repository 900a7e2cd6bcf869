//! Interop with the Arrow file ecosystem.
//!
//! Record batches for in-process exchange, Parquet for files. Both
//! import directions go through the table's normal construction and
//! append paths, so incoming data lands chunked and compressed like
//! locally built tables.

pub mod batches;
pub mod parquet;
