//! Arrow IPC helpers for chunk payloads.
//!
//! A chunk stores exactly one array. On the wire that array travels as a
//! single-column RecordBatch in Arrow IPC file format, so the dtype rides
//! along and the reader needs no side channel.

use crate::error::{SiloError, SiloResult};
use arrow::array::ArrayRef;
use arrow::datatypes::{Field, Schema};
use arrow::ipc::{reader, writer};
use arrow::record_batch::RecordBatch;
use std::io::Cursor;
use std::sync::Arc;

/// Serialize one array to Arrow IPC bytes.
pub fn write_ipc_array(array: &ArrayRef) -> SiloResult<Vec<u8>> {
    let field = Field::new("values", array.data_type().clone(), false);
    let schema = Arc::new(Schema::new(vec![field]));
    let batch = RecordBatch::try_new(schema, vec![Arc::clone(array)])?;

    let mut buffer = Vec::new();
    {
        let mut writer = writer::FileWriter::try_new(&mut buffer, &batch.schema())?;
        writer.write(&batch)?;
        writer.finish()?;
    }
    Ok(buffer)
}

/// Deserialize Arrow IPC bytes back to the array.
pub fn read_ipc_array(bytes: &[u8]) -> SiloResult<ArrayRef> {
    let cursor = Cursor::new(bytes);
    let mut reader = reader::FileReader::try_new(cursor, None)?;

    let batch = reader
        .next()
        .ok_or_else(|| SiloError::Storage("no batch in chunk payload".to_string()))??;
    if batch.num_columns() != 1 {
        return Err(SiloError::Storage(format!(
            "chunk payload holds {} columns, expected 1",
            batch.num_columns()
        )));
    }
    Ok(Arc::clone(batch.column(0)))
}
