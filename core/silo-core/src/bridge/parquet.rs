//! Whole-table Parquet file exchange.
//!
//! Tables stream out in blocks through `ArrowWriter` and back in through
//! `ParquetRecordBatchReaderBuilder`. User attrs ride along as file
//! key-value metadata and are restored on import.

use crate::error::{SiloError, SiloResult};
use crate::storage::CompressionParams;
use crate::table::{Table, TableOptions};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Metadata key holding the attrs payload as one JSON object.
const ATTRS_KEY: &str = "silo:attrs";

impl Table {
    /// Write the whole table to one Parquet file.
    ///
    /// `cparams` selects the Parquet codec; chunk geometry does not
    /// carry over, only rows and attrs do. The write streams block by
    /// block, so the table never materializes whole.
    pub fn to_parquet(
        &self,
        path: impl AsRef<Path>,
        cparams: CompressionParams,
    ) -> SiloResult<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let mut props =
            WriterProperties::builder().set_compression(cparams.to_parquet_compression());
        if !self.attrs().is_empty() {
            let payload = serde_json::to_string(&self.attrs().to_map())?;
            props = props.set_key_value_metadata(Some(vec![KeyValue {
                key: ATTRS_KEY.to_string(),
                value: Some(payload),
            }]));
        }
        let mut writer = ArrowWriter::try_new(file, self.schema(), Some(props.build()))?;
        for batch in self.to_batches(None)? {
            writer.write(&batch)?;
        }
        writer.close()?;
        info!(path = %path.display(), rows = self.len(), "wrote parquet file");
        Ok(())
    }

    /// Load a Parquet file as a new table under `opts`.
    pub fn from_parquet(path: impl AsRef<Path>, opts: TableOptions) -> SiloResult<Table> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let attrs = stored_attrs(builder.metadata().file_metadata().key_value_metadata())?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        let mut table = if batches.is_empty() {
            // schema-only file; an empty batch carries the dtypes
            Table::from_batch(RecordBatch::new_empty(schema), opts)?
        } else {
            Table::from_batches(&batches, opts)?
        };
        if let Some(data) = attrs {
            table.attrs_mut().restore(data)?;
        }
        info!(path = %path.display(), rows = table.len(), "read parquet file");
        Ok(table)
    }
}

fn stored_attrs(kv: Option<&Vec<KeyValue>>) -> SiloResult<Option<BTreeMap<String, Value>>> {
    let Some(entries) = kv else {
        return Ok(None);
    };
    for entry in entries {
        if entry.key == ATTRS_KEY {
            let Some(payload) = &entry.value else {
                continue;
            };
            let data: BTreeMap<String, Value> =
                serde_json::from_str(payload).map_err(|e| {
                    SiloError::Serialization(format!("attrs metadata unreadable: {e}"))
                })?;
            return Ok(Some(data));
        }
    }
    Ok(None)
}
