//! RecordBatch import and export.

use crate::error::{SiloError, SiloResult};
use crate::table::{Table, TableOptions};
use arrow::record_batch::RecordBatch;

impl Table {
    /// Export all rows as record batches of at most `blen` rows.
    ///
    /// `None` uses the table chunk length; the last batch runs short when
    /// the row count is not a multiple. An empty table exports no batches.
    pub fn to_batches(&self, blen: Option<usize>) -> SiloResult<Vec<RecordBatch>> {
        let blen = match blen {
            Some(0) => {
                return Err(SiloError::Validation(
                    "block length must be positive".to_string(),
                ))
            }
            Some(n) => n,
            None => self.resolved_chunklen(),
        };
        let len = self.len();
        let mut batches = Vec::with_capacity(len.div_ceil(blen));
        let mut start = 0;
        while start < len {
            let stop = (start + blen).min(len);
            batches.push(self.slice_batch(start, stop)?);
            start = stop;
        }
        Ok(batches)
    }

    /// Build a table from batches: create from the first, append the rest.
    ///
    /// Later batches adapt to the first one's dtypes by column name, so
    /// they only need matching names with castable types.
    pub fn from_batches(batches: &[RecordBatch], opts: TableOptions) -> SiloResult<Table> {
        let Some((first, rest)) = batches.split_first() else {
            return Err(SiloError::Validation(
                "from_batches needs at least one batch".to_string(),
            ));
        };
        let mut table = Table::from_batch(first.clone(), opts)?;
        for batch in rest {
            table.append(batch.clone())?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch(lo: i64, hi: i64) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Float64, false),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from((lo..hi).collect::<Vec<_>>())),
                Arc::new(Float64Array::from(
                    (lo..hi).map(|v| v as f64 / 2.0).collect::<Vec<_>>(),
                )),
            ],
        )
        .unwrap()
    }

    #[test]
    fn export_splits_into_blocks() {
        let table = Table::from_batch(batch(0, 10), TableOptions::default()).unwrap();
        let out = table.to_batches(Some(4)).unwrap();
        let sizes: Vec<usize> = out.iter().map(|b| b.num_rows()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(out[0].schema(), table.schema());
    }

    #[test]
    fn export_default_block_is_chunklen() {
        let table =
            Table::from_batch(batch(0, 10), TableOptions::default().with_chunklen(3)).unwrap();
        let out = table.to_batches(None).unwrap();
        let sizes: Vec<usize> = out.iter().map(|b| b.num_rows()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
    }

    #[test]
    fn export_zero_block_rejected() {
        let table = Table::from_batch(batch(0, 4), TableOptions::default()).unwrap();
        let err = table.to_batches(Some(0)).unwrap_err();
        assert!(matches!(err, SiloError::Validation(_)));
    }

    #[test]
    fn empty_table_exports_nothing() {
        let table = Table::from_batch(batch(0, 0), TableOptions::default()).unwrap();
        assert!(table.to_batches(Some(4)).unwrap().is_empty());
    }

    #[test]
    fn import_appends_every_batch() {
        let parts = vec![batch(0, 4), batch(4, 9), batch(9, 12)];
        let table = Table::from_batches(&parts, TableOptions::default().with_chunklen(5)).unwrap();
        assert_eq!(table.len(), 12);

        let row = table.row(11).unwrap();
        assert_eq!(row.get("a"), Some(&crate::storage::CellValue::Int64(11)));
    }

    #[test]
    fn import_needs_at_least_one_batch() {
        let err = Table::from_batches(&[], TableOptions::default()).unwrap_err();
        assert!(matches!(err, SiloError::Validation(_)));
    }

    #[test]
    fn round_trip_preserves_rows() {
        let table =
            Table::from_batch(batch(0, 20), TableOptions::default().with_chunklen(6)).unwrap();
        let rebuilt =
            Table::from_batches(&table.to_batches(Some(7)).unwrap(), TableOptions::default())
                .unwrap();
        assert_eq!(rebuilt.len(), 20);
        for i in [0i64, 7, 19] {
            assert_eq!(rebuilt.row(i).unwrap(), table.row(i).unwrap());
        }
    }
}
