//! Columnar codec adapter.
//!
//! Turns fetched bytes into a single Arrow [`RecordBatch`], preserving
//! column names and primitive types exactly as stored; no semantic
//! interpretation happens here. [`ParquetCodec`] is the production codec —
//! the whole corpus is Parquet.

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::FetchError;

/// bytes → tabular record batch.
pub trait Codec: Send + Sync + 'static {
    /// Decode a fetched payload into one record batch.
    ///
    /// # Errors
    ///
    /// [`FetchError::Decode`] if the payload is not a readable file of the
    /// expected format. `key` is carried for diagnostics only.
    fn decode(&self, key: &str, payload: &Bytes) -> Result<RecordBatch, FetchError>;
}

/// Parquet codec over in-memory payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParquetCodec;

impl ParquetCodec {
    /// Create the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn decode_error(key: &str, reason: impl std::fmt::Display) -> FetchError {
    FetchError::Decode {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

impl Codec for ParquetCodec {
    fn decode(&self, key: &str, payload: &Bytes) -> Result<RecordBatch, FetchError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(payload.clone())
            .map_err(|e| decode_error(key, e))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| decode_error(key, e))?;

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch.map_err(|e| decode_error(key, e))?);
        }

        match batches.len() {
            0 => Ok(RecordBatch::new_empty(schema)),
            1 => Ok(batches.remove(0)),
            _ => concat_batches(&schema, &batches).map_err(|e| decode_error(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::ArrowWriter;
    use parquet::file::properties::WriterProperties;
    use std::sync::Arc;

    fn parquet_payload(rows: i64, row_group_size: usize) -> Bytes {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("value", DataType::Float64, false),
        ]));
        #[allow(clippy::cast_precision_loss)]
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(Int64Array::from_iter_values(0..rows)),
                Arc::new(Float64Array::from_iter_values((0..rows).map(|i| i as f64))),
            ],
        )
        .unwrap();

        let mut buf = Vec::new();
        let props = WriterProperties::builder()
            .set_max_row_group_size(row_group_size)
            .build();
        let mut writer = ArrowWriter::try_new(&mut buf, schema, Some(props)).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
        Bytes::from(buf)
    }

    #[test]
    fn decodes_single_row_group() {
        let payload = parquet_payload(100, 1024);
        let batch = ParquetCodec::new().decode("k", &payload).unwrap();
        assert_eq!(batch.num_rows(), 100);
        assert_eq!(batch.num_columns(), 2);
    }

    #[test]
    fn concatenates_multiple_row_groups() {
        // 250 rows over row groups of 100 decode as one batch
        let payload = parquet_payload(250, 100);
        let batch = ParquetCodec::new().decode("k", &payload).unwrap();
        assert_eq!(batch.num_rows(), 250);
    }

    #[test]
    fn garbage_payload_is_a_decode_error() {
        let err = ParquetCodec::new()
            .decode("bad-key", &Bytes::from_static(b"not parquet at all"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { ref key, .. } if key == "bad-key"));
    }
}
