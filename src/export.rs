//! Flat estimate export for downstream evaluation tooling.
//!
//! Downstream scoring consumes one flat Parquet table with a row per
//! (index, estimand) combination. Dimensions that do not apply to a row —
//! an overall estimate has no level, year or practice — are null, which is
//! the "not applicable" marker of the corpus. `dataset_index` joins against
//! [`Index`], so anything resolved through this crate lines up by key, not
//! by file name.

use std::fs::File;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::Result;
use crate::Index;

/// One exported estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRow {
    /// Index of the simulation the estimate belongs to.
    pub dataset_index: Index,
    /// Estimand family (`Overall`, a subgroup variable, `Yearly`, `Practice`).
    pub variable: String,
    /// Subgroup level, when the variable has one.
    pub level: Option<String>,
    /// Year, for yearly estimands.
    pub year: Option<i64>,
    /// Practice identifier, for per-practice estimands.
    pub practice_id: Option<i64>,
    /// Point estimate.
    pub estimate: f64,
    /// Lower bound of the 90% interval.
    pub lower90: f64,
    /// Upper bound of the 90% interval.
    pub upper90: f64,
}

impl EstimateRow {
    /// Overall SATT estimate: no level, year or practice.
    #[must_use]
    pub fn overall(dataset_index: Index, estimate: f64, lower90: f64, upper90: f64) -> Self {
        Self {
            dataset_index,
            variable: "Overall".to_string(),
            level: None,
            year: None,
            practice_id: None,
            estimate,
            lower90,
            upper90,
        }
    }

    /// Subgroup estimate for one level of a covariate.
    #[must_use]
    pub fn subgroup(
        dataset_index: Index,
        variable: impl Into<String>,
        level: impl Into<String>,
        estimate: f64,
        lower90: f64,
        upper90: f64,
    ) -> Self {
        Self {
            dataset_index,
            variable: variable.into(),
            level: Some(level.into()),
            year: None,
            practice_id: None,
            estimate,
            lower90,
            upper90,
        }
    }

    /// Yearly estimate.
    #[must_use]
    pub fn yearly(dataset_index: Index, year: i64, estimate: f64, lower90: f64, upper90: f64) -> Self {
        Self {
            dataset_index,
            variable: "Yearly".to_string(),
            level: None,
            year: Some(year),
            practice_id: None,
            estimate,
            lower90,
            upper90,
        }
    }

    /// Per-practice estimate.
    #[must_use]
    pub fn practice(
        dataset_index: Index,
        practice_id: i64,
        estimate: f64,
        lower90: f64,
        upper90: f64,
    ) -> Self {
        Self {
            dataset_index,
            variable: "Practice".to_string(),
            level: None,
            year: None,
            practice_id: Some(practice_id),
            estimate,
            lower90,
            upper90,
        }
    }
}

/// The export schema, in contract order.
#[must_use]
pub fn export_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    Arc::clone(SCHEMA.get_or_init(|| {
        Arc::new(Schema::new(vec![
            Field::new("dataset_index", DataType::UInt32, false),
            Field::new("variable", DataType::Utf8, false),
            Field::new("level", DataType::Utf8, true),
            Field::new("year", DataType::Int64, true),
            Field::new("practice_id", DataType::Int64, true),
            Field::new("estimate", DataType::Float64, false),
            Field::new("lower90", DataType::Float64, false),
            Field::new("upper90", DataType::Float64, false),
        ]))
    }))
}

/// Assemble estimate rows into one record batch in contract order.
///
/// # Errors
///
/// Propagates Arrow construction failures.
pub fn to_record_batch(rows: &[EstimateRow]) -> Result<RecordBatch> {
    let dataset_index: ArrayRef = Arc::new(UInt32Array::from_iter_values(
        rows.iter().map(|r| r.dataset_index),
    ));
    let variable: ArrayRef = Arc::new(StringArray::from_iter_values(
        rows.iter().map(|r| r.variable.as_str()),
    ));
    let level: ArrayRef = Arc::new(StringArray::from_iter(
        rows.iter().map(|r| r.level.as_deref()),
    ));
    let year: ArrayRef = Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.year)));
    let practice_id: ArrayRef =
        Arc::new(Int64Array::from_iter(rows.iter().map(|r| r.practice_id)));
    let estimate: ArrayRef = Arc::new(Float64Array::from_iter_values(
        rows.iter().map(|r| r.estimate),
    ));
    let lower90: ArrayRef = Arc::new(Float64Array::from_iter_values(
        rows.iter().map(|r| r.lower90),
    ));
    let upper90: ArrayRef = Arc::new(Float64Array::from_iter_values(
        rows.iter().map(|r| r.upper90),
    ));

    let batch = RecordBatch::try_new(
        export_schema(),
        vec![
            dataset_index,
            variable,
            level,
            year,
            practice_id,
            estimate,
            lower90,
            upper90,
        ],
    )?;
    Ok(batch)
}

fn writer_properties() -> WriterProperties {
    // snappy matches the rest of the corpus
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Serialize estimate rows into an in-memory Parquet file.
///
/// # Errors
///
/// Propagates Arrow/Parquet failures.
pub fn to_parquet_bytes(rows: &[EstimateRow]) -> Result<Vec<u8>> {
    let batch = to_record_batch(rows)?;
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(buf)
}

/// Write estimate rows to a Parquet file on disk.
///
/// # Errors
///
/// Propagates Arrow/Parquet/IO failures.
pub fn write_parquet<P: AsRef<Path>>(rows: &[EstimateRow], path: P) -> Result<()> {
    let batch = to_record_batch(rows)?;
    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn sample_rows() -> Vec<EstimateRow> {
        vec![
            EstimateRow::overall(1, -4.2, -6.0, -2.4),
            EstimateRow::subgroup(1, "X2", "B", -3.0, -5.0, -1.0),
            EstimateRow::yearly(1, 2004, -4.9, -7.1, -2.7),
            EstimateRow::practice(2, 117, -1.5, -2.5, -0.5),
        ]
    }

    #[test]
    fn batch_has_contract_columns_in_order() {
        let batch = to_record_batch(&sample_rows()).unwrap();
        let schema = batch.schema();
        let names: Vec<&str> = schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "dataset_index",
                "variable",
                "level",
                "year",
                "practice_id",
                "estimate",
                "lower90",
                "upper90"
            ]
        );
        assert_eq!(batch.num_rows(), 4);
    }

    #[test]
    fn inapplicable_dimensions_are_null() {
        let batch = to_record_batch(&sample_rows()).unwrap();
        let level = batch.column_by_name("level").unwrap();
        let year = batch.column_by_name("year").unwrap();
        let practice = batch.column_by_name("practice_id").unwrap();

        // overall row: everything inapplicable
        assert!(level.is_null(0));
        assert!(year.is_null(0));
        assert!(practice.is_null(0));
        // subgroup row: level set, rest null
        assert!(!level.is_null(1));
        assert!(year.is_null(1));
        // yearly and practice rows
        assert!(!year.is_null(2));
        assert!(!practice.is_null(3));
    }

    #[test]
    fn parquet_bytes_round_trip() {
        let rows = sample_rows();
        let bytes = Bytes::from(to_parquet_bytes(&rows).unwrap());
        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 4);
        assert_eq!(batches[0].schema(), export_schema());
    }

    #[test]
    fn writes_parquet_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("estimates.parquet");
        write_parquet(&sample_rows(), &path).unwrap();
        assert!(path.exists());

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let total: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(total, 4);
    }
}
