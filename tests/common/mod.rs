//! Shared fixtures: canonical-shaped Parquet payloads and a seeded
//! in-memory object store.
#![allow(dead_code)] // not every test target uses every helper

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use cidl::catalog::{Catalog, CatalogHandle, DgpRecord, DifficultyTier, SimulationRecord};
use cidl::schema::ArtifactKind;
use cidl::store::{KeyLayout, MemoryObjectStore};
use cidl::Index;
use parquet::arrow::ArrowWriter;

/// Rows per fixture artifact.
pub const FIXTURE_ROWS: usize = 8;

/// Build a batch with exactly the canonical columns of `kind`, in canonical
/// order, filled with synthetic values.
pub fn canonical_batch(kind: ArtifactKind, rows: usize) -> RecordBatch {
    let columns = kind.canonical_columns();
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, data_type)| Field::new(*name, data_type.clone(), true))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, data_type)| synthetic_array(data_type, rows))
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

fn synthetic_array(data_type: &DataType, rows: usize) -> ArrayRef {
    match data_type {
        DataType::Int64 => Arc::new(Int64Array::from_iter_values(
            (0..rows).map(|i| i64::try_from(i).unwrap()),
        )),
        DataType::Float64 => {
            #[allow(clippy::cast_precision_loss)]
            let values = (0..rows).map(|i| i as f64 * 0.5);
            Arc::new(Float64Array::from_iter_values(values))
        }
        _ => Arc::new(StringArray::from_iter_values(
            (0..rows).map(|i| format!("v{i}")),
        )),
    }
}

/// Serialize a batch to Parquet bytes.
pub fn parquet_bytes(batch: &RecordBatch) -> Bytes {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
    Bytes::from(buf)
}

/// Drop one named column from a batch.
pub fn without_column(batch: &RecordBatch, column: &str) -> RecordBatch {
    let keep: Vec<usize> = (0..batch.num_columns())
        .filter(|&i| batch.schema().field(i).name() != column)
        .collect();
    batch.project(&keep).unwrap()
}

/// Append an extra Utf8 column to a batch.
pub fn with_extra_column(batch: &RecordBatch, column: &str) -> RecordBatch {
    let mut fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    fields.push(Field::new(column, DataType::Utf8, true));
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();
    arrays.push(Arc::new(StringArray::from_iter_values(
        (0..batch.num_rows()).map(|i| format!("x{i}")),
    )));
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
}

/// A metadata record with default filenames and full availability.
pub fn record(index: Index, dgp: u32) -> SimulationRecord {
    SimulationRecord {
        index,
        filename: None,
        truth_filename: None,
        has_simulation: true,
        has_truth: true,
        dgp,
    }
}

/// A DGP record covering `first..=last`.
pub fn dgp(id: u32, first: Index, last: Index, tier: DifficultyTier) -> DgpRecord {
    DgpRecord {
        dgp: id,
        first_index: first,
        last_index: last,
        confounding_strength: "Strong".to_string(),
        confounding_source: "Outcome".to_string(),
        impact_heterogeneity: "Moderate".to_string(),
        idiosyncrasy_of_impacts: "High".to_string(),
        difficulty_tier: tier,
    }
}

/// Store both artifacts for `index` under their default keys.
pub fn seed_artifacts(store: &MemoryObjectStore, layout: &KeyLayout, index: Index) {
    for kind in ArtifactKind::ALL {
        store.insert(
            layout.artifact_key(kind, index),
            parquet_bytes(&canonical_batch(kind, FIXTURE_ROWS)),
        );
    }
}

/// A one-DGP catalog handle over `records`, spanning their full range.
pub fn single_dgp_catalog(records: Vec<SimulationRecord>, layout: &KeyLayout) -> CatalogHandle {
    let first = records.iter().map(|r| r.index).min().unwrap();
    let last = records.iter().map(|r| r.index).max().unwrap();
    let catalog = Catalog::from_parts(
        records,
        vec![dgp(1, first, last, DifficultyTier::Medium)],
        layout,
    )
    .unwrap();
    CatalogHandle::new(catalog)
}
