//! Canonical schemas and normalization.
//!
//! The corpus consists of thousands of independently generated Parquet
//! files, and their column sets drift: extraction order varies, helper
//! columns leak in, and numeric columns occasionally arrive widened. This
//! module pins one canonical column set, order, and type per
//! [`ArtifactKind`] and rewrites every decoded table into that shape, so the
//! resolver never sees source-file drift.
//!
//! Policy: missing canonical columns are a hard [`SchemaError`]; extra
//! columns are dropped with a warning; types are coerced with strict casts
//! (a cast that would lose or invent data fails the artifact).

use std::sync::{Arc, OnceLock};

use arrow::array::ArrayRef;
use arrow::compute::{can_cast_types, cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SchemaError;
use crate::Index;

/// Version tag stamped on every normalized artifact.
pub const SCHEMA_VERSION: u32 = 1;

/// The category of stored table associated with an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Merged patient/practice panel for one simulation.
    Simulation,
    /// SATT ground-truth slices for one simulation.
    GroundTruth,
}

/// Merged ACIC Track 1 panel columns, in canonical order.
const SIMULATION_COLUMNS: &[(&str, DataType)] = &[
    ("id.patient", DataType::Int64),
    ("id.practice", DataType::Int64),
    ("V1", DataType::Float64),
    ("V2", DataType::Int64),
    ("V3", DataType::Int64),
    ("V4", DataType::Float64),
    ("V5", DataType::Utf8),
    ("year", DataType::Int64),
    ("Y", DataType::Float64),
    ("X1", DataType::Int64),
    ("X2", DataType::Utf8),
    ("X3", DataType::Int64),
    ("X4", DataType::Utf8),
    ("X5", DataType::Int64),
    ("X6", DataType::Float64),
    ("X7", DataType::Float64),
    ("X8", DataType::Float64),
    ("X9", DataType::Float64),
    ("Z", DataType::Int64),
    ("post", DataType::Int64),
    ("n.patients", DataType::Int64),
    ("V1_avg", DataType::Float64),
    ("V2_avg", DataType::Float64),
    ("V3_avg", DataType::Float64),
    ("V4_avg", DataType::Float64),
    ("V5_A_avg", DataType::Float64),
    ("V5_B_avg", DataType::Float64),
    ("V5_C_avg", DataType::Float64),
];

/// Per-index SATT truth columns, in canonical order. `level`, `year` and
/// `id.practice` are null for estimand rows they do not apply to.
const GROUND_TRUTH_COLUMNS: &[(&str, DataType)] = &[
    ("dataset.num", DataType::Int64),
    ("Confounding Strength", DataType::Utf8),
    ("Confounding Source", DataType::Utf8),
    ("Impact Heterogeneity", DataType::Utf8),
    ("Idiosyncrasy of Impacts", DataType::Utf8),
    ("variable", DataType::Utf8),
    ("level", DataType::Utf8),
    ("year", DataType::Int64),
    ("id.practice", DataType::Int64),
    ("SATT", DataType::Float64),
];

impl ArtifactKind {
    /// Both artifact kinds, for iteration.
    pub const ALL: [Self; 2] = [Self::Simulation, Self::GroundTruth];

    /// Stable lowercase label used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simulation => "simulation",
            Self::GroundTruth => "ground-truth",
        }
    }

    /// Storage namespace this kind's objects live under.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Simulation => "simulations",
            Self::GroundTruth => "truth",
        }
    }

    /// Default object file name for an index of this kind.
    #[must_use]
    pub fn file_name(self, index: Index) -> String {
        match self {
            Self::Simulation => format!("sim_{index:04}.parquet"),
            Self::GroundTruth => format!("truth_{index:04}.parquet"),
        }
    }

    /// Canonical `(name, type)` pairs in canonical order.
    #[must_use]
    pub const fn canonical_columns(self) -> &'static [(&'static str, DataType)] {
        match self {
            Self::Simulation => SIMULATION_COLUMNS,
            Self::GroundTruth => GROUND_TRUTH_COLUMNS,
        }
    }

    /// The canonical Arrow schema for this kind.
    ///
    /// All fields are declared nullable; null-policy enforcement is a
    /// downstream concern, not a normalization concern.
    #[must_use]
    pub fn canonical_schema(self) -> SchemaRef {
        static SIMULATION: OnceLock<SchemaRef> = OnceLock::new();
        static GROUND_TRUTH: OnceLock<SchemaRef> = OnceLock::new();

        let cell = match self {
            Self::Simulation => &SIMULATION,
            Self::GroundTruth => &GROUND_TRUTH,
        };
        Arc::clone(cell.get_or_init(|| {
            let fields: Vec<Field> = self
                .canonical_columns()
                .iter()
                .map(|(name, data_type)| Field::new(*name, data_type.clone(), true))
                .collect();
            Arc::new(Schema::new(fields))
        }))
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded table tagged with its identity. Immutable once built; shared
/// between the cache and resolver callers via `Arc`.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Index this table belongs to.
    pub index: Index,
    /// Which artifact family the table comes from.
    pub kind: ArtifactKind,
    /// Canonical schema version the table was normalized against.
    pub schema_version: u32,
    /// The normalized table, columns in canonical order.
    pub batch: RecordBatch,
}

impl Artifact {
    /// Number of rows in the table.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Outcome of a successful normalization.
#[derive(Debug, Clone)]
pub struct Normalized {
    /// The table, exactly the canonical columns in canonical order.
    pub batch: RecordBatch,
    /// Source columns that were dropped because the canonical schema does
    /// not know them. Empty for a clean source file.
    pub dropped_columns: Vec<String>,
}

/// Rewrite a raw decoded table into the canonical shape for `kind`.
///
/// # Errors
///
/// Returns [`SchemaError`] if a canonical column is missing, a column cannot
/// be losslessly coerced, or the table is empty.
pub fn normalize(batch: &RecordBatch, kind: ArtifactKind) -> Result<Normalized, SchemaError> {
    if batch.num_rows() == 0 {
        return Err(SchemaError::EmptyTable { kind });
    }

    let source_schema = batch.schema();
    let canonical = kind.canonical_columns();

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(canonical.len());
    for (name, target) in canonical {
        let Some((position, field)) = source_schema.column_with_name(name) else {
            return Err(SchemaError::MissingColumn {
                kind,
                column: (*name).to_string(),
            });
        };

        let array = batch.column(position);
        if field.data_type() == target {
            columns.push(Arc::clone(array));
            continue;
        }

        if !can_cast_types(field.data_type(), target) {
            return Err(SchemaError::IncompatibleType {
                column: (*name).to_string(),
                expected: target.to_string(),
                found: field.data_type().to_string(),
            });
        }
        // safe=false: an overflowing or unparseable value fails the artifact
        // instead of becoming a silent null.
        let options = CastOptions {
            safe: false,
            ..CastOptions::default()
        };
        let cast = cast_with_options(array, target, &options).map_err(|e| {
            SchemaError::IncompatibleType {
                column: (*name).to_string(),
                expected: target.to_string(),
                found: format!("{} ({e})", field.data_type()),
            }
        })?;
        columns.push(cast);
    }

    let dropped_columns: Vec<String> = source_schema
        .fields()
        .iter()
        .filter(|f| !canonical.iter().any(|(name, _)| *name == f.name().as_str()))
        .map(|f| f.name().clone())
        .collect();
    if !dropped_columns.is_empty() {
        warn!(
            kind = %kind,
            dropped = ?dropped_columns,
            "dropping columns outside the canonical schema"
        );
    }

    let normalized =
        RecordBatch::try_new(kind.canonical_schema(), columns).map_err(|e| SchemaError::Assembly {
            kind,
            reason: e.to_string(),
        })?;

    Ok(Normalized {
        batch: normalized,
        dropped_columns,
    })
}
