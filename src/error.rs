//! Error types for the data access layer.
//!
//! Per-index failures (`FetchError`, `SchemaError`) are cheap, cloneable
//! values because the resolver reports them structurally inside a
//! [`ResolveResult`](crate::resolver::ResolveResult) instead of raising.
//! Only whole-batch preconditions (configuration, catalog load) surface
//! through the top-level [`Error`].

use thiserror::Error;

use crate::schema::ArtifactKind;
use crate::Index;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unusable environment configuration.
    ///
    /// Surfaced before any object-store call is attempted, never lazily on
    /// first use.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Catalog construction failed. No partial catalog is ever exposed.
    #[error(transparent)]
    CatalogLoad(#[from] CatalogLoadError),

    /// A single artifact could not be fetched or decoded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A single artifact failed schema normalization.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Requested index is outside the catalog domain.
    #[error("unknown simulation index {0}")]
    UnknownIndex(Index),

    /// Sampling asked for more indices than the selection can supply.
    #[error("requested {requested} indices, but only {available} match the selection")]
    NotEnoughIndices {
        /// How many indices the caller asked for.
        requested: usize,
        /// How many indices the selection actually contains.
        available: usize,
    },

    /// Arrow error
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why the catalog could not be built from its metadata documents.
///
/// Fatal for catalog construction; the previous catalog (if any) stays
/// installed when a reload fails with one of these.
#[derive(Error, Debug)]
pub enum CatalogLoadError {
    /// A metadata document could not be fetched from object storage.
    #[error("failed to fetch metadata document: {0}")]
    Fetch(#[from] FetchError),

    /// A metadata document did not parse as the expected JSON shape.
    #[error("malformed metadata document '{key}': {reason}")]
    Malformed {
        /// Object key of the offending document.
        key: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The simulation metadata document contains no records.
    #[error("metadata contains no simulation records")]
    Empty,

    /// Two metadata records claim the same index.
    #[error("duplicate metadata record for index {0}")]
    DuplicateIndex(Index),

    /// Two DGP records share the same identifier.
    #[error("duplicate DGP identifier {0}")]
    DuplicateDgp(u32),

    /// A DGP record declares an inverted index range.
    #[error("DGP {dgp} declares invalid index range {first}..={last}")]
    InvalidRange {
        /// Offending DGP identifier.
        dgp: u32,
        /// Declared range start.
        first: Index,
        /// Declared range end.
        last: Index,
    },

    /// Two DGP index ranges overlap. The partition invariant requires
    /// disjoint ranges; this is rejected, never silently repaired.
    #[error("DGP {dgp_a} and DGP {dgp_b} overlap on indices {first}..={last}")]
    OverlappingDgps {
        /// First DGP involved in the overlap.
        dgp_a: u32,
        /// Second DGP involved in the overlap.
        dgp_b: u32,
        /// First overlapping index.
        first: Index,
        /// Last overlapping index.
        last: Index,
    },

    /// Catalog indices exist that no DGP range covers.
    #[error("DGP ranges leave catalog indices uncovered: {uncovered}")]
    UncoveredIndices {
        /// Compact run-formatted list of the missing indices.
        uncovered: String,
    },

    /// A metadata record disagrees with the DGP range covering its index.
    #[error("metadata record for index {index} names DGP {declared}, but the DGP ranges assign DGP {assigned}")]
    DgpMismatch {
        /// Index of the inconsistent record.
        index: Index,
        /// DGP id the metadata record names.
        declared: u32,
        /// DGP id assigned by the covering range.
        assigned: u32,
    },
}

/// Why a single artifact could not be fetched and decoded.
///
/// "Not found" is kept distinct from transport failures: a transient
/// transport error is worth retrying, a true absence is not. Catalog
/// staleness (an entry believed available that 404s at fetch time) surfaces
/// as [`FetchError::NotFound`], not as a catalog defect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The object does not exist in storage.
    #[error("object not found: {key}")]
    NotFound {
        /// Requested object key.
        key: String,
    },

    /// The object store failed below the key/value abstraction.
    #[error("transport failure for '{key}': {reason}")]
    Transport {
        /// Requested object key.
        key: String,
        /// Transport-level diagnostic.
        reason: String,
    },

    /// The fetch did not complete within the configured timeout.
    #[error("fetch of '{key}' timed out after {timeout_ms} ms")]
    Timeout {
        /// Requested object key.
        key: String,
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The payload was fetched but is not a readable columnar file.
    #[error("failed to decode '{key}': {reason}")]
    Decode {
        /// Requested object key.
        key: String,
        /// Codec diagnostic.
        reason: String,
    },
}

impl FetchError {
    /// Whether this failure means the object is genuinely absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The object key the failed fetch was addressed to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::NotFound { key }
            | Self::Transport { key, .. }
            | Self::Timeout { key, .. }
            | Self::Decode { key, .. } => key,
        }
    }
}

/// Why a decoded table failed normalization against its canonical schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A canonical column is absent from the source table.
    #[error("{kind} table is missing required column '{column}'")]
    MissingColumn {
        /// Which artifact kind was being normalized.
        kind: ArtifactKind,
        /// Name of the absent canonical column.
        column: String,
    },

    /// A column's type cannot be losslessly coerced to the canonical type.
    #[error("column '{column}' has type {found} which cannot be losslessly coerced to {expected}")]
    IncompatibleType {
        /// Name of the offending column.
        column: String,
        /// Canonical type the column should have.
        expected: String,
        /// Type (and cast diagnostic) actually found.
        found: String,
    },

    /// The table decoded to zero rows, which no artifact in the corpus does.
    #[error("{kind} table contains no rows")]
    EmptyTable {
        /// Which artifact kind was being normalized.
        kind: ArtifactKind,
    },

    /// Canonical columns could not be reassembled into a record batch.
    #[error("failed to assemble canonical {kind} batch: {reason}")]
    Assembly {
        /// Which artifact kind was being normalized.
        kind: ArtifactKind,
        /// Arrow diagnostic.
        reason: String,
    },
}

/// Composite per-artifact failure: either the bytes never arrived intact, or
/// they decoded into a table the canonical schema rejects. The resolver
/// buckets the two cases separately.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// Fetch/decode-level failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Schema-level failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
