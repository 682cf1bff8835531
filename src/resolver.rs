//! Batch resolution of indices into matched triples.
//!
//! The resolver owes the caller one thing above all: **exhaustive
//! accounting**. Every requested index lands in exactly one output bucket —
//! matched, missing on one side, fetch-failed, schema-failed, or unknown —
//! never zero, never two. That turns "file not found" and "schema drift",
//! which would otherwise surface far downstream as subtly misaligned
//! analysis tables, into explicit early diagnostics.
//!
//! Per-index work is independent, so a batch fans out over a `JoinSet`;
//! only the network fetches are bounded (semaphore), so cache hits and
//! catalog checks never queue behind slow I/O. Dropping the `resolve`
//! future aborts in-flight work; cache insertion stays atomic either way.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::ArtifactCache;
use crate::catalog::{CatalogEntry, CatalogHandle, DgpRecord};
use crate::codec::{Codec, ParquetCodec};
use crate::config::ResolverConfig;
use crate::error::{ArtifactError, FetchError, SchemaError};
use crate::schema::{self, Artifact, ArtifactKind};
use crate::store::ObjectStore;
use crate::Index;

/// A fully resolved index: both artifacts normalized, plus the DGP that
/// generated them. Only ever constructed whole.
#[derive(Debug, Clone)]
pub struct MatchedTriple {
    /// The resolved index.
    pub index: Index,
    /// Normalized simulation table.
    pub simulation: Arc<Artifact>,
    /// Normalized ground-truth table.
    pub ground_truth: Arc<Artifact>,
    /// DGP metadata for the index.
    pub dgp: DgpRecord,
}

/// Why one requested index did not resolve into a [`MatchedTriple`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReport {
    /// The index is outside the catalog domain.
    UnknownIndex,
    /// The catalog lists no simulation artifact for the index.
    MissingSimulation,
    /// The catalog lists no ground-truth artifact for the index.
    MissingGroundTruth,
    /// Fetch or decode failed for one of the artifacts.
    Fetch(FetchError),
    /// Schema normalization failed for one of the artifacts.
    Schema(SchemaError),
}

/// Complete accounting for one batch resolve.
///
/// The five failure buckets plus `matched` partition the requested set:
/// an index appears in exactly one of them.
#[derive(Debug, Default)]
pub struct ResolveResult {
    /// Fully resolved indices.
    pub matched: FxHashMap<Index, MatchedTriple>,
    /// Known indices whose simulation artifact the catalog lists as absent.
    pub missing_simulation: BTreeSet<Index>,
    /// Known indices whose ground-truth artifact the catalog lists as absent.
    pub missing_ground_truth: BTreeSet<Index>,
    /// Indices whose artifact fetch or decode failed (including catalog
    /// staleness: listed as available but absent in storage).
    pub fetch_failures: BTreeMap<Index, FetchError>,
    /// Indices whose artifact failed canonical-schema normalization.
    pub schema_failures: BTreeMap<Index, SchemaError>,
    /// Requested indices the catalog does not know.
    pub unknown: BTreeSet<Index>,
}

impl ResolveResult {
    /// Total number of accounted indices across all buckets.
    #[must_use]
    pub fn outcome_count(&self) -> usize {
        self.matched.len()
            + self.missing_simulation.len()
            + self.missing_ground_truth.len()
            + self.fetch_failures.len()
            + self.schema_failures.len()
            + self.unknown.len()
    }

    /// Whether every requested index resolved into a triple.
    #[must_use]
    pub fn is_fully_matched(&self) -> bool {
        self.outcome_count() == self.matched.len()
    }

    /// Whether `index` was part of the request (in any bucket).
    #[must_use]
    pub fn contains(&self, index: Index) -> bool {
        self.matched.contains_key(&index)
            || self.missing_simulation.contains(&index)
            || self.missing_ground_truth.contains(&index)
            || self.fetch_failures.contains_key(&index)
            || self.schema_failures.contains_key(&index)
            || self.unknown.contains(&index)
    }

    /// The mismatch report for a requested index that did not match, if any.
    #[must_use]
    pub fn mismatch(&self, index: Index) -> Option<MismatchReport> {
        if self.unknown.contains(&index) {
            return Some(MismatchReport::UnknownIndex);
        }
        if self.missing_simulation.contains(&index) {
            return Some(MismatchReport::MissingSimulation);
        }
        if self.missing_ground_truth.contains(&index) {
            return Some(MismatchReport::MissingGroundTruth);
        }
        if let Some(err) = self.fetch_failures.get(&index) {
            return Some(MismatchReport::Fetch(err.clone()));
        }
        if let Some(err) = self.schema_failures.get(&index) {
            return Some(MismatchReport::Schema(err.clone()));
        }
        None
    }

    fn record(&mut self, index: Index, outcome: Outcome) {
        match outcome {
            Outcome::Matched(triple) => {
                self.matched.insert(index, *triple);
            }
            Outcome::MissingSimulation => {
                self.missing_simulation.insert(index);
            }
            Outcome::MissingGroundTruth => {
                self.missing_ground_truth.insert(index);
            }
            Outcome::Fetch(err) => {
                warn!(index, error = %err, "artifact fetch failed");
                self.fetch_failures.insert(index, err);
            }
            Outcome::Schema(err) => {
                warn!(index, error = %err, "artifact failed schema normalization");
                self.schema_failures.insert(index, err);
            }
            Outcome::Unknown => {
                self.unknown.insert(index);
            }
        }
    }
}

enum Outcome {
    Matched(Box<MatchedTriple>),
    MissingSimulation,
    MissingGroundTruth,
    Fetch(FetchError),
    Schema(SchemaError),
    Unknown,
}

/// Everything a spawned per-index task needs, shared by `Arc`.
struct Shared {
    store: Arc<dyn ObjectStore>,
    codec: Arc<dyn Codec>,
    cache: Arc<ArtifactCache>,
    fetch_permits: Arc<Semaphore>,
    fetch_timeout: Duration,
    fetch_timeout_ms: u64,
}

/// Resolves indices into matched triples or precise mismatch reports.
pub struct Resolver {
    catalog: Arc<CatalogHandle>,
    shared: Arc<Shared>,
}

impl Resolver {
    /// Resolver over `store` with the default Parquet codec.
    #[must_use]
    pub fn new(
        catalog: Arc<CatalogHandle>,
        store: Arc<dyn ObjectStore>,
        config: ResolverConfig,
    ) -> Self {
        Self::with_codec(catalog, store, Arc::new(ParquetCodec::new()), config)
    }

    /// Resolver with an explicit codec (non-Parquet corpora, tests).
    #[must_use]
    pub fn with_codec(
        catalog: Arc<CatalogHandle>,
        store: Arc<dyn ObjectStore>,
        codec: Arc<dyn Codec>,
        config: ResolverConfig,
    ) -> Self {
        let fetch_timeout_ms =
            u64::try_from(config.fetch_timeout.as_millis()).unwrap_or(u64::MAX);
        Self {
            catalog,
            shared: Arc::new(Shared {
                store,
                codec,
                cache: Arc::new(ArtifactCache::new(config.max_resident_artifacts)),
                fetch_permits: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
                fetch_timeout: config.fetch_timeout,
                fetch_timeout_ms,
            }),
        }
    }

    /// The artifact cache, for invalidation and stats.
    #[must_use]
    pub fn cache(&self) -> &ArtifactCache {
        &self.shared.cache
    }

    /// The catalog handle this resolver reads from.
    #[must_use]
    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    /// Resolve a batch of indices. Duplicates are collapsed.
    ///
    /// Never fails as a whole: per-index problems are reported in the
    /// result's buckets. The catalog is snapshotted once, so a concurrent
    /// reload cannot split one batch across two catalog versions.
    pub async fn resolve(&self, indices: impl IntoIterator<Item = Index>) -> ResolveResult {
        let requested: BTreeSet<Index> = indices.into_iter().collect();
        let catalog = self.catalog.snapshot();
        let mut result = ResolveResult::default();
        let mut tasks: JoinSet<(Index, Outcome)> = JoinSet::new();

        for index in requested {
            // catalog-only outcomes are decided without spawning
            let Some(entry) = catalog.entry(index) else {
                result.record(index, Outcome::Unknown);
                continue;
            };
            let (Some(simulation_key), Some(ground_truth_key)) = (
                entry.key_for(ArtifactKind::Simulation),
                entry.key_for(ArtifactKind::GroundTruth),
            ) else {
                let outcome = if entry.available(ArtifactKind::Simulation) {
                    Outcome::MissingGroundTruth
                } else {
                    Outcome::MissingSimulation
                };
                result.record(index, outcome);
                continue;
            };
            let Ok(dgp) = catalog.dgp_of(index) else {
                result.record(index, Outcome::Unknown);
                continue;
            };

            let shared = Arc::clone(&self.shared);
            let entry = CatalogEntry {
                index,
                simulation_key: Some(simulation_key.to_string()),
                ground_truth_key: Some(ground_truth_key.to_string()),
                dgp: entry.dgp,
            };
            let dgp = dgp.clone();
            tasks.spawn(async move { (index, resolve_entry(&shared, &entry, dgp).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => result.record(index, outcome),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => {} // cancelled during shutdown
            }
        }

        debug!(
            matched = result.matched.len(),
            failed = result.outcome_count() - result.matched.len(),
            "batch resolve finished"
        );
        result
    }

    /// Resolve a single index.
    ///
    /// # Errors
    ///
    /// The [`MismatchReport`] explaining why the index did not match.
    pub async fn resolve_one(&self, index: Index) -> Result<MatchedTriple, MismatchReport> {
        let mut result = self.resolve([index]).await;
        result.matched.remove(&index).ok_or_else(|| {
            result
                .mismatch(index)
                // resolve accounts for every requested index
                .unwrap_or(MismatchReport::UnknownIndex)
        })
    }
}

async fn resolve_entry(shared: &Shared, entry: &CatalogEntry, dgp: DgpRecord) -> Outcome {
    let index = entry.index;
    let (simulation, ground_truth) = tokio::join!(
        load_artifact(shared, index, ArtifactKind::Simulation, entry),
        load_artifact(shared, index, ArtifactKind::GroundTruth, entry),
    );

    // simulation-side failures take precedence so an index never lands in
    // two buckets
    match (simulation, ground_truth) {
        (Ok(simulation), Ok(ground_truth)) => Outcome::Matched(Box::new(MatchedTriple {
            index,
            simulation,
            ground_truth,
            dgp,
        })),
        (Err(err), _) | (Ok(_), Err(err)) => match err {
            ArtifactError::Fetch(err) => Outcome::Fetch(err),
            ArtifactError::Schema(err) => Outcome::Schema(err),
        },
    }
}

async fn load_artifact(
    shared: &Shared,
    index: Index,
    kind: ArtifactKind,
    entry: &CatalogEntry,
) -> Result<Arc<Artifact>, ArtifactError> {
    // availability was checked before spawning
    let key = entry.key_for(kind).unwrap_or_default().to_string();
    shared
        .cache
        .get_or_load(index, kind, || async {
            let permit = shared.fetch_permits.acquire().await.map_err(|_| {
                FetchError::Transport {
                    key: key.clone(),
                    reason: "fetch pool closed".to_string(),
                }
            })?;

            debug!(index, kind = %kind, key = %key, "fetching artifact");
            let payload = match tokio::time::timeout(shared.fetch_timeout, shared.store.get(&key))
                .await
            {
                Ok(Ok(payload)) => payload,
                Ok(Err(err)) => return Err(ArtifactError::Fetch(err)),
                Err(_) => {
                    return Err(ArtifactError::Fetch(FetchError::Timeout {
                        key: key.clone(),
                        timeout_ms: shared.fetch_timeout_ms,
                    }))
                }
            };
            // the permit bounds network fetches, not CPU decode
            drop(permit);

            let raw = shared
                .codec
                .decode(&key, &payload)
                .map_err(ArtifactError::Fetch)?;
            let normalized = schema::normalize(&raw, kind).map_err(ArtifactError::Schema)?;

            Ok(Artifact {
                index,
                kind,
                schema_version: schema::SCHEMA_VERSION,
                batch: normalized.batch,
            })
        })
        .await
}
