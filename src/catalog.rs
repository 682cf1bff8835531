//! Authoritative registry of available indices and DGP assignments.
//!
//! The catalog is built once from two metadata documents and frozen: after
//! load, every call is a pure read. Availability flags reflect the metadata
//! source of truth, not live storage — an entry can go stale, and staleness
//! is handled at fetch time, never by mutating the catalog. Reload is an
//! explicit, atomic swap through [`CatalogHandle`]; readers never observe a
//! half-updated catalog.
//!
//! Metadata documents (JSON, fetched from well-known keys):
//!
//! - per-index records: `[{ "index": 1, "dgp": 1, ... }, ...]` with optional
//!   `filename`/`truth_filename` overrides and `has_simulation`/`has_truth`
//!   availability flags (both default true);
//! - DGP info: `{ "dgps": [{ "dgp": 1, "first_index": 1, "last_index": 850,
//!   "difficulty_tier": "easy", ... }, ...] }`.
//!
//! The DGP index ranges must partition the catalog domain: overlaps and
//! gaps are load errors naming the offending indices, never silently
//! repaired.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{seq::index as rand_index, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CatalogLoadError, Error, Result};
use crate::schema::ArtifactKind;
use crate::store::{KeyLayout, ObjectStore};
use crate::Index;

/// Difficulty label attached to every DGP.
///
/// The mapping is strict: `Easy` does not include `VeryEasy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    /// Weak confounding, homogeneous effects.
    VeryEasy,
    /// Easy.
    Easy,
    /// Medium.
    Medium,
    /// Hard.
    Hard,
    /// Strong confounding, idiosyncratic effects.
    VeryHard,
}

impl DifficultyTier {
    /// All five tiers.
    pub const ALL: [Self; 5] = [
        Self::VeryEasy,
        Self::Easy,
        Self::Medium,
        Self::Hard,
        Self::VeryHard,
    ];

    /// Tier label as it appears in metadata (`very_easy`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryEasy => "very_easy",
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::VeryHard => "very_hard",
        }
    }
}

/// One data-generating process and the index range it governs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DgpRecord {
    /// DGP identifier.
    pub dgp: u32,
    /// First index this DGP generated.
    pub first_index: Index,
    /// Last index this DGP generated (inclusive).
    pub last_index: Index,
    /// Confounding strength descriptor.
    pub confounding_strength: String,
    /// Confounding source descriptor.
    pub confounding_source: String,
    /// Impact heterogeneity descriptor.
    pub impact_heterogeneity: String,
    /// Idiosyncrasy-of-impacts descriptor.
    pub idiosyncrasy_of_impacts: String,
    /// Difficulty tier.
    pub difficulty_tier: DifficultyTier,
}

impl DgpRecord {
    /// Whether `index` falls inside this DGP's range.
    #[must_use]
    pub const fn covers(&self, index: Index) -> bool {
        self.first_index <= index && index <= self.last_index
    }
}

const fn default_true() -> bool {
    true
}

/// One per-index record of the simulation metadata document.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationRecord {
    /// Simulation index.
    pub index: Index,
    /// Override for the simulation file name (default `sim_{index:04}.parquet`).
    #[serde(default)]
    pub filename: Option<String>,
    /// Override for the truth file name (default `truth_{index:04}.parquet`).
    #[serde(default)]
    pub truth_filename: Option<String>,
    /// Whether the simulation file was produced (partial extractions leave
    /// holes in the corpus).
    #[serde(default = "default_true")]
    pub has_simulation: bool,
    /// Whether a matched ground-truth file was produced.
    #[serde(default = "default_true")]
    pub has_truth: bool,
    /// DGP this index was generated by.
    pub dgp: u32,
}

/// Shape of the DGP info document.
#[derive(Debug, Clone, Deserialize)]
pub struct DgpInfo {
    /// All DGP records.
    pub dgps: Vec<DgpRecord>,
}

/// Frozen per-index availability and object locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Simulation index.
    pub index: Index,
    /// Object key of the simulation file; `None` if unavailable.
    pub simulation_key: Option<String>,
    /// Object key of the ground-truth file; `None` if unavailable.
    pub ground_truth_key: Option<String>,
    /// DGP this index belongs to.
    pub dgp: u32,
}

impl CatalogEntry {
    /// Object key for one artifact kind, if available.
    #[must_use]
    pub fn key_for(&self, kind: ArtifactKind) -> Option<&str> {
        match kind {
            ArtifactKind::Simulation => self.simulation_key.as_deref(),
            ArtifactKind::GroundTruth => self.ground_truth_key.as_deref(),
        }
    }

    /// Whether the catalog believes this kind exists for the index.
    #[must_use]
    pub fn available(&self, kind: ArtifactKind) -> bool {
        self.key_for(kind).is_some()
    }
}

/// The frozen catalog. All reads are lock-free after construction.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: FxHashMap<Index, CatalogEntry>,
    /// Sorted by `first_index`; validated to partition the domain.
    dgps: Vec<DgpRecord>,
    domain: (Index, Index),
    loaded_at: DateTime<Utc>,
}

impl Catalog {
    /// Build and validate a catalog from already-parsed metadata.
    ///
    /// This is the pure core of [`CatalogLoader::load`] and the natural
    /// entry point for tests.
    ///
    /// # Errors
    ///
    /// [`CatalogLoadError`] on duplicate indices, duplicate or invalid DGP
    /// ranges, overlaps, uncovered indices, or record/range disagreement.
    pub fn from_parts(
        records: Vec<SimulationRecord>,
        dgps: Vec<DgpRecord>,
        layout: &KeyLayout,
    ) -> std::result::Result<Self, CatalogLoadError> {
        if records.is_empty() {
            return Err(CatalogLoadError::Empty);
        }

        let mut sorted_dgps = dgps;
        sorted_dgps.sort_by_key(|d| d.first_index);
        validate_partition(&sorted_dgps)?;

        let mut entries: FxHashMap<Index, CatalogEntry> =
            FxHashMap::with_capacity_and_hasher(records.len(), rustc_hash::FxBuildHasher);
        let mut domain = (Index::MAX, Index::MIN);

        for record in records {
            let index = record.index;
            let assigned = dgp_covering(&sorted_dgps, index).map(|d| d.dgp);
            match assigned {
                None => {
                    // collected below for a complete diagnostic
                }
                Some(assigned) if assigned != record.dgp => {
                    return Err(CatalogLoadError::DgpMismatch {
                        index,
                        declared: record.dgp,
                        assigned,
                    });
                }
                Some(_) => {}
            }

            let simulation_key = record.has_simulation.then(|| {
                record.filename.as_deref().map_or_else(
                    || layout.artifact_key(ArtifactKind::Simulation, index),
                    |name| layout.named_key(ArtifactKind::Simulation, name),
                )
            });
            let ground_truth_key = record.has_truth.then(|| {
                record.truth_filename.as_deref().map_or_else(
                    || layout.artifact_key(ArtifactKind::GroundTruth, index),
                    |name| layout.named_key(ArtifactKind::GroundTruth, name),
                )
            });

            let entry = CatalogEntry {
                index,
                simulation_key,
                ground_truth_key,
                dgp: record.dgp,
            };
            if entries.insert(index, entry).is_some() {
                return Err(CatalogLoadError::DuplicateIndex(index));
            }
            domain = (domain.0.min(index), domain.1.max(index));
        }

        let mut uncovered: Vec<Index> = entries
            .keys()
            .copied()
            .filter(|&i| dgp_covering(&sorted_dgps, i).is_none())
            .collect();
        if !uncovered.is_empty() {
            uncovered.sort_unstable();
            return Err(CatalogLoadError::UncoveredIndices {
                uncovered: format_index_runs(&uncovered),
            });
        }

        Ok(Self {
            entries,
            dgps: sorted_dgps,
            domain,
            loaded_at: Utc::now(),
        })
    }

    /// Whether the catalog knows `index` at all.
    #[must_use]
    pub fn contains(&self, index: Index) -> bool {
        self.entries.contains_key(&index)
    }

    /// Whether the catalog believes `kind` exists for `index`.
    #[must_use]
    pub fn exists(&self, index: Index, kind: ArtifactKind) -> bool {
        self.entries
            .get(&index)
            .is_some_and(|e| e.available(kind))
    }

    /// The full catalog entry for `index`.
    #[must_use]
    pub fn entry(&self, index: Index) -> Option<&CatalogEntry> {
        self.entries.get(&index)
    }

    /// The DGP record governing `index`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownIndex`] if the catalog does not contain `index`.
    pub fn dgp_of(&self, index: Index) -> Result<&DgpRecord> {
        if !self.contains(index) {
            return Err(Error::UnknownIndex(index));
        }
        // partition validation guarantees a covering range for every entry
        dgp_covering(&self.dgps, index).ok_or(Error::UnknownIndex(index))
    }

    /// Smallest and largest known index.
    #[must_use]
    pub const fn range(&self) -> (Index, Index) {
        self.domain
    }

    /// Number of known indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty (it never is after a successful load).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All known indices, sorted.
    #[must_use]
    pub fn indices(&self) -> Vec<Index> {
        let mut out: Vec<Index> = self.entries.keys().copied().collect();
        out.sort_unstable();
        out
    }

    /// All DGP records, sorted by first index.
    #[must_use]
    pub fn dgps(&self) -> &[DgpRecord] {
        &self.dgps
    }

    /// When this catalog snapshot was built.
    #[must_use]
    pub const fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Indices generated by DGPs of the given difficulty tier, sorted.
    #[must_use]
    pub fn indices_for_tier(&self, tier: DifficultyTier) -> Vec<Index> {
        let mut out: Vec<Index> = self
            .entries
            .keys()
            .copied()
            .filter(|&i| {
                dgp_covering(&self.dgps, i).is_some_and(|d| d.difficulty_tier == tier)
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Sample `n` distinct indices without replacement, optionally filtered
    /// by tier. A fixed `seed` makes the draw reproducible. The result is
    /// sorted.
    ///
    /// # Errors
    ///
    /// [`Error::NotEnoughIndices`] if fewer than `n` indices match.
    pub fn sample(
        &self,
        n: usize,
        tier: Option<DifficultyTier>,
        seed: Option<u64>,
    ) -> Result<Vec<Index>> {
        let eligible = tier.map_or_else(|| self.indices(), |t| self.indices_for_tier(t));
        if n > eligible.len() {
            return Err(Error::NotEnoughIndices {
                requested: n,
                available: eligible.len(),
            });
        }
        let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let mut picked: Vec<Index> = rand_index::sample(&mut rng, eligible.len(), n)
            .into_iter()
            .map(|i| eligible[i])
            .collect();
        picked.sort_unstable();
        Ok(picked)
    }
}

/// Binary search for the DGP range covering `index` (ranges sorted and
/// disjoint after validation).
fn dgp_covering(sorted_dgps: &[DgpRecord], index: Index) -> Option<&DgpRecord> {
    let position = sorted_dgps.partition_point(|d| d.last_index < index);
    sorted_dgps.get(position).filter(|d| d.covers(index))
}

fn validate_partition(sorted_dgps: &[DgpRecord]) -> std::result::Result<(), CatalogLoadError> {
    let mut seen_ids: Vec<u32> = Vec::with_capacity(sorted_dgps.len());
    for dgp in sorted_dgps {
        if dgp.first_index > dgp.last_index {
            return Err(CatalogLoadError::InvalidRange {
                dgp: dgp.dgp,
                first: dgp.first_index,
                last: dgp.last_index,
            });
        }
        if seen_ids.contains(&dgp.dgp) {
            return Err(CatalogLoadError::DuplicateDgp(dgp.dgp));
        }
        seen_ids.push(dgp.dgp);
    }
    for pair in sorted_dgps.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.first_index <= prev.last_index {
            return Err(CatalogLoadError::OverlappingDgps {
                dgp_a: prev.dgp,
                dgp_b: next.dgp,
                first: next.first_index,
                last: prev.last_index.min(next.last_index),
            });
        }
    }
    Ok(())
}

/// Compress sorted indices into a short `1..=3, 7, 9..=12` style string.
fn format_index_runs(indices: &[Index]) -> String {
    const MAX_RUNS: usize = 8;
    let mut runs: Vec<(Index, Index)> = Vec::new();
    for &index in indices {
        match runs.last_mut() {
            Some((_, last)) if *last + 1 == index => *last = index,
            _ => runs.push((index, index)),
        }
    }
    let mut parts: Vec<String> = runs
        .iter()
        .take(MAX_RUNS)
        .map(|&(first, last)| {
            if first == last {
                first.to_string()
            } else {
                format!("{first}..={last}")
            }
        })
        .collect();
    if runs.len() > MAX_RUNS {
        parts.push(format!("({} more runs)", runs.len() - MAX_RUNS));
    }
    parts.join(", ")
}

/// Fetches and parses the metadata documents into a [`Catalog`].
pub struct CatalogLoader {
    store: Arc<dyn ObjectStore>,
    layout: KeyLayout,
}

impl CatalogLoader {
    /// Loader reading through `store` with the given key layout.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, layout: KeyLayout) -> Self {
        Self { store, layout }
    }

    /// Fetch, parse and validate a fresh catalog.
    ///
    /// # Errors
    ///
    /// [`CatalogLoadError`] on fetch failure, malformed JSON, or a violated
    /// partition invariant. No partial catalog is ever returned.
    pub async fn load(&self) -> std::result::Result<Catalog, CatalogLoadError> {
        let metadata_key = self.layout.metadata_key();
        let payload = self.store.get(&metadata_key).await?;
        let records: Vec<SimulationRecord> =
            serde_json::from_slice(&payload).map_err(|e| CatalogLoadError::Malformed {
                key: metadata_key,
                reason: e.to_string(),
            })?;

        let dgp_info_key = self.layout.dgp_info_key();
        let payload = self.store.get(&dgp_info_key).await?;
        let info: DgpInfo =
            serde_json::from_slice(&payload).map_err(|e| CatalogLoadError::Malformed {
                key: dgp_info_key,
                reason: e.to_string(),
            })?;

        let catalog = Catalog::from_parts(records, info.dgps, &self.layout)?;
        info!(
            indices = catalog.len(),
            dgps = catalog.dgps().len(),
            range = ?catalog.range(),
            "catalog loaded"
        );
        Ok(catalog)
    }
}

/// Shared handle to the current catalog with atomic-swap reload.
///
/// `snapshot` hands out an `Arc` to the frozen catalog; a concurrent
/// `install` swaps the pointer and never disturbs snapshots already taken.
pub struct CatalogHandle {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogHandle {
    /// Wrap an initial catalog.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// The current catalog snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(
            &self
                .current
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Atomically replace the current catalog.
    pub fn install(&self, catalog: Catalog) {
        let fresh = Arc::new(catalog);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        info!(indices = fresh.len(), "installing reloaded catalog");
        *guard = fresh;
    }

    /// Fetch a fresh catalog and swap it in. A failed load leaves the
    /// previous catalog installed.
    ///
    /// # Errors
    ///
    /// Propagates [`CatalogLoadError`] from the loader.
    pub async fn reload(
        &self,
        loader: &CatalogLoader,
    ) -> std::result::Result<(), CatalogLoadError> {
        let fresh = loader.load().await?;
        self.install(fresh);
        Ok(())
    }
}

impl std::fmt::Debug for CatalogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("CatalogHandle")
            .field("indices", &snapshot.len())
            .field("loaded_at", &snapshot.loaded_at())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use bytes::Bytes;

    fn record(index: Index, dgp: u32) -> SimulationRecord {
        SimulationRecord {
            index,
            filename: None,
            truth_filename: None,
            has_simulation: true,
            has_truth: true,
            dgp,
        }
    }

    fn dgp(id: u32, first: Index, last: Index, tier: DifficultyTier) -> DgpRecord {
        DgpRecord {
            dgp: id,
            first_index: first,
            last_index: last,
            confounding_strength: "Strong".to_string(),
            confounding_source: "Both".to_string(),
            impact_heterogeneity: "High".to_string(),
            idiosyncrasy_of_impacts: "Low".to_string(),
            difficulty_tier: tier,
        }
    }

    fn small_catalog() -> Catalog {
        let records = (1..=6).map(|i| record(i, if i <= 3 { 1 } else { 2 })).collect();
        let dgps = vec![
            dgp(1, 1, 3, DifficultyTier::Easy),
            dgp(2, 4, 6, DifficultyTier::Hard),
        ];
        Catalog::from_parts(records, dgps, &KeyLayout::default()).unwrap()
    }

    #[test]
    fn lookups_over_a_valid_catalog() {
        let catalog = small_catalog();
        assert_eq!(catalog.len(), 6);
        assert_eq!(catalog.range(), (1, 6));
        assert!(catalog.contains(3));
        assert!(!catalog.contains(7));
        assert!(catalog.exists(3, ArtifactKind::Simulation));
        assert_eq!(catalog.dgp_of(5).unwrap().dgp, 2);
        assert!(matches!(
            catalog.dgp_of(99),
            Err(Error::UnknownIndex(99))
        ));
        assert_eq!(
            catalog.entry(1).unwrap().simulation_key.as_deref(),
            Some("acic22/simulations/sim_0001.parquet")
        );
    }

    #[test]
    fn availability_flags_gate_object_keys() {
        let mut records: Vec<SimulationRecord> = vec![record(1, 1), record(2, 1)];
        records[1].has_truth = false;
        let catalog = Catalog::from_parts(
            records,
            vec![dgp(1, 1, 2, DifficultyTier::Medium)],
            &KeyLayout::default(),
        )
        .unwrap();

        assert!(catalog.exists(2, ArtifactKind::Simulation));
        assert!(!catalog.exists(2, ArtifactKind::GroundTruth));
    }

    #[test]
    fn filename_override_is_respected() {
        let mut rec = record(1, 1);
        rec.filename = Some("sim_0001_reexport.parquet".to_string());
        let catalog = Catalog::from_parts(
            vec![rec],
            vec![dgp(1, 1, 1, DifficultyTier::Easy)],
            &KeyLayout::default(),
        )
        .unwrap();
        assert_eq!(
            catalog.entry(1).unwrap().simulation_key.as_deref(),
            Some("acic22/simulations/sim_0001_reexport.parquet")
        );
    }

    #[test]
    fn overlapping_ranges_are_rejected_with_indices() {
        let records = (1..=10).map(|i| record(i, 1)).collect();
        let dgps = vec![
            dgp(1, 1, 6, DifficultyTier::Easy),
            dgp(2, 5, 10, DifficultyTier::Easy),
        ];
        let err = Catalog::from_parts(records, dgps, &KeyLayout::default()).unwrap_err();
        assert!(matches!(
            err,
            CatalogLoadError::OverlappingDgps {
                dgp_a: 1,
                dgp_b: 2,
                first: 5,
                last: 6
            }
        ));
    }

    #[test]
    fn gapped_partition_is_rejected_with_runs() {
        let records = (1..=10).map(|i| record(i, 1)).collect();
        let dgps = vec![dgp(1, 1, 4, DifficultyTier::Easy)];
        let err = Catalog::from_parts(records, dgps, &KeyLayout::default()).unwrap_err();
        match err {
            CatalogLoadError::UncoveredIndices { uncovered } => {
                assert_eq!(uncovered, "5..=10");
            }
            other => panic!("expected UncoveredIndices, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let records = vec![record(1, 1), record(1, 1)];
        let err = Catalog::from_parts(
            records,
            vec![dgp(1, 1, 1, DifficultyTier::Easy)],
            &KeyLayout::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CatalogLoadError::DuplicateIndex(1)));
    }

    #[test]
    fn record_range_disagreement_is_rejected() {
        let records = vec![record(1, 2)];
        let err = Catalog::from_parts(
            records,
            vec![dgp(1, 1, 1, DifficultyTier::Easy)],
            &KeyLayout::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CatalogLoadError::DgpMismatch {
                index: 1,
                declared: 2,
                assigned: 1
            }
        ));
    }

    #[test]
    fn empty_metadata_is_rejected() {
        let err =
            Catalog::from_parts(Vec::new(), Vec::new(), &KeyLayout::default()).unwrap_err();
        assert!(matches!(err, CatalogLoadError::Empty));
    }

    #[test]
    fn tier_selection_is_strict() {
        let catalog = small_catalog();
        assert_eq!(catalog.indices_for_tier(DifficultyTier::Easy), vec![1, 2, 3]);
        assert_eq!(catalog.indices_for_tier(DifficultyTier::Hard), vec![4, 5, 6]);
        assert!(catalog.indices_for_tier(DifficultyTier::VeryEasy).is_empty());
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let catalog = small_catalog();
        let a = catalog.sample(3, None, Some(17)).unwrap();
        let b = catalog.sample(3, None, Some(17)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert!(a.windows(2).all(|w| w[0] < w[1]));

        let hard_only = catalog
            .sample(2, Some(DifficultyTier::Hard), Some(17))
            .unwrap();
        assert!(hard_only.iter().all(|i| (4..=6).contains(i)));

        assert!(matches!(
            catalog.sample(7, None, Some(17)),
            Err(Error::NotEnoughIndices {
                requested: 7,
                available: 6
            })
        ));
    }

    #[test]
    fn handle_swaps_atomically() {
        let handle = CatalogHandle::new(small_catalog());
        let before = handle.snapshot();
        assert_eq!(before.len(), 6);

        let records = vec![record(1, 1)];
        let replacement = Catalog::from_parts(
            records,
            vec![dgp(1, 1, 1, DifficultyTier::Easy)],
            &KeyLayout::default(),
        )
        .unwrap();
        handle.install(replacement);

        // old snapshot is undisturbed, new snapshot sees the swap
        assert_eq!(before.len(), 6);
        assert_eq!(handle.snapshot().len(), 1);
    }

    #[test]
    fn index_runs_format_compactly() {
        assert_eq!(format_index_runs(&[1, 2, 3, 7, 9, 10]), "1..=3, 7, 9..=10");
        assert_eq!(format_index_runs(&[5]), "5");
    }

    #[tokio::test]
    async fn loader_reads_metadata_documents() {
        let store = Arc::new(MemoryObjectStore::new());
        let layout = KeyLayout::default();
        let metadata = serde_json::json!([
            { "index": 1, "dgp": 1 },
            { "index": 2, "dgp": 1, "has_truth": false },
        ]);
        let dgp_info = serde_json::json!({
            "dgps": [{
                "dgp": 1,
                "first_index": 1,
                "last_index": 2,
                "confounding_strength": "Weak",
                "confounding_source": "None",
                "impact_heterogeneity": "Low",
                "idiosyncrasy_of_impacts": "Low",
                "difficulty_tier": "very_easy"
            }]
        });
        store.insert(
            layout.metadata_key(),
            Bytes::from(serde_json::to_vec(&metadata).unwrap()),
        );
        store.insert(
            layout.dgp_info_key(),
            Bytes::from(serde_json::to_vec(&dgp_info).unwrap()),
        );

        let loader = CatalogLoader::new(store, layout);
        let catalog = loader.load().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(!catalog.exists(2, ArtifactKind::GroundTruth));
        assert_eq!(
            catalog.dgp_of(1).unwrap().difficulty_tier,
            DifficultyTier::VeryEasy
        );
    }

    #[tokio::test]
    async fn loader_reports_malformed_documents() {
        let store = Arc::new(MemoryObjectStore::new());
        let layout = KeyLayout::default();
        store.insert(layout.metadata_key(), Bytes::from_static(b"{ not json"));

        let loader = CatalogLoader::new(store, layout.clone());
        let err = loader.load().await.unwrap_err();
        assert!(matches!(
            err,
            CatalogLoadError::Malformed { ref key, .. } if *key == layout.metadata_key()
        ));
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_catalog() {
        let handle = CatalogHandle::new(small_catalog());
        let store = Arc::new(MemoryObjectStore::new()); // no metadata documents
        let loader = CatalogLoader::new(store, KeyLayout::default());

        assert!(handle.reload(&loader).await.is_err());
        assert_eq!(handle.snapshot().len(), 6);
    }
}
