//! Process-local artifact cache.
//!
//! One slot per `(kind, index)` key, sharded locking via `DashMap` so
//! unrelated indices never contend. Each slot holds a `tokio` `OnceCell`,
//! which gives the two properties the resolver depends on:
//!
//! - **single-flight**: concurrent callers for the same key await one
//!   in-flight load instead of racing duplicate fetches;
//! - **atomic insertion**: the cell is set only with a fully decoded, fully
//!   validated artifact; a failed load removes the empty slot so the next
//!   call retries from scratch.
//!
//! Eviction is least-recently-used over a global monotone stamp, bounded by
//! a configurable resident count. In-flight slots are never evicted, and
//! callers holding an `Arc` keep their artifact alive regardless.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::schema::{Artifact, ArtifactKind};
use crate::Index;

/// Cache key: artifact kind plus index.
pub type CacheKey = (ArtifactKind, Index);

#[derive(Debug, Default)]
struct Slot {
    cell: OnceCell<Arc<Artifact>>,
    last_used: AtomicU64,
}

/// Counters exposed by [`ArtifactCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Calls served from a resident artifact without I/O.
    pub hits: u64,
    /// Loads actually executed.
    pub misses: u64,
    /// Artifacts currently resident.
    pub resident: usize,
}

/// Bounded, concurrency-safe store of decoded artifacts.
#[derive(Debug)]
pub struct ArtifactCache {
    slots: DashMap<CacheKey, Arc<Slot>>,
    capacity: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ArtifactCache {
    /// Cache bounded to `capacity` resident artifacts (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: DashMap::new(),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the artifact for `(kind, index)`, running `loader` on a miss.
    ///
    /// On a hit no I/O happens. On a miss, at most one load runs per key no
    /// matter how many callers arrive concurrently; the rest await the same
    /// result. A failed load stores nothing and the error propagates to the
    /// caller whose load ran.
    ///
    /// # Errors
    ///
    /// Whatever `loader` fails with.
    pub async fn get_or_load<F, Fut, E>(
        &self,
        index: Index,
        kind: ArtifactKind,
        loader: F,
    ) -> Result<Arc<Artifact>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Artifact, E>>,
    {
        let key = (kind, index);
        let slot = {
            let entry = self.slots.entry(key).or_default();
            Arc::clone(entry.value())
        };

        let resident_before = slot.cell.initialized();
        let outcome = slot
            .cell
            .get_or_try_init(|| async {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(index, kind = %kind, "artifact cache miss");
                loader().await.map(Arc::new)
            })
            .await;

        match outcome {
            Ok(artifact) => {
                if resident_before {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                }
                let stamp = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
                slot.last_used.store(stamp, Ordering::Relaxed);
                let artifact = Arc::clone(artifact);
                self.evict_to_capacity(key);
                Ok(artifact)
            }
            Err(error) => {
                // nothing was stored; drop the empty slot so the next call
                // retries instead of finding a dead cell
                self.slots
                    .remove_if(&key, |_, s| Arc::ptr_eq(s, &slot) && !s.cell.initialized());
                Err(error)
            }
        }
    }

    /// Remove one entry. Immediately visible to subsequent `get_or_load`.
    pub fn invalidate(&self, index: Index, kind: ArtifactKind) {
        self.slots.remove(&(kind, index));
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Number of resident (fully loaded) artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().cell.initialized())
            .count()
    }

    /// Whether no artifact is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss/resident counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            resident: self.len(),
        }
    }

    /// Evict least-recently-used resident artifacts until within capacity.
    /// Skips in-flight slots and the key that was just touched.
    fn evict_to_capacity(&self, just_used: CacheKey) {
        while self.len() > self.capacity {
            let mut victim: Option<(CacheKey, u64)> = None;
            for entry in self.slots.iter() {
                if *entry.key() == just_used || !entry.value().cell.initialized() {
                    continue;
                }
                let stamp = entry.value().last_used.load(Ordering::Relaxed);
                if victim.map_or(true, |(_, oldest)| stamp < oldest) {
                    victim = Some((*entry.key(), stamp));
                }
            }
            let Some((key, _)) = victim else { break };
            self.slots.remove(&key);
            debug!(index = key.1, kind = %key.0, "evicted least-recently-used artifact");
        }
    }
}
