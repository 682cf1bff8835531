//! Object storage seam and deterministic key layout.
//!
//! The transport itself (S3 auth, multipart, HTTP retries) lives outside
//! this crate behind the [`ObjectStore`] trait; everything in here only
//! cares about key → bytes. [`MemoryObjectStore`] is the in-process backend
//! used by tests, examples and benches.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::FetchError;
use crate::schema::ArtifactKind;
use crate::Index;

/// Opaque key→bytes object storage.
///
/// Implementations must keep "absent" and "broken" distinct:
/// [`FetchError::NotFound`] for a key that does not exist,
/// [`FetchError::Transport`] for everything below the key/value abstraction.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch an entire object.
    ///
    /// # Errors
    ///
    /// [`FetchError::NotFound`] if the key does not exist,
    /// [`FetchError::Transport`] on transport failure.
    async fn get(&self, key: &str) -> Result<Bytes, FetchError>;

    /// Existence probe without fetching the payload.
    ///
    /// # Errors
    ///
    /// [`FetchError::Transport`] on transport failure.
    async fn exists(&self, key: &str) -> Result<bool, FetchError>;
}

/// Deterministic mapping from (kind, index) and metadata documents to
/// object keys.
///
/// Every key is a pure function of its inputs; there is no listing or
/// filename parsing anywhere in the crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    prefix: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new("acic22")
    }
}

impl KeyLayout {
    /// Layout rooted at `prefix` (leading/trailing slashes trimmed).
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Root prefix all keys live under.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the artifact with the default file name for its kind.
    #[must_use]
    pub fn artifact_key(&self, kind: ArtifactKind, index: Index) -> String {
        self.named_key(kind, &kind.file_name(index))
    }

    /// Key of an artifact whose file name the catalog overrides.
    #[must_use]
    pub fn named_key(&self, kind: ArtifactKind, file_name: &str) -> String {
        format!("{}/{}/{}", self.prefix, kind.namespace(), file_name)
    }

    /// Key of the per-index simulation metadata document.
    #[must_use]
    pub fn metadata_key(&self) -> String {
        format!("{}/metadata/acic22_metadata.json", self.prefix)
    }

    /// Key of the DGP info document.
    #[must_use]
    pub fn dgp_info_key(&self) -> String {
        format!("{}/metadata/acic22_dgp_info.json", self.prefix)
    }
}

/// In-memory object store backed by a lock-free concurrent hashmap.
///
/// Counts `get` calls so tests can assert on fetch behavior (cache hits,
/// single-flight deduplication).
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Bytes>,
    get_calls: AtomicU64,
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object.
    pub fn insert(&self, key: impl Into<String>, payload: impl Into<Bytes>) {
        self.objects.insert(key.into(), payload.into());
    }

    /// Remove an object. No-op if the key is absent.
    pub fn remove(&self, key: &str) {
        self.objects.remove(key);
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// How many `get` calls the store has served (hits and misses alike).
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.get_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Bytes, FetchError> {
        self.get_calls.fetch_add(1, Ordering::Relaxed);
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| FetchError::NotFound {
                key: key.to_string(),
            })
    }

    async fn exists(&self, key: &str) -> Result<bool, FetchError> {
        Ok(self.objects.contains_key(key))
    }
}
