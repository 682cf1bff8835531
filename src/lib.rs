//! # cidl: index-consistent access to the ACIC-2022 simulation corpus
//!
//! The corpus stores three linked artifact families on S3-compatible object
//! storage — simulation tables, matched ground-truth tables, and
//! data-generating-process (DGP) metadata — joined by a single integer key
//! space. This crate resolves an index (or a batch of indices) into the
//! correct, matched, schema-consistent triple, or a precise description of
//! why it is not one: missing artifact, transport failure, schema drift, or
//! unknown index. Nothing is ever silently dropped or repaired.
//!
//! ## Layers
//!
//! - [`store`]: object-store seam (`ObjectStore` trait) and deterministic
//!   key layout; the HTTP transport lives outside this crate.
//! - [`codec`]: Parquet bytes → Arrow record batch.
//! - [`catalog`]: the frozen registry of which indices exist per artifact
//!   kind and which DGP governs them, with atomic-swap reload.
//! - [`cache`]: bounded LRU cache of decoded artifacts with single-flight
//!   loads.
//! - [`schema`]: canonical column set/order/type per artifact kind.
//! - [`resolver`]: batch resolution with exhaustive per-index accounting.
//! - [`export`]: the flat estimate table consumed by downstream scoring.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cidl::catalog::{CatalogHandle, CatalogLoader};
//! use cidl::config::ResolverConfig;
//! use cidl::store::{KeyLayout, MemoryObjectStore};
//! use cidl::Resolver;
//!
//! # async fn example() -> cidl::Result<()> {
//! let store: Arc<MemoryObjectStore> = Arc::new(MemoryObjectStore::new());
//! let loader = CatalogLoader::new(store.clone(), KeyLayout::default());
//! let catalog = Arc::new(CatalogHandle::new(loader.load().await?));
//! let resolver = Resolver::new(catalog, store, ResolverConfig::default());
//!
//! let result = resolver.resolve(1u32..=10).await;
//! for (index, triple) in &result.matched {
//!     println!("{index}: {} simulation rows", triple.simulation.num_rows());
//! }
//! for index in &result.missing_ground_truth {
//!     eprintln!("{index}: no ground truth in the catalog");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cache;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod resolver;
pub mod schema;
pub mod store;

pub use error::{Error, Result};
pub use resolver::{MatchedTriple, MismatchReport, ResolveResult, Resolver};
pub use schema::ArtifactKind;

/// Integer key joining a simulation to its ground truth across all artifact
/// kinds. The corpus currently spans 1..=3400, but nothing in this crate
/// assumes that bound.
pub type Index = u32;
