//! # multivec
//!
//! Multi-algorithm approximate nearest-neighbor vector index core.
//!
//! The crate ingests high-dimensional vectors (u8, f16, or f32 lanes),
//! keeps them in a batched in-memory store with stable locations and lazy
//! deletion, and answers k-NN queries under a configurable metric through
//! pluggable engines: an exhaustive [Flat](engine::flat::FlatEngine) scan
//! and a layered [HNSW](engine::hnsw::HnswEngine) proximity graph, plus the
//! Vamana-style [pruning primitives](vamana) shared by graph builders.
//!
//! ## Example
//!
//! ```rust
//! use multivec::{EngineOption, EngineType, IndexCore, IndexOption, SearchContext, WriteOption};
//!
//! let option = IndexOption {
//!     dimension: 4,
//!     engine: EngineType::Hnsw,
//!     ..IndexOption::default()
//! };
//! let index = IndexCore::create(option, EngineOption::None).expect("create index");
//!
//! let v = [1.0f32, 0.0, 0.0, 0.0];
//! index
//!     .add_vector(&WriteOption::default(), bytemuck::cast_slice(&v), 1)
//!     .expect("insert");
//!
//! let hits = index
//!     .search_vector(&SearchContext::from_f32(&v, 1))
//!     .expect("search");
//! assert_eq!(hits.results[0].1, 1);
//! ```
//!
//! ## Concurrency
//!
//! One index accepts concurrent `add_vector`, `remove_vector`, and
//! `search_vector` calls from any number of threads. Per-label striped locks
//! serialize writers of the same label, a store-wide reader-writer lock
//! keeps vector borrows valid, and the HNSW graph uses per-location locks
//! with a single O(1) entrypoint lock.

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

/// Aligned byte buffers.
pub mod alloc;

/// Bulk import/export dialects.
pub mod datasets;

/// Distance kernels and preprocessing.
pub mod distance;

/// Index engines.
pub mod engine;

/// Unified error handling.
pub mod error;

/// Index façade and public option types.
pub mod index;

/// Little-endian persistence helpers.
pub mod io;

/// Bounded ordered neighbor set.
pub mod queue;

/// Vector space configuration.
pub mod space;

/// Batched vector storage.
pub mod store;

/// Core identifiers and enums.
pub mod types;

/// Vamana-style pruning primitives.
pub mod vamana;

/// Pooled per-operation scratch.
pub mod workspace;

pub use distance::DistanceKernel;
pub use error::{IndexError, Result};
pub use index::{
    EngineOption, HnswIndexOption, IndexCore, IndexOption, InsertResult, SearchContext,
    SearchResult, SerializeOption, WriteOption,
};
pub use queue::{NeighborEntity, NeighborQueue};
pub use space::VectorSpace;
pub use store::VectorStore;
pub use types::{DataType, Distance, EngineType, Label, Location, Metric};

/// The crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
