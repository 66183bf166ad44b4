//! Pluggable index engines.
//!
//! An engine owns the structure that accelerates search over the shared
//! vector store; the store itself (vectors, labels, deletion state) is
//! engine-agnostic. Engines are driven exclusively through work-spaces so
//! their hot paths stay allocation-free.

pub mod flat;
pub mod hnsw;

use crate::error::{IndexError, Result};
use crate::index::{HnswIndexOption, IndexOption, SearchContext};
use crate::store::VectorStore;
use crate::types::{EngineType, Location};
use crate::workspace::WorkSpace;
use std::io::{Read, Write};
use std::sync::Arc;

/// Lifecycle and query contract every engine implements.
///
/// Preconditions are shared across implementations: `add_vector` runs after
/// the vector bytes are already in the store, `remove_vector` runs after the
/// store has dropped the location, and `search_vector` reads the prepared
/// query from the work-space and leaves the ranked hits in
/// `ws.best_l_nodes`.
pub trait Engine: Send + Sync {
    /// Allocates a work-space shaped for this engine.
    fn make_workspace(&self) -> WorkSpace;

    /// Optional extra preparation of a pooled work-space.
    fn setup_workspace(&self, ws: &mut WorkSpace);

    /// Wires `loc` into the engine's structure.
    fn add_vector(&self, ws: &mut WorkSpace, loc: Location) -> Result<()>;

    /// Reacts to an in-place overwrite of the vector at `loc`.
    fn update_vector(&self, ws: &mut WorkSpace, loc: Location) -> Result<()>;

    /// Reacts to the lazy deletion of `loc`.
    fn remove_vector(&self, loc: Location) -> Result<()>;

    /// Fills `ws.best_l_nodes` with the best `k` hits for the prepared
    /// query.
    fn search_vector(&self, ws: &mut WorkSpace, ctx: &SearchContext<'_>) -> Result<()>;

    /// Serializes the engine blob.
    fn save(&self, w: &mut dyn Write) -> Result<()>;

    /// Restores the engine blob.
    fn load(&mut self, r: &mut dyn Read) -> Result<()>;

    /// True when the engine accepts incremental adds and removes.
    fn support_dynamic(&self) -> bool;

    /// True when the engine needs offline model training before serving.
    fn need_model(&self) -> bool;
}

/// Builds the engine selected by `option.engine`.
///
/// # Errors
///
/// [`IndexError::Unavailable`] for engine families that are not built
/// in-core (Vamana beyond its shared pruning primitives, PQ, SPTAG).
pub fn create_engine(
    option: &IndexOption,
    hnsw_option: &HnswIndexOption,
    store: Arc<VectorStore>,
) -> Result<Box<dyn Engine>> {
    match option.engine {
        EngineType::Flat => Ok(Box::new(flat::FlatEngine::new(store))),
        EngineType::Hnsw => Ok(Box::new(hnsw::HnswEngine::new(store, hnsw_option))),
        EngineType::Vamana | EngineType::Pq | EngineType::Sptag => Err(IndexError::Unavailable(
            format!("engine {:?} is not built in-core", option.engine),
        )),
    }
}
