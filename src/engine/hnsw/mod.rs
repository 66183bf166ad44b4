//! Hierarchical navigable small-world graph engine.
//!
//! Layered proximity graph with heuristic pruning, concurrent insertion,
//! filtered search, and lazy deletion. Deleted locations stay in the graph
//! and keep routing traffic; they are only excluded from emitted results.
//! The entrypoint is never allowed to point at a deleted location.

pub mod graph;
mod insert;
mod search;
pub mod visited;

use super::Engine;
use crate::error::Result;
use crate::index::{HnswIndexOption, SearchContext};
use crate::io;
use crate::store::VectorStore;
use crate::types::{Location, UNKNOWN_LOCATION};
use crate::workspace::{EngineScratch, HnswScratch, WorkSpace};
use graph::LeveledGraph;
use log::debug;
use parking_lot::Mutex;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::{Read, Write};
use std::sync::Arc;

#[derive(Clone, Copy, Debug)]
pub(crate) struct EntryPoint {
    pub node: Location,
    pub level: i32,
}

/// HNSW engine over the shared store.
pub struct HnswEngine {
    store: Arc<VectorStore>,
    m: usize,
    max_m0: usize,
    ef_construction: usize,
    ef_default: usize,
    mult: f64,
    graph: LeveledGraph,
    entry: Mutex<EntryPoint>,
    level_rng: Mutex<ChaCha8Rng>,
}

impl HnswEngine {
    /// Builds an empty engine sized for the store's element ceiling.
    #[must_use]
    pub fn new(store: Arc<VectorStore>, option: &HnswIndexOption) -> Self {
        let m = option.m.max(2);
        let graph = LeveledGraph::new(store.max_elements(), m as u32);
        Self {
            m,
            max_m0: 2 * m,
            ef_construction: option.ef_construction.max(m),
            ef_default: option.ef.max(1),
            mult: 1.0 / (m as f64).ln(),
            graph,
            entry: Mutex::new(EntryPoint {
                node: UNKNOWN_LOCATION,
                level: -1,
            }),
            level_rng: Mutex::new(ChaCha8Rng::seed_from_u64(option.random_seed)),
            store,
        }
    }

    /// The current entrypoint, for introspection and tests.
    #[must_use]
    pub fn entrypoint(&self) -> Option<(Location, i32)> {
        let e = self.entry.lock();
        (e.node != UNKNOWN_LOCATION).then_some((e.node, e.level))
    }

    pub(crate) fn snapshot_entry(&self) -> EntryPoint {
        *self.entry.lock()
    }

    /// Reassigns the entrypoint after a deletion hits it: the highest-level
    /// live location wins, ties broken by lowest location.
    fn repair_entrypoint(&self, removed: Location) {
        let mut entry = self.entry.lock();
        if entry.node != removed {
            return;
        }
        let mut best = EntryPoint {
            node: UNKNOWN_LOCATION,
            level: -1,
        };
        for idx in 0..self.store.current_index() {
            let loc = idx as Location;
            if loc == removed || self.store.is_deleted(loc) {
                continue;
            }
            let level = self.graph.level(loc);
            if level > best.level {
                best = EntryPoint { node: loc, level };
            }
        }
        debug!(
            "entrypoint moved off deleted location {removed} to {:?}",
            (best.node, best.level)
        );
        *entry = best;
    }
}

impl Engine for HnswEngine {
    fn make_workspace(&self) -> WorkSpace {
        WorkSpace::new(
            self.store.space(),
            EngineScratch::Hnsw(Box::new(HnswScratch::default())),
        )
    }

    fn setup_workspace(&self, ws: &mut WorkSpace) {
        if let Ok(scratch) = ws.hnsw_mut() {
            scratch.visited.resize(self.store.current_index());
        }
    }

    fn add_vector(&self, ws: &mut WorkSpace, loc: Location) -> Result<()> {
        self.add_vector_internal(ws, loc)
    }

    fn update_vector(&self, ws: &mut WorkSpace, loc: Location) -> Result<()> {
        self.update_vector_internal(ws, loc)
    }

    fn remove_vector(&self, loc: Location) -> Result<()> {
        // The store has already flipped the deleted bit; graph links stay in
        // place so traversal keeps flowing through the location.
        self.repair_entrypoint(loc);
        Ok(())
    }

    fn search_vector(&self, ws: &mut WorkSpace, ctx: &SearchContext<'_>) -> Result<()> {
        self.search_vector_internal(ws, ctx)
    }

    fn save(&self, w: &mut dyn Write) -> Result<()> {
        let entry = self.snapshot_entry();
        io::write_u32(w, entry.node)?;
        io::write_i32(w, entry.level)?;
        self.graph.save(w)
    }

    fn load(&mut self, r: &mut dyn Read) -> Result<()> {
        let node = io::read_u32(r)?;
        let level = io::read_i32(r)?;
        self.graph.load(r)?;
        *self.entry.lock() = EntryPoint { node, level };
        Ok(())
    }

    fn support_dynamic(&self) -> bool {
        true
    }

    fn need_model(&self) -> bool {
        false
    }
}
