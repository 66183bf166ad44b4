//! Exhaustive-scan engine.
//!
//! All state lives in the vector store, so insertion and removal are no-ops
//! here. Search seeds the result queue with the first `min(size, k)`
//! admissible locations, then streams the rest, inserting only candidates
//! that beat the current worst hit.

use super::Engine;
use crate::error::Result;
use crate::index::SearchContext;
use crate::queue::NeighborEntity;
use crate::store::VectorStore;
use crate::types::{Distance, Location};
use crate::workspace::{EngineScratch, WorkSpace};
use std::io::{Read, Write};
use std::sync::Arc;

/// Brute-force engine over the shared store.
pub struct FlatEngine {
    store: Arc<VectorStore>,
}

impl FlatEngine {
    /// Binds the engine to its data store.
    #[must_use]
    pub fn new(store: Arc<VectorStore>) -> Self {
        Self { store }
    }
}

impl Engine for FlatEngine {
    fn make_workspace(&self) -> WorkSpace {
        WorkSpace::new(self.store.space(), EngineScratch::Flat)
    }

    fn setup_workspace(&self, _ws: &mut WorkSpace) {}

    fn add_vector(&self, _ws: &mut WorkSpace, _loc: Location) -> Result<()> {
        Ok(())
    }

    fn update_vector(&self, _ws: &mut WorkSpace, _loc: Location) -> Result<()> {
        Ok(())
    }

    fn remove_vector(&self, _loc: Location) -> Result<()> {
        Ok(())
    }

    fn search_vector(&self, ws: &mut WorkSpace, ctx: &SearchContext<'_>) -> Result<()> {
        let (query, results, _) = ws.split();
        let store = &self.store;
        let data_size = store.current_index();
        let k = ctx.k;
        results.reserve(k);

        let admit = |loc: Location| -> Option<u64> {
            let label = store.label_of(loc)?;
            match ctx.filter {
                Some(f) if !f(label) => None,
                _ => Some(label),
            }
        };

        let first_travel = data_size.min(k);
        for i in 0..first_travel {
            let loc = i as Location;
            let Some(label) = admit(loc) else { continue };
            let d = store.get_distance(query, loc);
            results.insert(NeighborEntity::with_label(d, label, loc));
        }

        let mut lastdist = if results.is_empty() {
            Distance::MAX
        } else {
            results.top().distance
        };
        for i in first_travel.max(k)..data_size {
            let loc = i as Location;
            let Some(label) = admit(loc) else { continue };
            let d = store.get_distance(query, loc);
            if d < lastdist || results.len() < k {
                results.insert(NeighborEntity::with_label(d, label, loc));
                if !results.is_empty() {
                    lastdist = results.top().distance;
                }
            }
        }
        Ok(())
    }

    fn save(&self, _w: &mut dyn Write) -> Result<()> {
        Ok(())
    }

    fn load(&mut self, _r: &mut dyn Read) -> Result<()> {
        Ok(())
    }

    fn support_dynamic(&self) -> bool {
        true
    }

    fn need_model(&self) -> bool {
        false
    }
}
