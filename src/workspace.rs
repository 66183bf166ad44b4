//! Per-operation scratch space and the blocking pool that recycles it.
//!
//! A [`WorkSpace`] bundles everything one query or insert needs to run
//! without touching the allocator: the aligned query buffer that
//! preprocessing writes into, the result queue, and engine-specific scratch.
//! Work-spaces are checked out of a [`WorkSpacePool`] and returned cleared,
//! with capacity retained.

use crate::alloc::AlignedBytes;
use crate::engine::hnsw::visited::VisitedList;
use crate::error::{IndexError, Result};
use crate::queue::{NeighborEntity, NeighborQueue};
use crate::space::VectorSpace;
use crate::types::{Distance, Location};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;

/// Scratch owned by the HNSW engine's traversals.
#[derive(Debug, Default)]
pub struct HnswScratch {
    /// Result-side bounded set for base-layer expansion.
    pub top_candidates: NeighborQueue,
    /// Frontier-side bounded set for base-layer expansion.
    pub candidate_set: NeighborQueue,
    /// Survivors of heuristic neighbor selection.
    pub return_list: Vec<(Distance, Location)>,
    /// Link copies taken under node locks during expansion.
    pub link_scratch: Vec<Location>,
    /// Version-stamped visited marks.
    pub visited: VisitedList,
}

impl HnswScratch {
    fn clear(&mut self) {
        self.top_candidates.clear();
        self.candidate_set.clear();
        self.return_list.clear();
        self.link_scratch.clear();
    }
}

/// Scratch used by the Vamana-style pruning primitives.
#[derive(Debug, Default)]
pub struct VamanaScratch {
    /// Candidate pool sorted by distance to the reference point.
    pub pool: Vec<NeighborEntity>,
    /// Per-candidate occlusion factors.
    pub occlude_factor: Vec<f64>,
    /// Pruned neighbor output.
    pub pruned: Vec<Location>,
    /// Expanded-node staging used by re-prune passes.
    pub expanded: Vec<NeighborEntity>,
    /// Dedup set for pool construction.
    pub inserted: FxHashSet<Location>,
}

impl VamanaScratch {
    fn clear(&mut self) {
        self.pool.clear();
        self.occlude_factor.clear();
        self.pruned.clear();
        self.expanded.clear();
        self.inserted.clear();
    }
}

/// Engine-specific extension of a work-space.
#[derive(Debug)]
pub enum EngineScratch {
    /// The flat engine needs nothing beyond the common fields.
    Flat,
    /// HNSW traversal state.
    Hnsw(Box<HnswScratch>),
    /// Vamana pruning state.
    Vamana(Box<VamanaScratch>),
}

impl EngineScratch {
    /// The HNSW scratch, or an internal error for foreign scratch kinds.
    pub fn as_hnsw_mut(&mut self) -> Result<&mut HnswScratch> {
        match self {
            EngineScratch::Hnsw(s) => Ok(s),
            _ => Err(IndexError::Internal(
                "work-space does not carry HNSW scratch".into(),
            )),
        }
    }

    /// The Vamana scratch, or an internal error for foreign scratch kinds.
    pub fn as_vamana_mut(&mut self) -> Result<&mut VamanaScratch> {
        match self {
            EngineScratch::Vamana(s) => Ok(s),
            _ => Err(IndexError::Internal(
                "work-space does not carry Vamana scratch".into(),
            )),
        }
    }
}

/// Pooled per-query/per-insert scratch.
#[derive(Debug)]
pub struct WorkSpace {
    query: AlignedBytes,
    query_len: usize,
    /// Final ranked hits, filled by the engine's search.
    pub best_l_nodes: NeighborQueue,
    /// Engine extension.
    pub scratch: EngineScratch,
}

impl WorkSpace {
    /// Builds a work-space whose query buffer matches the space's vector
    /// byte size.
    #[must_use]
    pub fn new(space: &VectorSpace, scratch: EngineScratch) -> Self {
        Self {
            query: AlignedBytes::zeroed(space.vector_byte_size()),
            query_len: 0,
            best_l_nodes: NeighborQueue::new(),
            scratch,
        }
    }

    /// Copies `raw` into the aligned buffer, normalizing when the metric
    /// requires it and the caller has not already normalized.
    pub fn prepare_query(&mut self, space: &VectorSpace, raw: &[u8], is_normalized: bool) {
        let kernel = space.kernel();
        if is_normalized || !kernel.preprocessing_required() {
            self.query.as_mut_slice()[..raw.len()].copy_from_slice(raw);
        } else {
            kernel.preprocess_query(raw, self.query.as_mut_slice());
        }
        self.query_len = raw.len();
    }

    /// The prepared aligned query bytes.
    #[must_use]
    pub fn query(&self) -> &[u8] {
        &self.query.as_slice()[..self.query_len]
    }

    /// The HNSW scratch, or an internal error when the work-space belongs to
    /// another engine.
    pub fn hnsw_mut(&mut self) -> Result<&mut HnswScratch> {
        self.scratch.as_hnsw_mut()
    }

    /// The Vamana scratch, or an internal error for foreign work-spaces.
    pub fn vamana_mut(&mut self) -> Result<&mut VamanaScratch> {
        self.scratch.as_vamana_mut()
    }

    /// Splits the work-space into its disjoint parts, for engines that need
    /// the prepared query, the result queue, and the scratch at once.
    pub fn split(&mut self) -> (&[u8], &mut NeighborQueue, &mut EngineScratch) {
        (
            &self.query.as_slice()[..self.query_len],
            &mut self.best_l_nodes,
            &mut self.scratch,
        )
    }

    /// Empties queues and scratch without releasing capacity.
    pub fn clear(&mut self) {
        self.query_len = 0;
        self.best_l_nodes.clear();
        match &mut self.scratch {
            EngineScratch::Flat => {}
            EngineScratch::Hnsw(s) => s.clear(),
            EngineScratch::Vamana(s) => s.clear(),
        }
    }
}

/// Blocking pool of work-spaces.
///
/// `acquire` parks on a condition variable while the pool is empty; dropping
/// the returned guard clears the work-space, pushes it back, and wakes one
/// waiter. The pool drains naturally when the owning index is dropped.
#[derive(Debug, Default)]
pub struct WorkSpacePool {
    inner: Mutex<Vec<WorkSpace>>,
    ready: Condvar,
}

impl WorkSpacePool {
    /// Empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a work-space to the pool.
    pub fn push(&self, ws: WorkSpace) {
        self.inner.lock().push(ws);
        self.ready.notify_one();
    }

    /// Number of idle work-spaces.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.inner.lock().len()
    }

    /// Checks a work-space out, blocking while none is free.
    #[must_use]
    pub fn acquire(&self) -> PooledWorkSpace<'_> {
        let mut guard = self.inner.lock();
        loop {
            if let Some(ws) = guard.pop() {
                return PooledWorkSpace {
                    pool: self,
                    ws: Some(ws),
                };
            }
            self.ready.wait(&mut guard);
        }
    }
}

/// RAII checkout of a pooled work-space.
#[derive(Debug)]
pub struct PooledWorkSpace<'a> {
    pool: &'a WorkSpacePool,
    ws: Option<WorkSpace>,
}

impl std::ops::Deref for PooledWorkSpace<'_> {
    type Target = WorkSpace;

    fn deref(&self) -> &WorkSpace {
        self.ws.as_ref().expect("work-space present until drop")
    }
}

impl std::ops::DerefMut for PooledWorkSpace<'_> {
    fn deref_mut(&mut self) -> &mut WorkSpace {
        self.ws.as_mut().expect("work-space present until drop")
    }
}

impl Drop for PooledWorkSpace<'_> {
    fn drop(&mut self) {
        if let Some(mut ws) = self.ws.take() {
            ws.clear();
            self.pool.push(ws);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Metric};
    use std::sync::Arc;

    fn space() -> VectorSpace {
        VectorSpace::new(4, Metric::L2, DataType::F32).unwrap()
    }

    #[test]
    fn prepare_query_copies_into_aligned_buffer() {
        let s = space();
        let mut ws = WorkSpace::new(&s, EngineScratch::Flat);
        let q = [1.0f32, 2.0, 3.0, 4.0];
        ws.prepare_query(&s, bytemuck::cast_slice(&q), false);
        let out: &[f32] = bytemuck::cast_slice(ws.query());
        assert_eq!(out, &q);
        assert_eq!(ws.query().as_ptr() as usize % crate::alloc::ALIGNMENT, 0);
    }

    #[test]
    fn prepare_query_normalizes_for_normalized_metrics() {
        let s = VectorSpace::new(2, Metric::NormalizedCosine, DataType::F32).unwrap();
        let mut ws = WorkSpace::new(&s, EngineScratch::Flat);
        let q = [3.0f32, 0.0];
        ws.prepare_query(&s, bytemuck::cast_slice(&q), false);
        let out: &[f32] = bytemuck::cast_slice(ws.query());
        assert!((out[0] - 1.0).abs() < 1e-6);

        // Caller-normalized queries pass through untouched.
        ws.prepare_query(&s, bytemuck::cast_slice(&q), true);
        let out: &[f32] = bytemuck::cast_slice(ws.query());
        assert_eq!(out[0], 3.0);
    }

    #[test]
    fn scratch_accessors_enforce_engine_kind() {
        let s = space();
        let mut ws = WorkSpace::new(&s, EngineScratch::Flat);
        assert!(ws.hnsw_mut().is_err());
        let mut ws = WorkSpace::new(&s, EngineScratch::Hnsw(Box::default()));
        assert!(ws.hnsw_mut().is_ok());
        assert!(ws.vamana_mut().is_err());
    }

    #[test]
    fn pool_recycles_cleared_workspaces() {
        let s = space();
        let pool = WorkSpacePool::new();
        pool.push(WorkSpace::new(&s, EngineScratch::Flat));
        {
            let mut ws = pool.acquire();
            ws.best_l_nodes.reserve(4);
            ws.best_l_nodes.insert_loc(1.0, 1);
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);
        let ws = pool.acquire();
        assert!(ws.best_l_nodes.is_empty());
    }

    #[test]
    fn acquire_blocks_until_release() {
        let s = space();
        let pool = Arc::new(WorkSpacePool::new());
        pool.push(WorkSpace::new(&s, EngineScratch::Flat));

        let held = pool.acquire();
        let contender = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let ws = pool.acquire();
                ws.query().len()
            })
        };
        // Give the contender time to park, then release.
        std::thread::sleep(std::time::Duration::from_millis(50));
        drop(held);
        assert_eq!(contender.join().unwrap(), 0);
    }
}
