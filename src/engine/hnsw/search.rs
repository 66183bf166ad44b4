//! HNSW search: greedy upper-layer descent plus filtered base-layer
//! expansion.

use super::HnswEngine;
use crate::error::Result;
use crate::index::SearchContext;
use crate::queue::NeighborEntity;
use crate::types::{FilterFn, Location, UNKNOWN_LOCATION};
use crate::workspace::{HnswScratch, WorkSpace};

impl HnswEngine {
    fn admissible(&self, loc: Location, filter: Option<&FilterFn<'_>>) -> bool {
        if self.store.is_deleted(loc) {
            return false;
        }
        match filter {
            None => true,
            Some(f) => self.store.label_of(loc).is_some_and(f),
        }
    }

    /// Best-first expansion at layer 0 with the runtime list size.
    ///
    /// Deleted and filter-rejected locations are expanded but never emitted,
    /// so the traversal keeps flowing through them and the graph stays
    /// navigable under heavy filtering.
    fn search_base_layer_st(
        &self,
        scratch: &mut HnswScratch,
        q: &[u8],
        ep: Location,
        ef: usize,
        filter: Option<&FilterFn<'_>>,
    ) {
        scratch.top_candidates.clear();
        scratch.top_candidates.reserve(ef);
        scratch.candidate_set.clear();
        scratch.candidate_set.reserve(ef);
        scratch.visited.resize(self.store.current_index());
        scratch.visited.reset();

        let d = self.store.get_distance(q, ep);
        scratch.visited.visit(ep);
        scratch.candidate_set.insert_loc(d, ep);
        if self.admissible(ep, filter) {
            scratch.top_candidates.insert_loc(d, ep);
        }

        while scratch.candidate_set.has_unexpanded_node() {
            let cur = scratch.candidate_set.closest_unexpanded();
            if scratch.top_candidates.len() == ef
                && cur.distance > scratch.top_candidates.top().distance
            {
                break;
            }
            scratch.link_scratch.clear();
            self.graph.with_links(cur.loc, 0, |links| {
                scratch.link_scratch.extend(links.iter());
            });
            for i in 0..scratch.link_scratch.len() {
                let n = scratch.link_scratch[i];
                if !scratch.visited.visit(n) {
                    continue;
                }
                let d = self.store.get_distance(q, n);
                let full = scratch.top_candidates.len() == ef;
                if !full || d < scratch.top_candidates.top().distance {
                    scratch.candidate_set.insert_loc(d, n);
                    if self.admissible(n, filter) {
                        scratch.top_candidates.insert_loc(d, n);
                    }
                }
            }
        }
    }

    /// Full query: descend to layer 1 with single-best hops, expand layer 0
    /// with `ef = max(search_list, k)`, then emit the best `k` labeled hits.
    pub(super) fn search_vector_internal(
        &self,
        ws: &mut WorkSpace,
        ctx: &SearchContext<'_>,
    ) -> Result<()> {
        let k = ctx.k;
        let entry = self.snapshot_entry();
        let (q, best, scratch) = ws.split();
        best.reserve(k);
        if entry.node == UNKNOWN_LOCATION {
            return Ok(());
        }
        let scratch = scratch.as_hnsw_mut()?;

        let base_ef = if ctx.search_list > 0 {
            ctx.search_list
        } else {
            self.ef_default
        };
        let ef = base_ef.max(k);

        let mut cur = entry.node;
        let mut cur_dist = self.store.get_distance(q, cur);
        for l in (1..=entry.level).rev() {
            cur = self.greedy_descend(q, cur, &mut cur_dist, l);
        }

        self.search_base_layer_st(scratch, q, cur, ef, ctx.filter);

        let n = scratch.top_candidates.len().min(k);
        for i in 0..n {
            let e = scratch.top_candidates.get(i);
            if let Some(label) = self.store.label_of(e.loc) {
                best.insert(NeighborEntity::with_label(e.distance, label, e.loc));
            }
        }
        Ok(())
    }
}
