//! HNSW insertion: level assignment, greedy descent, construction-time
//! expansion, heuristic neighbor selection, and mutual connection.

use super::{EntryPoint, HnswEngine};
use crate::error::Result;
use crate::queue::NeighborQueue;
use crate::types::{Distance, Location, UNKNOWN_LOCATION};
use crate::workspace::{HnswScratch, WorkSpace};
use rand::Rng;

impl HnswEngine {
    /// Draws `floor(-ln(U(0,1]) * mult)` from the seeded generator.
    pub(super) fn get_random_level(&self) -> i32 {
        let mut rng = self.level_rng.lock();
        let u: f64 = 1.0 - rng.gen::<f64>();
        ((-u.ln()) * self.mult) as i32
    }

    /// Moves to strictly closer neighbors at `level` until a local minimum.
    /// The distance to the query decreases monotonically per hop.
    pub(super) fn greedy_descend(
        &self,
        q: &[u8],
        mut cur: Location,
        cur_dist: &mut Distance,
        level: i32,
    ) -> Location {
        loop {
            let mut changed = false;
            self.graph.with_links(cur, level, |links| {
                for n in links.iter() {
                    let d = self.store.get_distance(q, n);
                    if d < *cur_dist {
                        *cur_dist = d;
                        cur = n;
                        changed = true;
                    }
                }
            });
            if !changed {
                return cur;
            }
        }
    }

    /// Best-first expansion at `layer` with the construction list size.
    /// Fills `scratch.top_candidates` with up to `ef_construction` nearest
    /// live candidates; deleted locations still join the frontier.
    pub(super) fn search_base_layer(
        &self,
        scratch: &mut HnswScratch,
        q: &[u8],
        ep: Location,
        layer: i32,
    ) {
        let ef = self.ef_construction;
        scratch.top_candidates.clear();
        scratch.top_candidates.reserve(ef);
        scratch.candidate_set.clear();
        scratch.candidate_set.reserve(ef);
        scratch.visited.resize(self.store.current_index());
        scratch.visited.reset();

        let d = self.store.get_distance(q, ep);
        if !self.store.is_deleted(ep) {
            scratch.top_candidates.insert_loc(d, ep);
        }
        scratch.candidate_set.insert_loc(d, ep);
        scratch.visited.visit(ep);

        while scratch.candidate_set.has_unexpanded_node() {
            let cur = scratch.candidate_set.closest_unexpanded();
            if scratch.top_candidates.len() == ef
                && cur.distance > scratch.top_candidates.top().distance
            {
                break;
            }
            scratch.link_scratch.clear();
            self.graph.with_links(cur.loc, layer, |links| {
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
                    if !self.store.is_deleted(n) {
                        scratch.top_candidates.insert_loc(d, n);
                    }
                }
            }
        }
    }

    /// The occlude rule over `scratch.top_candidates`: in ascending distance
    /// order, a candidate survives unless an already-kept neighbor sits
    /// strictly closer to it than the reference point does. Keeps at most
    /// `m`; a set already smaller than `m` is taken whole. `exclude` drops
    /// the point being wired, which reaches its own candidate pool through
    /// stale in-edges during updates.
    pub(super) fn get_neighbors_by_heuristic(
        &self,
        scratch: &mut HnswScratch,
        m: usize,
        exclude: Location,
    ) {
        let tc = &scratch.top_candidates;
        scratch.return_list.clear();
        if tc.len() < m {
            for e in tc.iter() {
                if e.loc != exclude {
                    scratch.return_list.push((e.distance, e.loc));
                }
            }
            return;
        }
        for i in 0..tc.len() {
            if scratch.return_list.len() >= m {
                break;
            }
            let cand = tc.get(i);
            if cand.loc == exclude {
                continue;
            }
            let mut good = true;
            for &(_, sel) in scratch.return_list.iter() {
                if self.store.get_distance_pair(sel, cand.loc) < cand.distance {
                    good = false;
                    break;
                }
            }
            if good {
                scratch.return_list.push((cand.distance, cand.loc));
            }
        }
    }

    /// The same rule over an explicit candidate queue, used when a
    /// neighbor's list overflows and must be re-pruned in place.
    fn occlude_prune(&self, candidates: &NeighborQueue, m: usize, out: &mut Vec<Location>) {
        out.clear();
        for i in 0..candidates.len() {
            if out.len() >= m {
                break;
            }
            let cand = candidates.get(i);
            let mut good = true;
            for &sel in out.iter() {
                if self.store.get_distance_pair(sel, cand.loc) < cand.distance {
                    good = false;
                    break;
                }
            }
            if good {
                out.push(cand.loc);
            }
        }
    }

    /// Prunes the gathered candidates to `M`, connects `new_loc` to the
    /// survivors, and adds back-edges, re-pruning any neighbor list pushed
    /// past its capacity. Returns the closest survivor as the next descent
    /// entry.
    pub(super) fn mutually_connect(
        &self,
        scratch: &mut HnswScratch,
        new_loc: Location,
        level: i32,
    ) -> Result<Location> {
        let m_cap = if level == 0 { self.max_m0 } else { self.m };
        self.get_neighbors_by_heuristic(scratch, self.m, new_loc);
        if scratch.return_list.is_empty() {
            return Ok(new_loc);
        }
        let selected = scratch.return_list.clone();
        let next = selected[0].1;

        let own_links: Vec<Location> = selected.iter().map(|&(_, l)| l).collect();
        self.graph
            .with_links_mut(new_loc, level, |mut w| w.assign(&own_links));

        for &(dist_to_new, sel) in &selected {
            self.graph.with_links_mut(sel, level, |mut w| {
                for existing in w.iter() {
                    if existing == new_loc {
                        return;
                    }
                }
                if w.push(new_loc) {
                    return;
                }
                // Overflow: keep the best m_cap of {existing + new} by the
                // occlude rule, scored against this neighbor.
                let mut cand = NeighborQueue::with_capacity(w.capacity() + 1);
                cand.insert_loc(dist_to_new, new_loc);
                for existing in w.iter() {
                    cand.insert_loc(self.store.get_distance_pair(existing, sel), existing);
                }
                let mut keep = Vec::with_capacity(m_cap);
                self.occlude_prune(&cand, m_cap, &mut keep);
                w.assign(&keep);
            });
        }
        Ok(next)
    }

    /// Full insertion of the vector already stored at `loc`.
    pub(super) fn add_vector_internal(&self, ws: &mut WorkSpace, loc: Location) -> Result<()> {
        let level = self.get_random_level();
        self.graph.setup_location(loc, level)?;

        let mut entry = self.snapshot_entry();
        if entry.node == UNKNOWN_LOCATION {
            let mut e = self.entry.lock();
            if e.node == UNKNOWN_LOCATION {
                *e = EntryPoint { node: loc, level };
                return Ok(());
            }
            entry = *e;
        }
        if entry.node == loc {
            return Ok(());
        }

        let scratch = ws.hnsw_mut()?;
        let q = self.store.get_vector(loc);

        let mut cur = entry.node;
        if level < entry.level {
            let mut cur_dist = self.store.get_distance(q, cur);
            for l in ((level + 1)..=entry.level).rev() {
                cur = self.greedy_descend(q, cur, &mut cur_dist, l);
            }
        }

        for l in (0..=level.min(entry.level)).rev() {
            self.search_base_layer(scratch, q, cur, l);
            cur = self.mutually_connect(scratch, loc, l)?;
        }

        if level > entry.level {
            let mut e = self.entry.lock();
            if level > e.level {
                *e = EntryPoint { node: loc, level };
            }
        }
        Ok(())
    }

    /// Connection repair after an in-place overwrite: re-descend from the
    /// entrypoint toward the new vector, merge the node's existing
    /// neighborhood into the candidates on every level it occupies, and
    /// re-prune and reconnect.
    pub(super) fn update_vector_internal(&self, ws: &mut WorkSpace, loc: Location) -> Result<()> {
        let level = self.graph.level(loc);
        if level < 0 {
            return self.add_vector_internal(ws, loc);
        }
        let entry = self.snapshot_entry();
        if entry.node == UNKNOWN_LOCATION || (entry.node == loc && self.store.size() <= 1) {
            return Ok(());
        }

        let scratch = ws.hnsw_mut()?;
        let q = self.store.get_vector(loc);

        let mut cur = entry.node;
        if level < entry.level {
            let mut cur_dist = self.store.get_distance(q, cur);
            for l in ((level + 1)..=entry.level).rev() {
                cur = self.greedy_descend(q, cur, &mut cur_dist, l);
            }
        }

        for l in (0..=level.min(entry.level)).rev() {
            self.search_base_layer(scratch, q, cur, l);

            // Stale in-edges keep pointing here, so the old neighborhood
            // must be re-scored alongside the freshly searched candidates.
            scratch.link_scratch.clear();
            self.graph.with_links(loc, l, |links| {
                scratch.link_scratch.extend(links.iter());
            });
            for i in 0..scratch.link_scratch.len() {
                let n = scratch.link_scratch[i];
                if n == loc {
                    continue;
                }
                let d = self.store.get_distance(q, n);
                scratch.top_candidates.insert_loc(d, n);
            }

            if scratch.top_candidates.is_empty() {
                continue;
            }
            cur = self.mutually_connect(scratch, loc, l)?;
        }
        Ok(())
    }
}
