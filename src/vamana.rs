//! Vamana-style neighbor pruning primitives.
//!
//! These are the shared contracts graph builders plug into this core:
//! alpha-relaxed occlusion ([`VamanaPruner::occlude_list`]), candidate
//! pruning ([`VamanaPruner::prune_neighbors`]), and slack-bounded back-edge
//! insertion ([`VamanaPruner::inter_insert`]). The SSD paging layer, PQ
//! compression, and beam-search scheduler live outside this crate.

use crate::queue::NeighborEntity;
use crate::store::VectorStore;
use crate::types::{constants, Location};
use crate::workspace::VamanaScratch;
use parking_lot::RwLock;
use std::sync::Arc;

/// Pruning tunables.
#[derive(Clone, Copy, Debug)]
pub struct PruneParams {
    /// Maximum out-degree `R`.
    pub degree: u32,
    /// Candidate cap before occlusion (`maxC`).
    pub max_candidates: u32,
    /// Occlusion relaxation; 1.0 is strict, larger keeps longer edges.
    pub alpha: f64,
    /// Top the pruned list up to `R` with the closest leftovers when the
    /// relaxed pass under-fills it.
    pub saturate: bool,
    /// Adjacency slack factor before a forced re-prune.
    pub slack: f64,
}

impl Default for PruneParams {
    fn default() -> Self {
        Self {
            degree: 64,
            max_candidates: constants::VAMANA_MAX_CANDIDATES,
            alpha: constants::VAMANA_ALPHA,
            saturate: false,
            slack: constants::VAMANA_SLACK,
        }
    }
}

/// Flat adjacency store with the shared pruning operations.
pub struct VamanaPruner {
    store: Arc<VectorStore>,
    params: PruneParams,
    adj: Vec<RwLock<Vec<Location>>>,
}

impl VamanaPruner {
    /// Adjacency sized for the store's element ceiling.
    #[must_use]
    pub fn new(store: Arc<VectorStore>, params: PruneParams) -> Self {
        let mut adj = Vec::with_capacity(store.max_elements());
        adj.resize_with(store.max_elements(), || RwLock::new(Vec::new()));
        Self { store, params, adj }
    }

    /// The configured tunables.
    #[must_use]
    pub fn params(&self) -> &PruneParams {
        &self.params
    }

    /// Copy of the current out-neighbors of `loc`.
    #[must_use]
    pub fn neighbors(&self, loc: Location) -> Vec<Location> {
        self.adj[loc as usize].read().clone()
    }

    /// Replaces the out-neighbors of `loc`.
    pub fn set_neighbors(&self, loc: Location, links: &[Location]) {
        let mut guard = self.adj[loc as usize].write();
        guard.clear();
        guard.extend_from_slice(links);
    }

    /// Alpha-relaxed diversification.
    ///
    /// `pool` must be sorted ascending by distance to `loc` and is truncated
    /// to `maxc`. A candidate is admitted unless an already-admitted
    /// neighbor `r` dominates it, i.e. `d(r, candidate) * alpha <
    /// d(loc, candidate)`; the relaxation runs in rounds of increasing
    /// `cur_alpha` until `alpha` is exhausted or `degree` neighbors are kept.
    pub fn occlude_list(
        &self,
        loc: Location,
        pool: &mut Vec<NeighborEntity>,
        alpha: f64,
        degree: usize,
        maxc: usize,
        result: &mut Vec<Location>,
        occlude_factor: &mut Vec<f64>,
    ) {
        if pool.is_empty() {
            return;
        }
        debug_assert!(
            pool.windows(2).all(|w| w[0].distance <= w[1].distance),
            "occlusion pool must be sorted"
        );
        debug_assert!(result.is_empty());
        if pool.len() > maxc {
            pool.truncate(maxc);
        }
        occlude_factor.clear();
        occlude_factor.resize(pool.len(), 0.0);

        let mut cur_alpha = 1.0;
        while cur_alpha <= alpha && result.len() < degree {
            for i in 0..pool.len() {
                if result.len() >= degree {
                    break;
                }
                if occlude_factor[i] > cur_alpha {
                    continue;
                }
                // Claimed: never reconsidered in a later round.
                occlude_factor[i] = f64::MAX;
                if pool[i].loc != loc {
                    result.push(pool[i].loc);
                }
                for j in (i + 1)..pool.len() {
                    if occlude_factor[j] > alpha {
                        continue;
                    }
                    let djk = self.store.get_distance_pair(pool[j].loc, pool[i].loc);
                    occlude_factor[j] = if djk == 0.0 {
                        f64::MAX
                    } else {
                        occlude_factor[j].max(pool[j].distance / djk)
                    };
                }
            }
            cur_alpha *= 1.2;
        }
    }

    /// Sorts `pool` by distance to `loc`, truncates to `maxC`, occludes with
    /// the configured alpha capping at `R` survivors, and optionally
    /// saturates the result with the closest leftovers.
    pub fn prune_neighbors(
        &self,
        loc: Location,
        pool: &mut Vec<NeighborEntity>,
        pruned: &mut Vec<Location>,
        scratch: &mut VamanaScratch,
    ) {
        pruned.clear();
        if pool.is_empty() {
            return;
        }
        pool.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.loc.cmp(&b.loc))
        });
        pruned.reserve(self.params.degree as usize);
        self.occlude_list(
            loc,
            pool,
            self.params.alpha,
            self.params.degree as usize,
            self.params.max_candidates as usize,
            pruned,
            &mut scratch.occlude_factor,
        );
        debug_assert!(pruned.len() <= self.params.degree as usize);

        if self.params.saturate && self.params.alpha > 1.0 {
            for node in pool.iter() {
                if pruned.len() >= self.params.degree as usize {
                    break;
                }
                if node.loc != loc && !pruned.contains(&node.loc) {
                    pruned.push(node.loc);
                }
            }
        }
    }

    /// Adds `loc` to each survivor's out-list under that neighbor's lock;
    /// lists pushed past `slack * R` are rebuilt through a fresh prune.
    pub fn inter_insert(&self, loc: Location, pruned: &[Location], scratch: &mut VamanaScratch) {
        let slack_cap = (self.params.slack * f64::from(self.params.degree)) as usize;
        for &des in pruned {
            let mut overflow: Option<Vec<Location>> = None;
            {
                let mut guard = self.adj[des as usize].write();
                if !guard.contains(&loc) {
                    if guard.len() < slack_cap {
                        guard.push(loc);
                    } else {
                        let mut copy = guard.clone();
                        copy.push(loc);
                        overflow = Some(copy);
                    }
                }
            }
            let Some(copy) = overflow else { continue };

            scratch.inserted.clear();
            let mut pool = std::mem::take(&mut scratch.expanded);
            let mut new_out = std::mem::take(&mut scratch.pruned);
            pool.clear();
            for &nbr in &copy {
                if nbr != des && scratch.inserted.insert(nbr) {
                    let d = self.store.get_distance_pair(des, nbr);
                    pool.push(NeighborEntity::new(d, nbr));
                }
            }
            self.prune_neighbors(des, &mut pool, &mut new_out, scratch);
            self.set_neighbors(des, &new_out);
            scratch.expanded = pool;
            scratch.pruned = new_out;
        }
    }
}
