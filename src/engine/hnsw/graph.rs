//! Leveled proximity graph storage.
//!
//! Every location owns a level and one link array per level it occupies.
//! Link arrays use the size-prefix layout: slot 0 holds the current neighbor
//! count, slots `1..=capacity` hold neighbor locations. Level 0 carries up to
//! `2 * M` neighbors, higher levels up to `M`.
//!
//! Nodes are preallocated at initialization and guarded by per-node
//! reader-writer locks; the graph itself never reallocates, so `&self`
//! access from concurrent inserts and searches is safe.

use crate::error::{IndexError, Result};
use crate::io;
use crate::types::Location;
use parking_lot::RwLock;
use std::io::{Read, Write};
use std::ops::Range;

struct NodeState {
    level: i32,
    links: Vec<Location>,
}

struct LeveledNode {
    state: RwLock<NodeState>,
}

/// Read view of one level's link window.
pub struct Links<'a> {
    data: &'a [Location],
}

impl Links<'_> {
    /// Current neighbor count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data[0] as usize
    }

    /// True when the window holds no neighbors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum neighbors the window can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len() - 1
    }

    /// Neighbor at position `i`.
    ///
    /// # Panics
    ///
    /// Panics when `i` is at or past the current count.
    #[must_use]
    pub fn get(&self, i: usize) -> Location {
        assert!(i < self.len(), "link index {i} past count {}", self.len());
        self.data[i + 1]
    }

    /// Iterates current neighbors.
    pub fn iter(&self) -> impl Iterator<Item = Location> + '_ {
        self.data[1..=self.len()].iter().copied()
    }
}

/// Write view of one level's link window.
pub struct LinksMut<'a> {
    data: &'a mut [Location],
}

impl LinksMut<'_> {
    /// Current neighbor count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data[0] as usize
    }

    /// Maximum neighbors the window can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len() - 1
    }

    /// Neighbor at position `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Location {
        assert!(i < self.len(), "link index {i} past count {}", self.len());
        self.data[i + 1]
    }

    /// Writes the neighbor slot `i` without touching the count.
    ///
    /// # Panics
    ///
    /// Panics past the window capacity.
    pub fn set(&mut self, i: usize, link: Location) {
        assert!(i < self.capacity(), "link slot {i} past capacity");
        self.data[i + 1] = link;
    }

    /// Publishes the neighbor count. Writers fill slots first and set the
    /// size last, preserving the size-prefix-then-links ordering readers
    /// depend on.
    ///
    /// # Panics
    ///
    /// Panics past the window capacity.
    pub fn set_len(&mut self, n: usize) {
        assert!(n <= self.capacity(), "link count {n} past capacity");
        self.data[0] = n as Location;
    }

    /// Replaces the whole window content.
    ///
    /// # Panics
    ///
    /// Panics when `links` exceeds the capacity.
    pub fn assign(&mut self, links: &[Location]) {
        assert!(links.len() <= self.capacity(), "link list past capacity");
        for (i, &l) in links.iter().enumerate() {
            self.data[i + 1] = l;
        }
        self.data[0] = links.len() as Location;
    }

    /// Appends one neighbor; returns `false` when the window is full.
    pub fn push(&mut self, link: Location) -> bool {
        let n = self.len();
        if n == self.capacity() {
            return false;
        }
        self.data[n + 1] = link;
        self.data[0] = (n + 1) as Location;
        true
    }

    /// Iterates current neighbors.
    pub fn iter(&self) -> impl Iterator<Item = Location> + '_ {
        self.data[1..=self.len()].iter().copied()
    }
}

/// Per-location leveled adjacency store.
pub struct LeveledGraph {
    max_nbor: u32,
    nodes: Vec<LeveledNode>,
}

impl LeveledGraph {
    /// Graph over `max_elements` locations with out-degree `max_nbor` (`M`).
    #[must_use]
    pub fn new(max_elements: usize, max_nbor: u32) -> Self {
        let mut nodes = Vec::with_capacity(max_elements);
        nodes.resize_with(max_elements, || LeveledNode {
            state: RwLock::new(NodeState {
                level: -1,
                links: Vec::new(),
            }),
        });
        Self { max_nbor, nodes }
    }

    /// Out-degree parameter `M`.
    #[must_use]
    pub fn max_nbor(&self) -> u32 {
        self.max_nbor
    }

    /// Number of addressable locations.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn window(&self, node_level: i32, level: i32) -> Range<usize> {
        debug_assert!(level <= node_level, "level {level} above node {node_level}");
        let m = self.max_nbor as usize;
        if level == 0 {
            0..2 * m + 1
        } else {
            let l = level as usize;
            (m + 1) * (l + 1)..(m + 1) * (l + 2)
        }
    }

    /// Assigns a level to `loc` and sizes its zeroed link storage.
    ///
    /// # Errors
    ///
    /// [`IndexError::Internal`] when `loc` is outside the preallocated range.
    pub fn setup_location(&self, loc: Location, level: i32) -> Result<()> {
        let node = self
            .nodes
            .get(loc as usize)
            .ok_or_else(|| IndexError::Internal(format!("location {loc} outside graph")))?;
        let m = self.max_nbor as usize;
        let mut state = node.state.write();
        state.level = level;
        let len = if level == 0 {
            2 * m + 1
        } else {
            (m + 1) * (level as usize + 2)
        };
        state.links.clear();
        state.links.resize(len, 0);
        Ok(())
    }

    /// The level of `loc`, or `-1` when never assigned.
    #[must_use]
    pub fn level(&self, loc: Location) -> i32 {
        self.nodes[loc as usize].state.read().level
    }

    /// Runs `f` over the read-locked link window of `loc` at `level`.
    ///
    /// # Panics
    ///
    /// Panics when the location has no such level.
    pub fn with_links<R>(&self, loc: Location, level: i32, f: impl FnOnce(Links<'_>) -> R) -> R {
        let state = self.nodes[loc as usize].state.read();
        assert!(level <= state.level, "location {loc} has no level {level}");
        let range = self.window(state.level, level);
        f(Links {
            data: &state.links[range],
        })
    }

    /// Runs `f` over the write-locked link window of `loc` at `level`.
    ///
    /// # Panics
    ///
    /// Panics when the location has no such level.
    pub fn with_links_mut<R>(
        &self,
        loc: Location,
        level: i32,
        f: impl FnOnce(LinksMut<'_>) -> R,
    ) -> R {
        let mut state = self.nodes[loc as usize].state.write();
        assert!(level <= state.level, "location {loc} has no level {level}");
        let range = self.window(state.level, level);
        f(LinksMut {
            data: &mut state.links[range],
        })
    }

    /// Copies out the neighbor list of `loc` at `level` under the lock.
    #[must_use]
    pub fn neighbors(&self, loc: Location, level: i32) -> Vec<Location> {
        self.with_links(loc, level, |links| links.iter().collect())
    }

    /// Serializes the graph blob: `M`, node count, then per node the level
    /// and, for assigned nodes, the length-prefixed link storage.
    pub fn save(&self, w: &mut dyn Write) -> Result<()> {
        io::write_u32(w, self.max_nbor)?;
        io::write_u64(w, self.nodes.len() as u64)?;
        for node in &self.nodes {
            let state = node.state.read();
            io::write_i32(w, state.level)?;
            if state.level >= 0 {
                io::write_u32_vec(w, &state.links)?;
            }
        }
        Ok(())
    }

    /// Restores a graph blob written by [`LeveledGraph::save`].
    ///
    /// # Errors
    ///
    /// [`IndexError::FormatMismatch`] when the stored `M` disagrees with the
    /// configured out-degree.
    pub fn load(&mut self, r: &mut dyn Read) -> Result<()> {
        let max_nbor = io::read_u32(r)?;
        if max_nbor != self.max_nbor {
            return Err(IndexError::FormatMismatch(format!(
                "graph M {max_nbor} != configured {}",
                self.max_nbor
            )));
        }
        let count = io::read_len(r)?;
        let mut nodes = Vec::with_capacity(count.max(self.nodes.len()));
        for _ in 0..count {
            let level = io::read_i32(r)?;
            let links = if level >= 0 {
                io::read_u32_vec(r)?
            } else {
                Vec::new()
            };
            nodes.push(LeveledNode {
                state: RwLock::new(NodeState { level, links }),
            });
        }
        // Keep the preallocated capacity when the blob is smaller.
        while nodes.len() < self.nodes.len() {
            nodes.push(LeveledNode {
                state: RwLock::new(NodeState {
                    level: -1,
                    links: Vec::new(),
                }),
            });
        }
        self.nodes = nodes;
        Ok(())
    }
}
