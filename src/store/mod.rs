//! Mutable in-memory vector store.
//!
//! The store owns the batched vector memory plus the metadata that makes
//! locations meaningful: the injective `label -> location` map, the reverse
//! `location -> label` array, the lazy-deletion bitmap, and the vacant-slot
//! pool. Engines address vectors exclusively through [`Location`] values.
//!
//! # Locking discipline
//!
//! - **Label stripes** (`label_lock`): 65 536-way striped mutexes. Callers
//!   (the index façade) hold the stripe for a label across every multi-step
//!   operation touching that label. Store methods document when they expect
//!   the stripe to be held rather than taking it themselves.
//! - **Update lock** (`update_lock`): shared by readers and writers on the
//!   hot path; exclusive only for whole-store reshaping (load). Holding it in
//!   shared mode is what keeps [`VectorStore::get_vector`] borrows valid.
//! - **Internal locks**: `label_map`, `meta` (current index, deletion
//!   bitmap, reverse map), `batches`, `vacant` — acquired in that order
//!   when more than one is needed. All are held for O(1) or O(batch) work
//!   only.
//!
//! Vector payload writes go through [`VectorBatch::write_vector`]: sound
//! because a slot is written either before it is published (fresh insert) or
//! under the exclusive update lock (in-place overwrite), and batch memory
//! never relocates.

pub mod batch;
pub mod option;

use crate::error::{IndexError, Result};
use crate::io;
use crate::space::VectorSpace;
use crate::types::{constants, Distance, Label, Location, UNKNOWN_LABEL};
use batch::VectorBatch;
use bitvec::prelude::*;
use option::VectorStoreOption;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct StoreMeta {
    current_idx: usize,
    deleted: BitVec,
    deleted_count: usize,
    lid_to_label: Vec<Label>,
    max_elements: usize,
}

/// Batched vector storage with stable locations and lazy deletion.
pub struct VectorStore {
    space: Arc<VectorSpace>,
    batch_size: usize,
    meta: RwLock<StoreMeta>,
    label_map: RwLock<FxHashMap<Label, Location>>,
    batches: RwLock<Vec<VectorBatch>>,
    vacant: Mutex<Vec<Location>>,
    vacant_enabled: AtomicBool,
    update_lock: RwLock<()>,
    label_locks: Vec<Mutex<()>>,
}

impl VectorStore {
    /// Creates an empty store. No batches are allocated until the first
    /// location is reserved.
    #[must_use]
    pub fn new(space: Arc<VectorSpace>, option: VectorStoreOption) -> Self {
        let mut label_locks = Vec::with_capacity(constants::LOCK_SLOTS);
        label_locks.resize_with(constants::LOCK_SLOTS, || Mutex::new(()));
        Self {
            space,
            batch_size: option.batch_size.max(1),
            meta: RwLock::new(StoreMeta {
                current_idx: 0,
                deleted: BitVec::new(),
                deleted_count: 0,
                lid_to_label: Vec::new(),
                max_elements: option.max_elements,
            }),
            label_map: RwLock::new(FxHashMap::default()),
            batches: RwLock::new(Vec::new()),
            vacant: Mutex::new(Vec::new()),
            vacant_enabled: AtomicBool::new(option.enable_replace_vacant),
            update_lock: RwLock::new(()),
            label_locks,
        }
    }

    /// The space this store was built for.
    #[must_use]
    pub fn space(&self) -> &VectorSpace {
        &self.space
    }

    /// Vectors per batch.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The lock stripe guarding multi-step operations on `label`.
    #[must_use]
    pub fn label_lock(&self, label: Label) -> &Mutex<()> {
        &self.label_locks[(label as usize) & (constants::LOCK_SLOTS - 1)]
    }

    /// The store-wide update lock. Shared for reads and slot-local writes,
    /// exclusive for whole-store reshaping.
    #[must_use]
    pub fn update_lock(&self) -> &RwLock<()> {
        &self.update_lock
    }

    /// Enables vacant-slot reuse at runtime.
    pub fn enable_vacant(&self) {
        self.vacant_enabled.store(true, Ordering::Release);
    }

    /// Disables vacant-slot reuse at runtime. Already-pooled slots remain
    /// pooled and become reusable again if reuse is re-enabled.
    pub fn disable_vacant(&self) {
        self.vacant_enabled.store(false, Ordering::Release);
    }

    /// Raises or lowers the soft element ceiling.
    pub fn reset_max_elements(&self, max_elements: usize) {
        self.meta.write().max_elements = max_elements;
    }

    /// Reserves a fresh location for `label` at the high-water mark, growing
    /// the batch list as needed.
    ///
    /// Caller must hold the label stripe for `label`.
    ///
    /// # Errors
    ///
    /// - [`IndexError::AlreadyExists`] if the label is live.
    /// - [`IndexError::ResourceExhausted`] at the element ceiling.
    pub fn add_vector_at(&self, label: Label) -> Result<Location> {
        // Lock order: label_map -> meta -> batches.
        let mut label_map = self.label_map.write();
        if label_map.contains_key(&label) {
            return Err(IndexError::AlreadyExists(label));
        }
        let mut meta = self.meta.write();
        if meta.current_idx >= meta.max_elements {
            return Err(IndexError::ResourceExhausted(format!(
                "store is at max_elements = {}",
                meta.max_elements
            )));
        }
        let loc = meta.current_idx as Location;
        self.grow_for(meta.current_idx);
        meta.current_idx += 1;
        meta.lid_to_label.push(label);
        meta.deleted.push(false);
        label_map.insert(label, loc);
        Ok(loc)
    }

    /// Pops a lazily deleted location, assigns `label` to it, and clears its
    /// deleted bit.
    ///
    /// Caller must hold the label stripe for `label`.
    ///
    /// # Errors
    ///
    /// - [`IndexError::Unavailable`] if reuse is disabled or no slot is
    ///   pooled.
    /// - [`IndexError::AlreadyExists`] if the label is live.
    pub fn get_vacant(&self, label: Label) -> Result<Location> {
        if !self.vacant_enabled.load(Ordering::Acquire) {
            return Err(IndexError::Unavailable("vacant reuse is disabled".into()));
        }
        // Lock order: label_map -> meta -> vacant.
        let mut label_map = self.label_map.write();
        if label_map.contains_key(&label) {
            return Err(IndexError::AlreadyExists(label));
        }
        let mut meta = self.meta.write();
        let loc = self
            .vacant
            .lock()
            .pop()
            .ok_or_else(|| IndexError::Unavailable("no vacant slot".into()))?;
        meta.deleted.set(loc as usize, false);
        meta.deleted_count -= 1;
        meta.lid_to_label[loc as usize] = label;
        label_map.insert(label, loc);
        Ok(loc)
    }

    /// Drops the label mapping, marks the location deleted, and pools it for
    /// reuse. Returns the freed location so engines can react.
    ///
    /// Caller must hold the label stripe for `label`. Removing an unknown
    /// label fails with [`IndexError::NotFound`]; a repeated remove therefore
    /// reports `NotFound` and leaves state unchanged.
    pub fn remove_vector(&self, label: Label) -> Result<Location> {
        // Lock order: label_map -> meta -> vacant.
        let mut label_map = self.label_map.write();
        let loc = label_map
            .remove(&label)
            .ok_or(IndexError::NotFound(label))?;
        let mut meta = self.meta.write();
        meta.deleted.set(loc as usize, true);
        meta.deleted_count += 1;
        meta.lid_to_label[loc as usize] = UNKNOWN_LABEL;
        if self.vacant_enabled.load(Ordering::Acquire) {
            self.vacant.lock().push(loc);
        }
        Ok(loc)
    }

    /// Copies `bytes` into the slot at `loc`. Does not touch metadata.
    ///
    /// Caller must hold the label stripe for the owning label, plus the
    /// update lock in shared mode (fresh slot) or exclusive mode (overwrite
    /// of a published slot).
    ///
    /// # Panics
    ///
    /// Panics if `loc` is unassigned or `bytes` has the wrong length.
    pub fn set_vector(&self, loc: Location, bytes: &[u8]) {
        let batches = self.batches.read();
        let (bi, off) = self.locate(loc);
        // SAFETY: slot-level exclusivity is the documented caller contract;
        // batch memory is stable, so writing through the shared borrow cannot
        // invalidate other slots' readers.
        unsafe { batches[bi].write_vector(off, bytes) };
    }

    /// Borrow of the vector at `loc`, valid for the life of `&self`.
    ///
    /// Soundness relies on the update-lock discipline: batch allocations are
    /// only dropped under the exclusive update lock (load), and slot content
    /// only changes under the caller contracts of [`VectorStore::set_vector`].
    ///
    /// # Panics
    ///
    /// Panics if `loc` has never been assigned.
    #[must_use]
    pub fn get_vector(&self, loc: Location) -> &[u8] {
        let batches = self.batches.read();
        let (bi, off) = self.locate(loc);
        let ptr = batches[bi].vector_ptr(off);
        drop(batches);
        // SAFETY: ptr points at a stable, live allocation owned by self; see
        // the module-level locking discipline.
        unsafe { std::slice::from_raw_parts(ptr, self.space.vector_byte_size()) }
    }

    /// Copies the vector at `loc` into `out`.
    ///
    /// # Panics
    ///
    /// Panics if `loc` is unassigned or `out` has the wrong length.
    pub fn copy_vector(&self, loc: Location, out: &mut [u8]) {
        out.copy_from_slice(self.get_vector(loc));
    }

    /// Distance between a query span and the vector at `loc`.
    #[must_use]
    pub fn get_distance(&self, query: &[u8], loc: Location) -> Distance {
        self.space.kernel().compare(query, self.get_vector(loc))
    }

    /// Distance between the vectors at two locations.
    #[must_use]
    pub fn get_distance_pair(&self, l1: Location, l2: Location) -> Distance {
        self.space
            .kernel()
            .compare(self.get_vector(l1), self.get_vector(l2))
    }

    /// Batched distance of one query against many locations.
    ///
    /// # Panics
    ///
    /// Panics if `locs` and `out` differ in length.
    pub fn get_distances(&self, query: &[u8], locs: &[Location], out: &mut [Distance]) {
        assert_eq!(locs.len(), out.len(), "distance output length mismatch");
        for (d, &loc) in out.iter_mut().zip(locs.iter()) {
            *d = self.get_distance(query, loc);
        }
    }

    /// Live element count.
    #[must_use]
    pub fn size(&self) -> usize {
        let meta = self.meta.read();
        meta.current_idx - meta.deleted_count
    }

    /// Lazily deleted element count.
    #[must_use]
    pub fn deleted_size(&self) -> usize {
        self.meta.read().deleted_count
    }

    /// The high-water mark: first never-assigned location. Never decreases
    /// during a run.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.meta.read().current_idx
    }

    /// Total allocated slots across batches.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.batches.read().iter().map(VectorBatch::capacity).sum()
    }

    /// Slots assignable before hitting the element ceiling.
    #[must_use]
    pub fn available(&self) -> usize {
        let meta = self.meta.read();
        meta.max_elements.saturating_sub(meta.current_idx)
    }

    /// The configured element ceiling.
    #[must_use]
    pub fn max_elements(&self) -> usize {
        self.meta.read().max_elements
    }

    /// True if `label` is live.
    #[must_use]
    pub fn exists_label(&self, label: Label) -> bool {
        self.label_map.read().contains_key(&label)
    }

    /// The live location of `label`, if any.
    #[must_use]
    pub fn location_of(&self, label: Label) -> Option<Location> {
        self.label_map.read().get(&label).copied()
    }

    /// The label at `loc`, or `None` for deleted or unassigned locations.
    #[must_use]
    pub fn label_of(&self, loc: Location) -> Option<Label> {
        let meta = self.meta.read();
        let idx = loc as usize;
        if idx >= meta.current_idx || meta.deleted[idx] {
            return None;
        }
        Some(meta.lid_to_label[idx])
    }

    /// True if `loc` is marked lazily deleted. Unassigned locations read as
    /// not deleted.
    #[must_use]
    pub fn is_deleted(&self, loc: Location) -> bool {
        let meta = self.meta.read();
        let idx = loc as usize;
        idx < meta.current_idx && meta.deleted[idx]
    }

    fn locate(&self, loc: Location) -> (usize, usize) {
        let idx = loc as usize;
        (idx / self.batch_size, idx % self.batch_size)
    }

    fn grow_for(&self, idx: usize) {
        let mut batches = self.batches.write();
        let bi = idx / self.batch_size;
        let off = idx % self.batch_size;
        while batches.len() <= bi {
            batches.push(VectorBatch::new(&self.space, self.batch_size));
        }
        if batches[bi].len() < off + 1 {
            batches[bi].resize(off + 1);
        }
    }

    /// Serializes the store blob: batch size, high-water mark, deletion
    /// bitmap, reverse label array, and batch payloads.
    pub fn save(&self, w: &mut dyn Write) -> Result<()> {
        let meta = self.meta.read();
        let batches = self.batches.read();

        io::write_u64(w, self.batch_size as u64)?;
        io::write_u64(w, meta.current_idx as u64)?;

        let word_count = meta.current_idx.div_ceil(64);
        let mut words = vec![0u64; word_count];
        for idx in meta.deleted.iter_ones() {
            words[idx / 64] |= 1u64 << (idx % 64);
        }
        io::write_u64_vec(w, &words)?;

        for &label in &meta.lid_to_label {
            io::write_u64(w, label)?;
        }

        io::write_u64(w, batches.len() as u64)?;
        for b in batches.iter() {
            io::write_u64(w, b.len() as u64)?;
            io::write_bytes(w, b.assigned_bytes())?;
        }
        Ok(())
    }

    /// Restores the store from a blob written by [`VectorStore::save`],
    /// rebuilding the label map by inverting the reverse array and repooling
    /// deleted slots.
    ///
    /// # Errors
    ///
    /// [`IndexError::FormatMismatch`] when the blob disagrees with itself
    /// (batch sizes not covering the high-water mark, short bitmap).
    pub fn load(&self, r: &mut dyn Read) -> Result<()> {
        let _exclusive = self.update_lock.write();

        let batch_size = io::read_len(r)?;
        let current_idx = io::read_len(r)?;
        if batch_size != self.batch_size {
            return Err(IndexError::FormatMismatch(format!(
                "batch size {batch_size} != configured {}",
                self.batch_size
            )));
        }

        let words = io::read_u64_vec(r)?;
        if words.len() < current_idx.div_ceil(64) {
            return Err(IndexError::FormatMismatch(
                "deletion bitmap shorter than high-water mark".into(),
            ));
        }
        let mut deleted = BitVec::with_capacity(current_idx);
        let mut deleted_count = 0usize;
        for idx in 0..current_idx {
            let bit = (words[idx / 64] >> (idx % 64)) & 1 == 1;
            deleted.push(bit);
            deleted_count += usize::from(bit);
        }

        let mut lid_to_label = Vec::with_capacity(current_idx);
        for _ in 0..current_idx {
            lid_to_label.push(io::read_u64(r)?);
        }

        let batch_count = io::read_len(r)?;
        let mut batches = Vec::with_capacity(batch_count);
        let vbs = self.space.vector_byte_size();
        let mut covered = 0usize;
        for _ in 0..batch_count {
            let len = io::read_len(r)?;
            if len > batch_size {
                return Err(IndexError::FormatMismatch(format!(
                    "batch length {len} exceeds batch size {batch_size}"
                )));
            }
            let mut b = VectorBatch::new(&self.space, batch_size);
            b.resize(len);
            let payload = io::read_bytes(r, len * vbs)?;
            for (i, chunk) in payload.chunks_exact(vbs).enumerate() {
                b.set_vector(i, chunk);
            }
            covered += len;
            batches.push(b);
        }
        if covered != current_idx {
            return Err(IndexError::FormatMismatch(format!(
                "batches cover {covered} slots, expected {current_idx}"
            )));
        }

        let mut label_map = FxHashMap::default();
        let mut vacant = Vec::new();
        for idx in 0..current_idx {
            if deleted[idx] {
                vacant.push(idx as Location);
            } else {
                let label = lid_to_label[idx];
                if label_map.insert(label, idx as Location).is_some() {
                    return Err(IndexError::FormatMismatch(format!(
                        "label {label} mapped twice"
                    )));
                }
            }
        }

        let mut meta = self.meta.write();
        meta.current_idx = current_idx;
        meta.deleted = deleted;
        meta.deleted_count = deleted_count;
        meta.lid_to_label = lid_to_label;
        if meta.max_elements < current_idx {
            meta.max_elements = current_idx;
        }
        drop(meta);
        *self.label_map.write() = label_map;
        *self.batches.write() = batches;
        *self.vacant.lock() = vacant;
        Ok(())
    }
}
