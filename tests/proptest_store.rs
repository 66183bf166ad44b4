//! Property tests for the store's bookkeeping invariants and the neighbor
//! queue ordering contract.

use multivec::queue::{NeighborEntity, NeighborQueue};
use multivec::store::option::VectorStoreOption;
use multivec::store::VectorStore;
use multivec::{DataType, Metric, VectorSpace};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    Add(u64),
    Remove(u64),
    Readd(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..32).prop_map(Op::Add),
        (0u64..32).prop_map(Op::Remove),
        (0u64..32).prop_map(Op::Readd),
    ]
}

fn fresh_store() -> VectorStore {
    let space = Arc::new(VectorSpace::new(4, Metric::L2, DataType::F32).unwrap());
    VectorStore::new(
        space,
        VectorStoreOption {
            batch_size: 8,
            max_elements: 256,
            enable_replace_vacant: true,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After any op sequence: the label map image is exactly the live
    /// location set, and live + deleted counts cover the high-water mark.
    #[test]
    fn store_bookkeeping_invariants(ops in proptest::collection::vec(op_strategy(), 1..80)) {
        let store = fresh_store();
        for op in &ops {
            match *op {
                Op::Add(label) => {
                    let _ = store.add_vector_at(label);
                }
                Op::Remove(label) => {
                    let _ = store.remove_vector(label);
                }
                Op::Readd(label) => {
                    if !store.exists_label(label) {
                        let loc = store
                            .get_vacant(label)
                            .or_else(|_| store.add_vector_at(label));
                        prop_assert!(loc.is_ok());
                    }
                }
            }
        }

        let current = store.current_index();
        let mut live = 0usize;
        for idx in 0..current {
            let loc = idx as u32;
            if store.is_deleted(loc) {
                prop_assert_eq!(store.label_of(loc), None);
            } else {
                live += 1;
                // Reverse map round-trips through the forward map.
                let label = store.label_of(loc);
                prop_assert!(label.is_some());
                prop_assert_eq!(store.location_of(label.unwrap()), Some(loc));
            }
        }
        prop_assert_eq!(live, store.size());
        prop_assert_eq!(live + store.deleted_size(), current);
    }

    /// The queue holds a sorted, duplicate-free, capacity-bounded prefix of
    /// everything inserted, and the cursor splits expanded from unexpanded.
    #[test]
    fn queue_stays_sorted_and_bounded(
        cap in 1usize..16,
        inserts in proptest::collection::vec((0.0f64..100.0, 0u32..64), 0..64),
        expansions in 0usize..8,
    ) {
        let mut q = NeighborQueue::with_capacity(cap);
        for &(d, loc) in &inserts {
            q.insert(NeighborEntity::new(d, loc));
        }
        for _ in 0..expansions {
            if q.has_unexpanded_node() {
                let _ = q.closest_unexpanded();
            }
        }

        prop_assert!(q.len() <= cap);
        let entries: Vec<_> = q.iter().copied().collect();
        for w in entries.windows(2) {
            prop_assert!(
                w[0].distance < w[1].distance
                    || (w[0].distance == w[1].distance && w[0].label <= w[1].label)
            );
            prop_assert!(w[0].loc != w[1].loc);
        }
        // Locations are unique across the whole queue.
        let mut locs: Vec<u32> = entries.iter().map(|e| e.loc).collect();
        locs.sort_unstable();
        locs.dedup();
        prop_assert_eq!(locs.len(), entries.len());
    }

    /// `get_vacant` always hands back a location that was deleted, clearing
    /// its bit.
    #[test]
    fn vacant_reuse_only_recycles_deleted_slots(
        labels in proptest::collection::vec(0u64..16, 1..16),
    ) {
        let store = fresh_store();
        for (i, &label) in labels.iter().enumerate() {
            let _ = store.add_vector_at(label.wrapping_add(i as u64 * 100));
        }
        let first = store.label_of(0).unwrap();
        let loc = store.remove_vector(first).unwrap();
        let reused = store.get_vacant(9_999).unwrap();
        prop_assert_eq!(reused, loc);
        prop_assert!(!store.is_deleted(reused));
        prop_assert_eq!(store.label_of(reused), Some(9_999));
    }
}
