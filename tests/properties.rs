//! Property tests over push/remove interleavings and scan window sizes.

use fifolog::{MemoryMedium, PlainCodec, RecordStore, StoreConfig};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    Push(String),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[a-z0-9]{1,24}".prop_map(Op::Push),
        1 => any::<usize>().prop_map(Op::Remove),
    ]
}

fn store_with(window_size: usize) -> (MemoryMedium, RecordStore) {
    let medium = MemoryMedium::new();
    let config = StoreConfig {
        window_size,
        ..StoreConfig::new("queue.dat")
    };
    let store = RecordStore::open_with(
        config,
        Arc::new(medium.clone()),
        Arc::new(PlainCodec),
    )
    .unwrap();
    (medium, store)
}

proptest! {
    /// `size()` always equals pushes minus removes, and the store content
    /// matches an in-memory model regardless of tombstones and the
    /// auto-compactions they trigger.
    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let (_medium, store) = store_with(64);
        let mut model: Vec<String> = Vec::new();

        for op in ops {
            match op {
                Op::Push(payload) => {
                    store.push(&payload).unwrap();
                    model.push(payload);
                }
                Op::Remove(seed) => {
                    if model.is_empty() {
                        prop_assert!(store.remove(0).is_err());
                    } else {
                        let index = seed % model.len();
                        let removed = store.remove(index).unwrap();
                        prop_assert_eq!(&removed, &model.remove(index));
                    }
                }
            }
            prop_assert_eq!(store.size(), model.len());
        }

        prop_assert_eq!(store.get_first(model.len()).unwrap(), model);
    }

    /// The backward scan agrees with the forward index scan at the tail for
    /// every reachable store state.
    #[test]
    fn prop_get_last_equals_get_at_tail(
        ops in prop::collection::vec(op_strategy(), 1..40),
        window_size in 1usize..96,
    ) {
        let (_medium, store) = store_with(window_size);
        let mut live = 0usize;

        for op in ops {
            match op {
                Op::Push(payload) => {
                    store.push(&payload).unwrap();
                    live += 1;
                }
                Op::Remove(seed) if live > 0 => {
                    store.remove(seed % live).unwrap();
                    live -= 1;
                }
                Op::Remove(_) => {}
            }
            if live > 0 {
                prop_assert_eq!(store.get_last().unwrap(), store.get(live - 1).unwrap());
            } else {
                prop_assert!(store.get_last().is_err());
            }
        }
    }

    /// Records framed to land on or around the window boundary never
    /// corrupt the backward scan.
    #[test]
    fn prop_window_boundary_payloads(
        window_size in 1usize..48,
        pad in 0usize..3,
    ) {
        let (_medium, store) = store_with(window_size);

        // Frame length (payload + delimiter) lands exactly at, just below,
        // and just above the window size.
        for len in [
            window_size.saturating_sub(1).max(1),
            window_size,
            window_size + 1,
            window_size + pad,
        ] {
            store.push(&"x".repeat(len)).unwrap();
        }
        store.push("last").unwrap();

        prop_assert_eq!(store.get_last().unwrap(), "last");
        store.remove(store.size() - 1).unwrap();
        prop_assert_eq!(
            store.get_last().unwrap(),
            "x".repeat((window_size + pad).max(1))
        );
    }

    /// Compaction preserves observable content and zeroes fragmentation.
    #[test]
    fn prop_defragment_preserves_content(
        ops in prop::collection::vec(op_strategy(), 1..50),
    ) {
        let (_medium, store) = store_with(64);
        let mut live = 0usize;

        for op in ops {
            match op {
                Op::Push(payload) => {
                    store.push(&payload).unwrap();
                    live += 1;
                }
                Op::Remove(seed) if live > 0 => {
                    store.remove(seed % live).unwrap();
                    live -= 1;
                }
                Op::Remove(_) => {}
            }
        }

        let before = store.get_first(store.size()).unwrap();
        let ratio_before = store.fragmentation_ratio().unwrap();

        store.defragment().unwrap();

        prop_assert_eq!(store.get_first(store.size()).unwrap(), before);
        let ratio_after = store.fragmentation_ratio().unwrap();
        prop_assert!(ratio_after <= ratio_before);
        prop_assert_eq!(ratio_after, 0.0);
    }
}
