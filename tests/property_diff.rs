use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use hotdag::reload::{ChunkSnapshot, diff};

const NAMES: &[&str] = &[
    "bundles/pages/index.js",
    "bundles/pages/about.js",
    "bundles/pages/blog/index.js",
    "bundles/pages/_document.js",
    "bundles/pages/_error.js",
    "bundles/pages/shop/cart.js",
];

const HASHES: &[&str] = &["h1", "h2", "h3"];

fn snapshot_strategy() -> impl Strategy<Value = ChunkSnapshot> {
    (
        prop::collection::btree_map(
            prop::sample::select(NAMES).prop_map(str::to_string),
            prop::sample::select(HASHES).prop_map(str::to_string),
            0..4,
        ),
        prop::collection::btree_set(
            prop::sample::select(NAMES).prop_map(str::to_string),
            0..3,
        ),
    )
        .prop_map(|(hashes, failed): (BTreeMap<String, String>, BTreeSet<String>)| {
            ChunkSnapshot { hashes, failed }
        })
}

proptest! {
    #[test]
    fn prop_diff_classification_is_consistent(
        prev in snapshot_strategy(),
        cur in snapshot_strategy(),
    ) {
        let d = diff(Some(&prev), &cur).expect("previous snapshot given");

        prop_assert!(d.added.is_disjoint(&d.removed));
        for name in &d.added {
            prop_assert!(cur.hashes.contains_key(name) && !prev.hashes.contains_key(name));
        }
        for name in &d.removed {
            prop_assert!(prev.hashes.contains_key(name) && !cur.hashes.contains_key(name));
        }

        // Rehashed chunks exist in both passes, changed, and are not
        // classified as anything structural.
        for name in &d.rehashed {
            prop_assert!(!d.added.contains(name));
            prop_assert!(!d.removed.contains(name));
            prop_assert!(!d.failed.contains(name));
            prop_assert_ne!(prev.hashes.get(name), cur.hashes.get(name));
        }

        prop_assert!(d.failed.is_disjoint(&d.recovered));
        for name in &d.recovered {
            prop_assert!(prev.failed.contains(name) && !cur.failed.contains(name));
        }

        // Every chunk present in both passes with a new hash is reported
        // somewhere.
        for (name, hash) in &cur.hashes {
            if prev.hashes.get(name).is_some_and(|h| h != hash) {
                prop_assert!(d.rehashed.contains(name) || d.failed.contains(name));
            }
        }
    }

    #[test]
    fn prop_identical_snapshots_without_failures_diff_empty(
        snap in snapshot_strategy(),
    ) {
        let snap = ChunkSnapshot { failed: BTreeSet::new(), ..snap };
        let d = diff(Some(&snap), &snap).expect("previous snapshot given");
        prop_assert!(d.is_empty());
    }
}

#[test]
fn first_snapshot_has_no_diff() {
    let snap = ChunkSnapshot::new().with_chunk("bundles/pages/index.js", "h1");
    assert!(diff(None, &snap).is_none());
}
