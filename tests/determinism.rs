//! Property-based tests for ordering and patch determinism

use proptest::prelude::*;
use stageloader::archive::EntryTree;
use stageloader::patch::ChangeSet;
use stageloader::version::compare;

fn entry_name() -> impl Strategy<Value = String> {
    (prop::collection::vec("[a-c]{1,2}", 0..3), "[d-f]{1,3}")
        .prop_map(|(dirs, file)| dirs.into_iter().chain([format!("{}.bin", file)]).collect::<Vec<_>>().join("/"))
}

proptest! {
    #[test]
    fn compare_is_antisymmetric(a in "[0-9a-z.+-]{0,12}", b in "[0-9a-z.+-]{0,12}") {
        prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
    }

    #[test]
    fn compare_is_reflexive(a in "[0-9a-z.+-]{0,12}") {
        prop_assert_eq!(compare(&a, &a), std::cmp::Ordering::Equal);
    }

    #[test]
    fn build_metadata_never_matters(a in "[0-9.]{1,8}", x in "[a-z0-9]{1,6}", y in "[a-z0-9]{1,6}") {
        prop_assert_eq!(compare(&format!("{}+{}", a, x), &format!("{}+{}", a, y)), std::cmp::Ordering::Equal);
    }

    #[test]
    fn serialization_is_insertion_order_independent(
        files in prop::collection::btree_map(entry_name(), prop::collection::vec(any::<u8>(), 0..32), 1..8)
    ) {
        let mut forward = EntryTree::new();
        let mut backward = EntryTree::new();
        for (name, content) in &files {
            forward.insert(name.clone(), content.clone());
        }
        for (name, content) in files.iter().rev() {
            backward.insert(name.clone(), content.clone());
        }
        prop_assert_eq!(forward.to_bytes().unwrap(), backward.to_bytes().unwrap());
    }

    #[test]
    fn applying_twice_gives_identical_bytes(
        base in prop::collection::btree_map("[d-f]{1,3}", prop::collection::vec(any::<u8>(), 0..16), 1..6),
        added in prop::collection::btree_map("[g-i]{1,3}", prop::collection::vec(any::<u8>(), 0..16), 0..4),
    ) {
        let mut original = EntryTree::new();
        for (name, content) in &base {
            original.insert(format!("lib/{}", name), content.clone());
        }
        let changes = ChangeSet {
            removed: base.keys().take(1).map(|name| format!("lib/{}", name)).collect(),
            replaced: Vec::new(),
            added: added
                .iter()
                .map(|(name, content)| (format!("new/{}", name), content.clone()))
                .collect(),
        };

        let mut first = original.clone();
        let mut second = original.clone();
        changes.apply_to(&mut first).unwrap();
        changes.apply_to(&mut second).unwrap();
        prop_assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
    }
}
