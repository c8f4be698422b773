//! Diff archives applied to artifact files on disk

use stageloader::archive::EntryTree;
use stageloader::patch::{self, ChangeSet};
use tempfile::TempDir;

fn base_tree() -> EntryTree {
    let mut tree = EntryTree::new();
    tree.insert("META-INF/MANIFEST.MF".to_string(), b"Name: x\nVersion: 1.0.0\n".to_vec());
    tree.insert("lib/core.bin".to_string(), b"core v1".to_vec());
    tree.insert("lib/extra/only.bin".to_string(), b"only".to_vec());
    tree.insert("assets/logo.png".to_string(), vec![0x89, 0x50, 0x4e, 0x47]);
    tree
}

fn change_set() -> ChangeSet {
    ChangeSet {
        removed: vec!["lib/extra/only.bin".to_string()],
        replaced: vec![("lib/core.bin".to_string(), b"core v2".to_vec())],
        added: vec![("lib/new/feature.bin".to_string(), b"feature".to_vec())],
    }
}

#[test]
fn test_same_diff_on_two_copies_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let base = base_tree().to_bytes().unwrap();
    let first = temp.path().join("first.pkg");
    let second = temp.path().join("second.pkg");
    std::fs::write(&first, &base).unwrap();
    std::fs::write(&second, &base).unwrap();

    let diff = temp.path().join("update.diff");
    std::fs::write(&diff, change_set().to_diff().to_bytes().unwrap()).unwrap();

    let report_first = patch::apply(&first, &diff).unwrap();
    let report_second = patch::apply(&second, &diff).unwrap();

    assert_eq!(report_first, report_second);
    assert_eq!(
        std::fs::read(&first).unwrap(),
        std::fs::read(&second).unwrap()
    );
}

#[test]
fn test_patched_archive_content() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("current.pkg");
    std::fs::write(&target, base_tree().to_bytes().unwrap()).unwrap();
    let diff = temp.path().join("update.diff");
    std::fs::write(&diff, change_set().to_diff().to_bytes().unwrap()).unwrap();

    let report = patch::apply(&target, &diff).unwrap();
    assert_eq!((report.removed, report.replaced, report.added), (1, 1, 1));

    let patched = EntryTree::read(&target).unwrap();
    assert_eq!(patched.get("lib/core.bin"), Some(&b"core v2"[..]));
    assert_eq!(patched.get("lib/new/feature.bin"), Some(&b"feature"[..]));
    assert!(!patched.contains_file("lib/extra/only.bin"));
    // the emptied directory goes, its non-empty parent stays
    assert!(!patched.contains_dir("lib/extra"));
    assert!(patched.contains_dir("lib"));
    assert_eq!(patched.get("assets/logo.png"), Some(&[0x89, 0x50, 0x4e, 0x47][..]));
}

#[test]
fn test_removing_last_file_cascades_up_to_root() {
    let temp = TempDir::new().unwrap();
    let mut tree = EntryTree::new();
    tree.insert("a/b/c/leaf.txt".to_string(), b"leaf".to_vec());
    tree.insert("top.txt".to_string(), b"top".to_vec());
    let target = temp.path().join("current.pkg");
    std::fs::write(&target, tree.to_bytes().unwrap()).unwrap();

    let removal = ChangeSet {
        removed: vec!["a/b/c/leaf.txt".to_string()],
        ..Default::default()
    };
    let diff = temp.path().join("remove.diff");
    std::fs::write(&diff, removal.to_diff().to_bytes().unwrap()).unwrap();
    patch::apply(&target, &diff).unwrap();

    let patched = EntryTree::read(&target).unwrap();
    assert_eq!(patched.dir_names().count(), 0);
    assert_eq!(patched.file_names().collect::<Vec<_>>(), vec!["top.txt"]);
}

#[test]
fn test_missing_target_is_an_error() {
    let temp = TempDir::new().unwrap();
    let diff = temp.path().join("update.diff");
    std::fs::write(&diff, change_set().to_diff().to_bytes().unwrap()).unwrap();
    assert!(patch::apply(&temp.path().join("absent.pkg"), &diff).is_err());
}
