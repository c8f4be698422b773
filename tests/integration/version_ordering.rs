//! Ordering of version strings as used for candidate selection

use stageloader::version::{compare, Version};
use std::cmp::Ordering;

#[test]
fn test_build_metadata_is_ignored() {
    assert_eq!(compare("1.0.0+a", "1.0.0+b"), Ordering::Equal);
    assert_eq!(Version::new("1.0.0+a"), Version::new("1.0.0+b"));
}

#[test]
fn test_missing_components_are_zero() {
    assert_eq!(compare("1.0", "1.0.0"), Ordering::Equal);
    assert_eq!(compare("1", "1.0.0"), Ordering::Equal);
}

#[test]
fn test_release_beats_pre_release() {
    assert_eq!(compare("1.2.3", "1.2.3-rc.1"), Ordering::Greater);
    assert_eq!(compare("1.2.3-rc.1", "1.2.3"), Ordering::Less);
}

#[test]
fn test_pre_release_identifiers() {
    assert_eq!(compare("1-rc.2", "1-rc.1"), Ordering::Greater);
    assert_eq!(compare("1-rc.1", "1-pre.1"), Ordering::Greater);
}

#[test]
fn test_candidate_versions_sort() {
    let mut versions: Vec<Version> = ["1.3.0", "1.2.0", "1.3.0-rc.1", "1.10.0", "1.2"]
        .into_iter()
        .map(Version::new)
        .collect();
    versions.sort();
    let sorted: Vec<&str> = versions.iter().map(Version::as_str).collect();
    assert_eq!(sorted[0..2].iter().filter(|v| v.starts_with("1.2")).count(), 2);
    assert_eq!(&sorted[2..], &["1.3.0-rc.1", "1.3.0", "1.10.0"]);
}
