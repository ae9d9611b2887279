//! Report locations against explicit invocation roots.

use std::path::{Component, Path, PathBuf};

use verdict::location::{InvocationRoot, LocationResolver, RawFrame};

fn resolver(root: &Path) -> LocationResolver {
    LocationResolver::new(InvocationRoot::new(root).unwrap())
}

fn has_parent_segment(path: &Path) -> bool {
    path.components().any(|c| c == Component::ParentDir)
}

#[test]
fn relative_root_is_made_absolute() {
    let root = InvocationRoot::new("some/dir").unwrap();
    assert!(root.path().is_absolute());
    assert!(root.path().ends_with("some/dir"));
}

#[test]
fn paths_under_the_root_are_relative() {
    let tmp = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp.path());
    let frame = RawFrame::new(tmp.path().join("tests/test_a.py"), 7, "test_a");
    let location = resolver.resolve(&frame);
    assert_eq!(location.path, PathBuf::from("tests").join("test_a.py"));
    assert_eq!(location.line, 7);
    assert_eq!(location.domain, "test_a");
}

#[test]
fn escaping_paths_become_absolute_without_parent_segments() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("project");
    let resolver = resolver(&root);
    let location = resolver.resolve(&RawFrame::new("../shared/helpers.py", 3, "helper"));
    assert!(location.path.is_absolute());
    assert!(!has_parent_segment(&location.path));
    assert_eq!(location.path, tmp.path().join("shared").join("helpers.py"));
}

#[test]
fn dot_segments_are_normalized() {
    let tmp = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp.path());
    let location = resolver.resolve(&RawFrame::new("./tests/../tests/./test_b.py", 1, "t"));
    assert_eq!(location.path, PathBuf::from("tests").join("test_b.py"));
    assert_eq!(location.to_string(), format!("{}:1", location.path.display()));
}

#[test]
fn registered_paths_take_precedence() {
    let tmp = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp.path());
    let absolute = resolver.register(Path::new("test_c.py"));
    assert_eq!(absolute, tmp.path().join("test_c.py"));
    let location = resolver.resolve(&RawFrame::new("test_c.py", 2, "t"));
    assert_eq!(location.path, PathBuf::from("test_c.py"));
}

#[test]
fn resolution_is_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    let resolver = resolver(tmp.path());
    let frame = RawFrame::new("pkg/test_d.py", 9, "t");
    assert_eq!(resolver.resolve(&frame), resolver.resolve(&frame));
}
