use coordtree::path::{self, PathError};

#[test]
fn test_join_strips_interior_delimiters() {
    assert_eq!(path::join(["/a/", "/b/", "c"]).unwrap(), "/a/b/c");
    assert_eq!(path::join(["a", "b"]).unwrap(), "a/b");
    assert_eq!(path::join(["/", "a"]).unwrap(), "/a");
}

#[test]
fn test_join_rejects_empty_segments() {
    assert!(matches!(
        path::join(["/a", "", "c"]),
        Err(PathError::InvalidSegment { index: 1, .. })
    ));
    assert!(matches!(
        path::join(Vec::<&str>::new()),
        Err(PathError::NoSegments)
    ));
}

#[test]
fn test_join_rejects_empty_interior_components() {
    assert!(matches!(
        path::join(["/a", "b//c"]),
        Err(PathError::InvalidSegment { index: 1, .. })
    ));
    // Runs of delimiters at either end of a segment are stripped.
    assert_eq!(path::join(["//a", "b"]).unwrap(), "/a/b");
    assert_eq!(path::join(["/a", "b//"]).unwrap(), "/a/b");
}

#[test]
fn test_join_is_associative() {
    let segments = [("/x", "y", "z"), ("/apps", "/cfg/", "db"), ("a", "b", "c")];
    for (a, b, c) in segments {
        let left = path::join([path::join([a, b]).unwrap().as_str(), c]).unwrap();
        let right = path::join([a, path::join([b, c]).unwrap().as_str()]).unwrap();
        assert_eq!(left, right, "{a} {b} {c}");
    }
}

#[test]
fn test_parent_and_name_split_a_path() {
    for child in ["/a", "/a/b", "/a/b/c"] {
        let parent = path::parent(child).unwrap();
        assert_eq!(path::join([parent, path::name(child)]).unwrap(), child);
        assert!(path::is_ancestor(parent, child));
    }
    assert_eq!(path::parent("/"), None);
}
