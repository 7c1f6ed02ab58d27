//! Path algebra for node paths.
//!
//! Paths are absolute, `/`-delimited sequences of non-empty segments. The root is
//! `/` and is the only path allowed to end with the delimiter. Everything in this
//! module is pure: no I/O, no shared state.
//!
//! # Usage
//!
//! ```rust
//! use coordtree::path;
//!
//! let child = path::join(["/apps/", "/config", "db"])?;
//! assert_eq!(child, "/apps/config/db");
//! assert_eq!(path::parent(&child), Some("/apps/config"));
//! assert_eq!(path::name(&child), "db");
//! # Ok::<(), coordtree::path::PathError>(())
//! ```

use thiserror::Error;

use crate::constants::{DELIMITER, ROOT};

/// Error type for path validation failures.
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// A segment passed to [`join`] was empty, or collapsed to nothing once its
    /// delimiters were stripped.
    #[error("Invalid path segment at index {index} in {segments:?}")]
    InvalidSegment { segments: Vec<String>, index: usize },

    /// [`join`] was called without any segment.
    #[error("Cannot join an empty list of path segments")]
    NoSegments,

    /// A full path is not in canonical absolute form.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl PathError {
    /// Check if this error came from joining segments.
    pub fn is_segment_error(&self) -> bool {
        matches!(
            self,
            PathError::InvalidSegment { .. } | PathError::NoSegments
        )
    }

    /// The offending path, when the error is about a full path.
    pub fn path(&self) -> Option<&str> {
        match self {
            PathError::InvalidPath { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Joins path segments with exactly one delimiter between them.
///
/// The result is absolute iff the first segment starts with the delimiter. Any
/// run of leading or trailing delimiters is stripped from every segment before
/// joining, so `"//a"` contributes `a`. A first segment that is only delimiters
/// stands for the root.
///
/// This is stricter than plain concatenation: any other empty segment is
/// rejected, and so is a segment with an empty interior component (`"b//c"`).
/// A joined path therefore never contains an empty component.
///
/// ```rust
/// # use coordtree::path::join;
/// assert_eq!(join(["/", "a"]).unwrap(), "/a");
/// assert_eq!(join(["a/", "/b/"]).unwrap(), "a/b");
/// assert_eq!(join(["//a", "b"]).unwrap(), "/a/b");
/// assert!(join(["/a", ""]).is_err());
/// assert!(join(["/a", "b//c"]).is_err());
/// ```
pub fn join<I, S>(segments: I) -> Result<String, PathError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let segments: Vec<S> = segments.into_iter().collect();
    let Some(first) = segments.first() else {
        return Err(PathError::NoSegments);
    };
    let absolute = first.as_ref().starts_with(DELIMITER);

    let invalid = |index: usize| PathError::InvalidSegment {
        segments: segments.iter().map(|s| s.as_ref().to_string()).collect(),
        index,
    };

    let mut parts: Vec<&str> = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let raw = segment.as_ref();
        if raw.is_empty() {
            return Err(invalid(index));
        }
        let trimmed = raw.trim_matches(DELIMITER);
        if trimmed.is_empty() {
            if index == 0 {
                continue;
            }
            return Err(invalid(index));
        }
        if trimmed.split(DELIMITER).any(str::is_empty) {
            return Err(invalid(index));
        }
        parts.push(trimmed);
    }

    let joined = parts.join(ROOT);
    if absolute {
        Ok(format!("{DELIMITER}{joined}"))
    } else {
        Ok(joined)
    }
}

/// Checks that `path` is a canonical absolute node path.
pub fn validate(path: &str) -> Result<(), PathError> {
    let fail = |reason| {
        Err(PathError::InvalidPath {
            path: path.to_string(),
            reason,
        })
    };

    if path.is_empty() {
        return fail("path must not be empty");
    }
    if !path.starts_with(DELIMITER) {
        return fail("path must be absolute");
    }
    if path == ROOT {
        return Ok(());
    }
    if path.ends_with(DELIMITER) {
        return fail("path must not end with a delimiter");
    }
    if path.contains('\0') {
        return fail("path must not contain a null character");
    }
    for segment in path[1..].split(DELIMITER) {
        match segment {
            "" => return fail("path contains an empty segment"),
            "." | ".." => return fail("relative segments are not allowed"),
            _ => {}
        }
    }
    Ok(())
}

/// Parent of a canonical path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind(DELIMITER) {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of a canonical path. The root has an empty name.
pub fn name(path: &str) -> &str {
    match path.rfind(DELIMITER) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Whether `ancestor` is a strict ancestor of `path`.
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
    if ancestor == path {
        return false;
    }
    if ancestor == ROOT {
        return path.starts_with(DELIMITER);
    }
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with(DELIMITER))
}
