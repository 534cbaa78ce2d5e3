//! Path-string helpers.
//!
//! Paths are absolute strings; there is no normalization of `.`/`..`,
//! trailing separators, or repeated separators. Two different rules
//! coexist on purpose:
//!
//! - enumeration ([`child_name`]) matches on a plain textual prefix, so
//!   `/foobar` enumerates as child "bar" of `/foo`;
//! - removal ([`is_strict_descendant`]) matches on path-segment
//!   boundaries, so `/foobar` does not keep `/foo` from being removed.

/// Final path segment: the substring after the last '/'.
///
/// The root path "/" has the empty name.
pub fn leaf_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Immediate-child test used by directory enumeration.
///
/// `candidate` is an immediate child of `dir` iff it starts with `dir` as
/// a textual prefix, is strictly longer, and the remainder (after at most
/// one leading '/') contains no further '/'. Returns the child's display
/// name.
pub fn child_name<'a>(dir: &str, candidate: &'a str) -> Option<&'a str> {
    let rest = candidate.strip_prefix(dir)?;
    if rest.is_empty() {
        return None;
    }
    let rest = rest.strip_prefix('/').unwrap_or(rest);
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(rest)
}

/// Segment-boundary descendant test used by directory removal.
///
/// True iff `candidate` lies strictly below `dir` in the tree: it extends
/// `dir` and the extension starts at a '/' (always the case under the
/// root).
pub fn is_strict_descendant(dir: &str, candidate: &str) -> bool {
    if candidate == dir {
        return false;
    }
    match candidate.strip_prefix(dir) {
        Some(rest) => dir == "/" || rest.starts_with('/'),
        None => false,
    }
}
