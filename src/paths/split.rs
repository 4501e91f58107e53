pub const ROOT: &str = "/";

/// Splits an absolute path into its parent path and leaf name.
///
/// The root splits into `("/", "")`. Input is expected to be well formed
/// (see [`is_well_formed`]); anything else still splits without panicking.
pub fn split_parent_and_name(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => (ROOT, &path[1..]),
        Some(index) => (&path[..index], &path[index + 1..]),
        None => (ROOT, path),
    }
}

/// Builds the path of `name` inside the directory at `parent`.
pub fn join_child(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Absolute, no empty segments, no trailing slash except for the root itself.
pub fn is_well_formed(path: &str) -> bool {
    if path == ROOT {
        return true;
    }
    path.starts_with('/') && path[1..].split('/').all(|segment| !segment.is_empty())
}
