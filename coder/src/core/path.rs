//! Lexical path resolution confined to a project root.
//!
//! Resolution never touches the filesystem: `.` segments are dropped and `..`
//! pops the previous segment. Symlink checks happen in `io::writer`.

use std::path::{Component, Path, PathBuf};

/// Resolve `relative` against `root` without consulting the filesystem.
///
/// An absolute `relative` replaces `root`, matching `Path::join`.
pub fn resolve_lexically(root: &Path, relative: &str) -> PathBuf {
    let joined = root.join(relative);
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(prefix) => resolved.push(prefix.as_os_str()),
            Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(segment) => resolved.push(segment),
        }
    }
    resolved
}

/// Return true when `candidate` lies strictly below `root`.
///
/// The comparison is per path component, so `/proj-evil` is not inside `/proj`.
pub fn is_strictly_within(root: &Path, candidate: &Path) -> bool {
    candidate != root && candidate.starts_with(root)
}

/// `/`-separated form of `path` relative to `root`, for display and payloads.
pub fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `relative` under `root`, returning `None` when it escapes the subtree.
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let resolved = resolve_lexically(root, relative);
    is_strictly_within(root, &resolved).then_some(resolved)
}
