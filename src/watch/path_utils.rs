// src/watch/path_utils.rs

//! Path helpers shared by the compiler and the watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First try a direct `strip_prefix(root)`.
/// - If that fails (symlinks, `/private/var` vs `/var` on macOS), canonicalize
///   both paths and try again.
///
/// Returns `None` if the path cannot be related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slash(rel));
    }

    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize())
        && let Ok(rel) = path_canon.strip_prefix(&root_canon)
    {
        return Some(slash(rel));
    }

    None
}

/// Forward-slash form of a path, whatever the platform separator.
pub fn slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_and_uses_forward_slashes() {
        assert_eq!(
            relative_str(Path::new("/p"), Path::new("/p/pages/a.js")),
            Some("pages/a.js".to_string())
        );
        assert_eq!(relative_str(Path::new("/p"), Path::new("/q/a.js")), None);
        assert_eq!(slash(Path::new("a\\b")), "a/b");
    }
}
