//! Path-escape guarding for generated objective text.
//!
//! Objectives come from a generation service and may mention absolute paths.
//! Any absolute path literal that lexically resolves outside the workspace
//! root is replaced with the workspace root itself.

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Absolute path literals: `/…` preceded by start, whitespace, a quote or an
/// opening bracket. Terminates at whitespace, quotes, closing brackets and
/// trailing sentence punctuation.
static ABSOLUTE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(^|[\s"'`(\[<=])(/[^\s"'`)\]>,;]*[^\s"'`)\]>,;.:!?])"#)
        .expect("absolute path pattern is valid")
});

/// Collapse `.` and `..` components without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root.
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Whether `path` (absolute) stays inside `root` after lexical normalization.
pub fn is_within(path: &Path, root: &Path) -> bool {
    lexical_normalize(path).starts_with(lexical_normalize(root))
}

/// Replace every absolute path literal in `text` that escapes `root`.
///
/// Paths inside the root are left untouched, so applying this twice gives
/// the same result as applying it once.
pub fn sanitize_objective(text: &str, root: &Path) -> String {
    let root_display = if root.is_absolute() {
        lexical_normalize(root).display().to_string()
    } else {
        root.display().to_string()
    };
    ABSOLUTE_PATH
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let prefix = &caps[1];
            let literal = &caps[2];
            if root.is_absolute() && is_within(Path::new(literal), root) {
                format!("{prefix}{literal}")
            } else {
                format!("{prefix}{root_display}")
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_parent_components() {
        assert_eq!(
            lexical_normalize(Path::new("/work/app/../lib/./x.rs")),
            PathBuf::from("/work/lib/x.rs")
        );
        assert_eq!(lexical_normalize(Path::new("/../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn paths_inside_root_are_kept() {
        let text = "Edit /work/app/src/main.rs and keep going.";
        assert_eq!(sanitize_objective(text, Path::new("/work/app")), text);
    }

    #[test]
    fn escaping_paths_are_replaced() {
        let root = Path::new("/work/app");
        assert_eq!(
            sanitize_objective("Read /etc/passwd now", root),
            "Read /work/app now"
        );
        assert_eq!(
            sanitize_objective("Open \"/work/app/../secrets.env\".", root),
            "Open \"/work/app\"."
        );
    }

    #[test]
    fn relative_paths_are_ignored() {
        let text = "Update src/lib.rs and ../notes.md";
        assert_eq!(sanitize_objective(text, Path::new("/work/app")), text);
    }

    #[test]
    fn sanitizing_is_idempotent() {
        let root = Path::new("/work/app");
        let once = sanitize_objective("copy /tmp/x to /work/app/y", root);
        assert_eq!(sanitize_objective(&once, root), once);
        assert_eq!(once, "copy /work/app to /work/app/y");
    }
}
