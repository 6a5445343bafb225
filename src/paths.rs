//! Maps `(scriptId, optional subpath, optional session token)` to a concrete
//! local working directory.

use std::path::{Path, PathBuf};

use crate::config::RsmcpPaths;
use crate::model::WorkingTree;

/// Resolve the working directory for a `scriptId`, optionally scoped to a
/// client session. Project repos and session worktrees are both created
/// lazily by the git operation pipeline; this resolver only computes the
/// path.
pub fn resolve_working_tree(
    paths: &RsmcpPaths,
    script_id: &str,
    session_id: Option<&str>,
) -> WorkingTree {
    match session_id {
        Some(session_id) => WorkingTree::Session {
            root: paths.session_worktree(script_id, session_id),
            session_id: session_id.to_string(),
        },
        None => WorkingTree::Project {
            root: paths.project_repo(script_id),
        },
    }
}

/// Resolve a caller-supplied `path` (relative or absolute) against the
/// working tree root. Absolute paths pass through unchanged.
pub fn resolve_within_tree(tree: &WorkingTree, rel_or_abs: &str) -> PathBuf {
    resolve_against(tree.root(), rel_or_abs)
}

fn resolve_against(root: &Path, rel_or_abs: &str) -> PathBuf {
    let p = PathBuf::from(rel_or_abs);
    if p.is_absolute() {
        p
    } else {
        root.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_tree_has_no_session_branch() {
        let paths = RsmcpPaths::for_home(PathBuf::from("/home/u"));
        let tree = resolve_working_tree(&paths, "abc", None);
        assert!(tree.expected_branch().is_none());
        assert_eq!(tree.root(), &paths.project_repo("abc"));
    }

    #[test]
    fn session_tree_maps_to_worktree_with_branch() {
        let paths = RsmcpPaths::for_home(PathBuf::from("/home/u"));
        let tree = resolve_working_tree(&paths, "abc", Some("sess1"));
        assert_eq!(tree.expected_branch(), Some("session/sess1".to_string()));
        assert_eq!(tree.root(), &paths.session_worktree("abc", "sess1"));
    }

    #[test]
    fn relative_path_joins_root_absolute_passes_through() {
        let paths = RsmcpPaths::for_home(PathBuf::from("/home/u"));
        let tree = resolve_working_tree(&paths, "abc", None);
        assert_eq!(
            resolve_within_tree(&tree, "Utils.gs"),
            paths.project_repo("abc").join("Utils.gs")
        );
        assert_eq!(
            resolve_within_tree(&tree, "/tmp/other.gs"),
            PathBuf::from("/tmp/other.gs")
        );
    }
}
