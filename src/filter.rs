//! Pure path classification, shared by the rsync diff pass and the write
//! pipeline: a name-based skip list applied during a `WalkDir` walk,
//! generalized into the full file-kind taxonomy below.

use std::path::Path;

use crate::model::is_git_breadcrumb;

/// Default rsync exclusions, before any caller-supplied patterns.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".git",
    "node_modules",
    ".idea",
    ".vscode",
    ".clasp.json",
    ".claspignore",
    ".rsync-manifest.json",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// `.git` anywhere in the path; never propagates to the Remote (I6).
    GitBreadcrumb,
    /// Module-system scaffolding or synthetic executor shim.
    SystemSynthetic,
    /// A directory the rsync diff always skips by default.
    DevDir,
    /// A local-only config file (clasp/rsync bookkeeping), not Remote-compatible.
    LocalConfig,
    /// Eligible to be transmitted to / compared against the Remote.
    RemoteCompatible,
}

/// Classify a path relative to a project working directory root.
pub fn classify(rel_path: &str) -> Classification {
    if is_git_breadcrumb(rel_path) {
        return Classification::GitBreadcrumb;
    }
    if crate::model::is_system_synthetic(strip_known_extension(rel_path)) {
        return Classification::SystemSynthetic;
    }
    if is_dev_dir(rel_path) {
        return Classification::DevDir;
    }
    if is_local_config(rel_path) {
        return Classification::LocalConfig;
    }
    Classification::RemoteCompatible
}

/// Whether `rel_path` should be skipped during an rsync listing, honoring
/// both the fixed default excludes and the caller-supplied patterns.
pub fn is_excluded(rel_path: &str, extra_patterns: &[String]) -> bool {
    if matches!(
        classify(rel_path),
        Classification::GitBreadcrumb | Classification::DevDir | Classification::LocalConfig
    ) {
        return true;
    }
    extra_patterns
        .iter()
        .any(|pat| glob_match(pat, rel_path))
}

fn is_dev_dir(rel_path: &str) -> bool {
    let first_seg = rel_path.split('/').next().unwrap_or(rel_path);
    matches!(first_seg, "node_modules" | ".idea" | ".vscode")
}

fn is_local_config(rel_path: &str) -> bool {
    matches!(
        rel_path,
        ".clasp.json" | ".claspignore" | ".rsync-manifest.json"
    )
}

/// Strip the local kind-derived extension so system-synthetic name checks
/// operate on the bare Remote name (`appsscript.json` -> `appsscript`).
fn strip_known_extension(rel_path: &str) -> &str {
    for ext in [".gs", ".html", ".json"] {
        if let Some(stripped) = rel_path.strip_suffix(ext) {
            return stripped;
        }
    }
    rel_path
}

/// Minimal glob: supports a leading/trailing `*` wildcard, matching the
/// caller-supplied `excludePatterns` shape in. Not a general glob
/// engine — that lives with the collaborator search/grep engines out of scope
/// for this core.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
        (Some(suffix), _) if pattern.starts_with('*') && pattern.ends_with('*') => {
            let inner = &suffix[..suffix.len().saturating_sub(1)];
            candidate.contains(inner)
        }
        (Some(suffix), _) => candidate.ends_with(suffix),
        (None, Some(prefix)) => candidate.starts_with(prefix),
        (None, None) => candidate == pattern,
    }
}

pub fn local_file_name_for(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}
