//! Data model: ScriptProject, File, FileKind, Manifest, Lock record, Session
//! worktree.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque Remote project identifier: 25-60 chars of `[A-Za-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptId(String);

impl ScriptId {
    pub fn parse(raw: &str) -> Result<Self, crate::error::CoreError> {
        let len = raw.chars().count();
        let valid = (25..=60).contains(&len)
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(crate::error::CoreError::Validation {
                message: format!(
                    "scriptId must be 25-60 chars of [A-Za-z0-9_-], got {:?}",
                    raw
                ),
            });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three flat-namespaced file kinds on the Remote. No subdirectories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    ServerScript,
    Markup,
    Manifest,
}

impl FileKind {
    /// Kind-derived local file extension (without the leading dot).
    pub fn local_extension(self) -> &'static str {
        match self {
            FileKind::ServerScript => "gs",
            FileKind::Markup => "html",
            FileKind::Manifest => "json",
        }
    }
}

/// Remote attributes wire name for each kind, kept distinct from the local extension
/// since files are transmitted by kind tag on the Remote, not by extension.
impl FileKind {
    pub fn wire_tag(self) -> &'static str {
        match self {
            FileKind::ServerScript => "SERVER_JS",
            FileKind::Markup => "HTML",
            FileKind::Manifest => "JSON",
        }
    }
}

/// A single file as the Remote represents it: flat name, kind, UTF-8 source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    pub kind: FileKind,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl RemoteFile {
    pub fn local_file_name(&self) -> String {
        format!("{}.{}", self.name, self.kind.local_extension())
    }
}

/// Split a caller-supplied `path` into the bare Remote name and inferred
/// kind, from its local-style extension if present (`Index.html` -> Markup);
/// bare names with no recognized extension default to `ServerScript`, the
/// common case for tool calls (`path: 'Utils'`, per spec example S1).
pub fn split_name_and_kind(path: &str) -> (String, FileKind) {
    if let Some(stem) = path.strip_suffix(".html") {
        return (stem.to_string(), FileKind::Markup);
    }
    if let Some(stem) = path.strip_suffix(".json") {
        return (stem.to_string(), FileKind::Manifest);
    }
    if let Some(stem) = path.strip_suffix(".gs") {
        return (stem.to_string(), FileKind::ServerScript);
    }
    if path == MANIFEST_NAME {
        return (path.to_string(), FileKind::Manifest);
    }
    (path.to_string(), FileKind::ServerScript)
}

/// The fixed manifest file name every project has exactly one of.
pub const MANIFEST_NAME: &str = "appsscript";

/// Names never wrap-eligible even though they are `ServerJs`: the module system's
/// own scaffolding plus the synthetic executor shim.
pub fn is_system_synthetic(name: &str) -> bool {
    name == MANIFEST_NAME || name.starts_with("common-js/") || name.starts_with("__mcp_exec")
}

/// `.git` anywhere in the path, at any depth.
pub fn is_git_breadcrumb(name: &str) -> bool {
    name.split('/').any(|seg| seg == ".git") || name == ".git" || name.starts_with(".git/")
}

/// Module-registration options preserved across wrap/unwrap round-trips.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_now: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "hoistedFunctions")]
    pub hoisted_functions: Option<Vec<String>>,
}

impl ModuleOptions {
    pub fn is_empty(&self) -> bool {
        self.load_now.is_none() && self.hoisted_functions.is_none()
    }
}

/// Local JSON snapshot of the last successful rsync (`.rsync-manifest.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncManifest {
    #[serde(rename = "scriptId")]
    pub script_id: String,
    pub direction: SyncDirection,
    pub files: Vec<ManifestEntry>,
    #[serde(rename = "commitSha", skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Pull,
    Push,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub hash: String,
    #[serde(rename = "lastModified")]
    pub last_modified: String,
}

/// A filesystem lock record: `{pid, hostname, timestamp, operation, scriptId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub hostname: String,
    pub timestamp: String,
    pub operation: String,
    #[serde(rename = "scriptId")]
    pub script_id: String,
}

/// Resolved local working directory for a write: either the persistent project
/// repo or a per-session isolated worktree.
#[derive(Debug, Clone)]
pub enum WorkingTree {
    Project { root: PathBuf },
    Session { root: PathBuf, session_id: String },
}

impl WorkingTree {
    pub fn root(&self) -> &PathBuf {
        match self {
            WorkingTree::Project { root } => root,
            WorkingTree::Session { root, .. } => root,
        }
    }

    pub fn expected_branch(&self) -> Option<String> {
        match self {
            WorkingTree::Project { .. } => None,
            WorkingTree::Session { session_id, .. } => Some(format!("session/{session_id}")),
        }
    }
}
