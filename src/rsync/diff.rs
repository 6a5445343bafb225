//! The stateless three-way diff: manifest vs local vs remote.

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::CoreError;
use crate::filter::is_excluded;
use crate::hash::git_blob_hash_str;
use crate::model::{ManifestEntry, RemoteFile, SyncDirection, SyncManifest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDiffKind {
    Unchanged,
    Update,
    Add,
    Delete,
}

#[derive(Debug, Clone)]
pub struct FileDiff {
    pub filename: String,
    pub kind: FileDiffKind,
}

#[derive(Debug, Clone)]
pub struct DiffSummary {
    pub is_bootstrap: bool,
    pub adds: Vec<String>,
    pub updates: Vec<String>,
    pub deletes: Vec<String>,
    pub unchanged: Vec<String>,
}

impl DiffSummary {
    pub fn deletions(&self) -> usize {
        self.deletes.len()
    }

    pub fn total_operations(&self) -> usize {
        self.adds.len() + self.updates.len() + self.deletes.len()
    }
}

/// List local files under `project_dir`, applying default + caller excludes
///, returning `filename -> wrapped content on disk`.
pub fn list_local_files(
    project_dir: &Path,
    extra_excludes: &[String],
) -> Result<BTreeMap<String, String>, CoreError> {
    let mut out = BTreeMap::new();
    for entry in WalkDir::new(project_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(project_dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if is_excluded(&rel, extra_excludes) {
            continue;
        }
        let content = std::fs::read_to_string(entry.path())
            .map_err(|e| CoreError::io(format!("reading {}: {e}", entry.path().display())))?;
        let (name, _kind) = crate::model::split_name_and_kind(&rel);
        out.insert(name, content);
    }
    Ok(out)
}

/// Compute the three-way diff. `manifest` is `None` for a bootstrap sync.
///
/// `direction` orients `adds`/`deletes`: for `Push` (source=local), `adds`
/// is local-only files and `deletes` is remote-only files; for `Pull`
/// (source=remote), that's inverted — `adds` is remote-only files (to be
/// written locally) and `deletes` is local-only files (to be removed
/// locally). `updates`/`unchanged` name the same files either way since both
/// sides already have the file; only which side's content wins differs.
pub fn compute_diff(
    local_files: &BTreeMap<String, String>,
    remote_files: &[RemoteFile],
    manifest: Option<&SyncManifest>,
    direction: SyncDirection,
) -> DiffSummary {
    let remote_map: BTreeMap<&str, &RemoteFile> =
        remote_files.iter().map(|f| (f.name.as_str(), f)).collect();

    let mut local_only = Vec::new();
    let mut updates = Vec::new();
    let mut unchanged = Vec::new();

    for (name, local_content) in local_files {
        match remote_map.get(name.as_str()) {
            Some(remote_file) => {
                let local_hash = git_blob_hash_str(local_content);
                let remote_hash = git_blob_hash_str(&remote_file.source);
                if local_hash == remote_hash {
                    unchanged.push(name.clone());
                } else {
                    updates.push(name.clone());
                }
            }
            None => local_only.push(name.clone()),
        }
    }

    let remote_only: Vec<String> = remote_files
        .iter()
        .map(|f| f.name.clone())
        .filter(|name| !local_files.contains_key(name))
        .collect();

    let is_bootstrap = manifest.is_none();

    let (adds, deletes) = match direction {
        SyncDirection::Push => (local_only, remote_only),
        SyncDirection::Pull => (remote_only, local_only),
    };

    DiffSummary {
        is_bootstrap,
        adds,
        updates,
        deletes: if is_bootstrap { Vec::new() } else { deletes },
        unchanged,
    }
}

pub fn manifest_entries_from_local(
    local_files: &BTreeMap<String, String>,
) -> Vec<ManifestEntry> {
    local_files
        .iter()
        .map(|(name, content)| ManifestEntry {
            filename: name.clone(),
            hash: git_blob_hash_str(content),
            last_modified: chrono::Utc::now().to_rfc3339(),
        })
        .collect()
}
