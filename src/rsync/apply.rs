//! Apply (pull) and apply (push): the unidirectional, non-optimistic halves
//! of the rsync engine that actually move bytes once `compute_diff` has
//! classified them. Both commit on success and hand back a `git reset --hard
//! <pre-sync HEAD>` recovery command on failure.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info_span;

use crate::error::CoreError;
use crate::git_ops::repo;
use crate::model::{FileKind, ModuleOptions, RemoteFile, SyncDirection, SyncManifest};
use crate::remote::RemoteClient;
use crate::wrapper;

use super::diff::{manifest_entries_from_local, DiffSummary};
use super::manifest;

#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub summary: DiffSummary,
    pub commit_sha: Option<String>,
    pub recovery_command: String,
}

/// Pull: write Remote bytes to local disk, commit, rewrite the manifest.
/// `remote_files` is the list already fetched for `compute_diff`; nothing is
/// re-fetched here so the diff and the apply always agree.
pub async fn apply_pull(
    project_dir: &Path,
    script_id: &str,
    remote_files: &[RemoteFile],
    summary: DiffSummary,
    confirm_deletions: bool,
) -> Result<ApplyResult, CoreError> {
    let span = info_span!("rsync_pull", script_id, deletions = summary.deletions());
    let _enter = span.enter();

    if summary.deletions() > 0 && !confirm_deletions {
        return Err(CoreError::DeletionRequiresConfirmation {
            files: summary.deletes.clone(),
        });
    }

    let pre_sync_head = repo::rev_parse(project_dir, "HEAD").unwrap_or_default();
    let recovery_command = format!(
        "git -C {} reset --hard {}",
        project_dir.display(),
        pre_sync_head
    );

    let remote_by_name: BTreeMap<&str, &RemoteFile> =
        remote_files.iter().map(|f| (f.name.as_str(), f)).collect();

    for name in summary.adds.iter().chain(summary.updates.iter()) {
        let remote_file = remote_by_name
            .get(name.as_str())
            .ok_or_else(|| CoreError::fatal(format!("{name} missing from fetched remote list")))?;
        let unwrapped = wrapper::unwrap(&remote_file.source);
        let path = project_dir.join(format!("{}.{}", name, remote_file.kind.local_extension()));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CoreError::io(format!("mkdir {}: {e}", parent.display())))?;
        }
        std::fs::write(&path, unwrapped.user_text)
            .map_err(|e| CoreError::io(format!("writing {}: {e}", path.display())))?;
    }

    for name in &summary.deletes {
        let kind = remote_by_name
            .get(name.as_str())
            .map(|f| f.kind)
            .unwrap_or(FileKind::ServerScript);
        let path = project_dir.join(format!("{}.{}", name, kind.local_extension()));
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| CoreError::io(format!("removing {}: {e}", path.display())))?;
        }
    }

    let mut local_after: BTreeMap<String, String> = BTreeMap::new();
    for f in remote_files {
        if summary.deletes.contains(&f.name) {
            continue;
        }
        local_after.insert(f.name.clone(), wrapper::unwrap(&f.source).user_text);
    }

    let new_manifest = SyncManifest {
        script_id: script_id.to_string(),
        direction: SyncDirection::Pull,
        files: manifest_entries_from_local(&local_after),
        commit_sha: None,
    };
    manifest::save(project_dir, &new_manifest)?;

    repo::add_all(project_dir)?;
    let commit_sha = repo::commit_allow_empty_noop(
        project_dir,
        &format!("rsync pull: {} file(s) synced from remote", summary.total_operations()),
    )?;

    Ok(ApplyResult {
        summary,
        commit_sha,
        recovery_command,
    })
}

/// Push: fold the local-only view into the Remote's full file list (wrapping
/// fresh adds, preserving `ModuleOptions` on updates), and call
/// `update_project_content` once, atomically.
pub async fn apply_push(
    project_dir: &Path,
    remote: &dyn RemoteClient,
    script_id: &str,
    local_files: &BTreeMap<String, String>,
    remote_files: &[RemoteFile],
    summary: DiffSummary,
    confirm_deletions: bool,
) -> Result<ApplyResult, CoreError> {
    let span = info_span!("rsync_push", script_id, deletions = summary.deletions());
    let _enter = span.enter();

    if summary.deletions() > 0 && !confirm_deletions {
        return Err(CoreError::DeletionRequiresConfirmation {
            files: summary.deletes.clone(),
        });
    }

    let pre_sync_head = repo::rev_parse(project_dir, "HEAD").unwrap_or_default();
    let recovery_command = format!(
        "git -C {} reset --hard {}",
        project_dir.display(),
        pre_sync_head
    );

    let remote_by_name: BTreeMap<&str, &RemoteFile> =
        remote_files.iter().map(|f| (f.name.as_str(), f)).collect();

    let mut new_list: Vec<RemoteFile> = remote_files
        .iter()
        .filter(|f| !summary.deletes.contains(&f.name))
        .cloned()
        .collect();

    for name in summary.adds.iter().chain(summary.updates.iter()) {
        let content = local_files
            .get(name)
            .ok_or_else(|| CoreError::fatal(format!("{name} missing from local file set")))?;
        let (kind, existing_options) = match remote_by_name.get(name.as_str()) {
            Some(existing) => (existing.kind, wrapper::unwrap(&existing.source).existing_options),
            None => (crate::model::split_name_and_kind(name).1, None::<ModuleOptions>),
        };
        let source = if wrapper::is_wrap_eligible(kind, name) {
            wrapper::wrap(content, existing_options.as_ref())
        } else {
            content.clone()
        };
        let entry = RemoteFile {
            name: name.clone(),
            kind,
            source,
            update_time: None,
        };
        match new_list.iter_mut().find(|f| f.name == *name) {
            Some(slot) => *slot = entry,
            None => new_list.push(entry),
        }
    }

    remote
        .update_project_content(script_id, new_list)
        .await?;

    let new_manifest = SyncManifest {
        script_id: script_id.to_string(),
        direction: SyncDirection::Push,
        files: manifest_entries_from_local(local_files),
        commit_sha: None,
    };
    manifest::save(project_dir, &new_manifest)?;

    Ok(ApplyResult {
        summary,
        commit_sha: None,
        recovery_command,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryRemote;
    use crate::rsync::diff::compute_diff;
    use tempfile::tempdir;

    fn remote_file(name: &str, content: &str) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            kind: FileKind::ServerScript,
            source: wrapper::wrap(content, None),
            update_time: None,
        }
    }

    #[tokio::test]
    async fn pull_writes_unwrapped_bytes_and_commits() {
        let dir = tempdir().unwrap();
        repo::ensure_repo(dir.path()).unwrap();
        let remote_files = vec![remote_file("Utils", "function f(){return 1}")];
        let local: BTreeMap<String, String> = BTreeMap::new();
        let summary = compute_diff(&local, &remote_files, None, SyncDirection::Pull);

        let result = apply_pull(dir.path(), "script1", &remote_files, summary, false)
            .await
            .unwrap();
        assert!(result.commit_sha.is_some());
        let written = std::fs::read_to_string(dir.path().join("Utils.gs")).unwrap();
        assert_eq!(written, "function f(){return 1}");
        assert!(manifest::load(dir.path()).unwrap().is_some());
    }

    #[tokio::test]
    async fn pull_refuses_deletions_without_confirmation() {
        let dir = tempdir().unwrap();
        repo::ensure_repo(dir.path()).unwrap();
        let remote_files = vec![remote_file("Stale", "old")];
        let mut local = BTreeMap::new();
        local.insert("Keep".to_string(), "keep me".to_string());
        let manifest = SyncManifest {
            script_id: "s".to_string(),
            direction: SyncDirection::Pull,
            files: vec![],
            commit_sha: None,
        };
        let summary = compute_diff(&local, &remote_files, Some(&manifest), SyncDirection::Pull);
        let err = apply_pull(dir.path(), "script1", &remote_files, summary, false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DeletionRequiresConfirmation { .. }));
    }

    #[tokio::test]
    async fn push_wraps_new_file_and_preserves_options_on_update() {
        let dir = tempdir().unwrap();
        repo::ensure_repo(dir.path()).unwrap();
        let remote = InMemoryRemote::new();

        let opts = ModuleOptions {
            load_now: Some(true),
            hoisted_functions: None,
        };
        let existing = vec![remote_file("Existing", "old body")];
        let mut existing = existing;
        existing[0].source = wrapper::wrap("old body", Some(&opts));
        remote.seed("script1", existing.clone());

        let mut local = BTreeMap::new();
        local.insert("Existing".to_string(), "new body".to_string());
        local.insert("Brand New".to_string(), "fresh body".to_string());

        let summary = compute_diff(&local, &existing, None, SyncDirection::Push);
        apply_push(dir.path(), &remote, "script1", &local, &existing, summary, false)
            .await
            .unwrap();

        let stored = remote.get_project_content("script1").await.unwrap();
        let updated = stored.iter().find(|f| f.name == "Existing").unwrap();
        let unwrapped = wrapper::unwrap(&updated.source);
        assert_eq!(unwrapped.user_text, "new body");
        assert_eq!(unwrapped.existing_options, Some(opts));

        let added = stored.iter().find(|f| f.name == "Brand New").unwrap();
        assert!(added.source.starts_with("function _main"));
    }
}
