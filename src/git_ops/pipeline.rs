//! The atomic write pipeline: acquire the lock, resolve the working tree,
//! ensure the repo and branch exist, compute the strategy's changes (with a
//! conflict check), write locally, stage without committing, read back the
//! staged bytes, push to the remote, reconcile the local tree with the
//! wrapped bytes, and build the git hint response. Any failure after staging
//! unwinds through `rollback`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{info_span, warn};

use crate::config::RsmcpPaths;
use crate::conflict::{self, ConflictCheck};
use crate::error::CoreError;
use crate::filter::Classification;
use crate::lock::LockManager;
use crate::model::{FileKind, WorkingTree};
use crate::paths::resolve_working_tree;
use crate::remote::RemoteClient;
use crate::strategies::{resolve_kind, Strategy};

use super::repo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Simple,
    LocalOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitAction {
    Commit,
    Push,
    Finish,
}

#[derive(Debug, Clone)]
pub struct GitHint {
    pub branch: String,
    pub uncommitted_count: usize,
    pub action: GitAction,
    pub command: String,
}

pub struct PipelineInput<'a> {
    pub script_id: &'a str,
    pub session_id: Option<&'a str>,
    pub mode: SyncMode,
    pub expected_hash: Option<&'a str>,
    pub force: bool,
}

pub struct PipelineOutput {
    /// Filename -> wrapped bytes actually written (Remote and, under
    /// `Simple` mode, local disk). Empty under `LocalOnly`.
    pub written: BTreeMap<String, String>,
    /// New wrapped-content hash of the primary targeted file, threaded into
    /// the caller's next call.
    pub hash: Option<String>,
    pub git: GitHint,
}

/// `executeWithGit(strategy, {scriptId, ..}) -> {result, git}`.
pub async fn execute_with_git(
    strategy: &dyn Strategy,
    remote: &dyn RemoteClient,
    lock_manager: &LockManager,
    paths: &RsmcpPaths,
    input: PipelineInput<'_>,
) -> Result<PipelineOutput, CoreError> {
    let span = info_span!("git_pipeline", script_id = input.script_id, op = strategy.name());
    let _enter = span.enter();

    // Intra-process + cross-process mutual exclusion (I1).
    let _lock_guard = lock_manager.acquire(input.script_id, strategy.name(), None)?;

    // Step 1: resolve path.
    let tree = resolve_working_tree(paths, input.script_id, input.session_id);
    let dir = tree.root().clone();

    // Step 2: ensure repo.
    repo::ensure_repo(&dir)?;
    ensure_expected_branch(&dir, &tree)?;

    // Step 3: compute.
    let remote_files = remote.get_project_content(input.script_id).await?;
    let changes = strategy.compute_changes(&remote_files)?;

    if let Some(expected) = input.expected_hash {
        check_conflicts(input.script_id, strategy.name(), &remote_files, &changes, expected, input.force)?;
    }

    let kinds: BTreeMap<String, FileKind> = changes
        .keys()
        .map(|name| (name.clone(), resolve_kind(&remote_files, name, strategy)))
        .collect();

    // Step 4: write to local disk (unwrapped, user-facing bytes).
    let touched_paths = write_local_unwrapped(&dir, &changes, &kinds)?;

    // Step 5: stage (never commit).
    let staged_result = stage_changes(&dir, &touched_paths, strategy.name(), &changes);
    if let Err(err) = staged_result {
        return Err(rollback(&dir, &touched_paths, strategy, err));
    }

    // Step 6: hook read-back.
    let validated = match read_back_hooked_content(&dir, &changes, &kinds) {
        Ok(v) => v,
        Err(err) => return Err(rollback(&dir, &touched_paths, strategy, err)),
    };

    if input.mode == SyncMode::LocalOnly {
        let git_hint = build_git_hint(&dir, &tree)?;
        return Ok(PipelineOutput {
            written: BTreeMap::new(),
            hash: None,
            git: git_hint,
        });
    }

    // Step 7: apply to Remote.
    let (new_list, written) = match strategy.apply_wrapped(&remote_files, &validated) {
        Ok(v) => v,
        Err(err) => return Err(rollback(&dir, &touched_paths, strategy, err)),
    };
    if let Err(err) = remote.update_project_content(input.script_id, new_list).await {
        return Err(rollback(&dir, &touched_paths, strategy, err));
    }

    // Step 8: reconcile local with wrapped (I2), re-stage (non-fatal).
    reconcile_local_with_wrapped(&dir, &written, &kinds);

    // Step 9: respond.
    let git_hint = build_git_hint(&dir, &tree)?;
    let hash = primary_hash(&written);

    Ok(PipelineOutput {
        written,
        hash,
        git: git_hint,
    })
}

fn ensure_expected_branch(dir: &std::path::Path, tree: &WorkingTree) -> Result<(), CoreError> {
    match tree {
        WorkingTree::Session { .. } => {
            if let Some(branch) = tree.expected_branch() {
                repo::ensure_branch(dir, &branch)?;
            }
            Ok(())
        }
        WorkingTree::Project { .. } => {
            let current = repo::current_branch(dir).unwrap_or_default();
            if current.starts_with("llm-feature-") {
                return Ok(());
            }
            let branch = format!("llm-feature-{}", chrono::Utc::now().timestamp());
            repo::ensure_branch(dir, &branch)
        }
    }
}

fn check_conflicts(
    script_id: &str,
    operation: &str,
    remote_files: &[crate::model::RemoteFile],
    changes: &crate::strategies::ChangeMap,
    expected_hash: &str,
    force: bool,
) -> Result<(), CoreError> {
    for name in changes.keys() {
        if let Some(existing) = crate::strategies::find(remote_files, name) {
            conflict::check(ConflictCheck {
                script_id,
                filename: name,
                operation,
                expected_hash: Some(expected_hash),
                current_wrapped_content: &existing.source,
                force,
            })?;
        }
    }
    Ok(())
}

fn local_path(dir: &std::path::Path, name: &str, kind: FileKind) -> PathBuf {
    dir.join(format!("{name}.{}", kind.local_extension()))
}

fn write_local_unwrapped(
    dir: &std::path::Path,
    changes: &crate::strategies::ChangeMap,
    kinds: &BTreeMap<String, FileKind>,
) -> Result<Vec<(String, PathBuf)>, CoreError> {
    let mut touched = Vec::new();
    for (name, content) in changes {
        if crate::filter::classify(name) == Classification::GitBreadcrumb {
            continue;
        }
        let kind = kinds.get(name).copied().unwrap_or(FileKind::ServerScript);
        let path = local_path(dir, name, kind);
        if content.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path)
                    .map_err(|e| CoreError::io(format!("removing {}: {e}", path.display())))?;
            }
            // xattr cache metadata for this path would be cleared here;
            // best-effort, never load-bearing.
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CoreError::io(format!("mkdir {}: {e}", parent.display())))?;
            }
            std::fs::write(&path, content)
                .map_err(|e| CoreError::io(format!("writing {}: {e}", path.display())))?;
        }
        touched.push((name.clone(), path));
    }
    Ok(touched)
}

fn stage_changes(
    dir: &std::path::Path,
    touched_paths: &[(String, PathBuf)],
    strategy_name: &str,
    changes: &crate::strategies::ChangeMap,
) -> Result<(), CoreError> {
    let files: Vec<String> = touched_paths
        .iter()
        .map(|(_, p)| p.to_string_lossy().to_string())
        .collect();
    repo::stage(dir, &files)?;

    let staged = repo::staged_names(dir)?;
    if staged.is_empty() && strategy_name == "rm" {
        let all_already_gone = changes.keys().all(|name| {
            touched_paths
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, p)| !p.exists())
                .unwrap_or(true)
        });
        if !all_already_gone {
            return Err(CoreError::fatal(
                "stage produced no diff for a delete that did not already exist locally",
            ));
        }
    }
    Ok(())
}

fn read_back_hooked_content(
    dir: &std::path::Path,
    changes: &crate::strategies::ChangeMap,
    kinds: &BTreeMap<String, FileKind>,
) -> Result<crate::strategies::ChangeMap, CoreError> {
    let mut validated = crate::strategies::ChangeMap::new();
    for (name, original) in changes {
        if original.is_empty() {
            validated.insert(name.clone(), String::new());
            continue;
        }
        let kind = kinds.get(name).copied().unwrap_or(FileKind::ServerScript);
        let path = local_path(dir, name, kind);
        let hooked = std::fs::read_to_string(&path)
            .map_err(|e| CoreError::io(format!("reading back {}: {e}", path.display())))?;
        validated.insert(name.clone(), hooked);
    }
    Ok(validated)
}

fn reconcile_local_with_wrapped(
    dir: &std::path::Path,
    written: &BTreeMap<String, String>,
    kinds: &BTreeMap<String, FileKind>,
) {
    let mut restage = Vec::new();
    for (name, wrapped) in written {
        let kind = kinds.get(name).copied().unwrap_or(FileKind::ServerScript);
        let path = local_path(dir, name, kind);
        if let Err(err) = std::fs::write(&path, wrapped) {
            warn!(file = %name, %err, "failed to reconcile local file with wrapped bytes");
            continue;
        }
        restage.push(path.to_string_lossy().to_string());
    }
    if let Err(err) = repo::stage(dir, &restage) {
        warn!(%err, "re-stage after reconcile failed (non-fatal)");
    }
}

fn build_git_hint(dir: &std::path::Path, tree: &WorkingTree) -> Result<GitHint, CoreError> {
    let branch = tree
        .expected_branch()
        .map(Ok)
        .unwrap_or_else(|| repo::current_branch(dir))?;
    let uncommitted_count = repo::staged_names(dir)?.len();
    let (action, command) = if uncommitted_count > 0 {
        (
            GitAction::Commit,
            format!("git -C {} commit -m \"<message>\"", dir.display()),
        )
    } else {
        (GitAction::Finish, "working tree clean".to_string())
    };
    Ok(GitHint {
        branch,
        uncommitted_count,
        action,
        command,
    })
}

fn primary_hash(written: &BTreeMap<String, String>) -> Option<String> {
    written
        .values()
        .next()
        .map(|content| crate::hash::git_blob_hash_str(content))
}

///: unstage, let the strategy undo any partial remote effect,
/// and surface the wrapped error.
fn rollback(
    dir: &std::path::Path,
    touched_paths: &[(String, PathBuf)],
    strategy: &dyn Strategy,
    cause: CoreError,
) -> CoreError {
    let files: Vec<String> = touched_paths
        .iter()
        .map(|(_, p)| p.to_string_lossy().to_string())
        .collect();
    if let Err(err) = repo::unstage(dir, &files) {
        warn!(%err, "unstage during rollback failed");
    }
    if let Err(err) = strategy.rollback() {
        warn!(%err, "strategy rollback failed");
    }
    CoreError::Fatal {
        message: format!("Git operation failed and was rolled back: {cause}"),
    }
}
