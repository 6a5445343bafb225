//! `status` tool: aggregated health across auth, project, git, locks, cache,
//! and sync.

use serde::Serialize;

use crate::config::{RsmcpConfig, RsmcpPaths};
use crate::git_ops::repo;
use crate::lock::LockManager;
use crate::remote::CachedTokens;
use crate::rsync::manifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSection {
    Auth,
    Project,
    Git,
    Locks,
    Cache,
    Sync,
}

impl StatusSection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auth" => Some(Self::Auth),
            "project" => Some(Self::Project),
            "git" => Some(Self::Git),
            "locks" => Some(Self::Locks),
            "cache" => Some(Self::Cache),
            "sync" => Some(Self::Sync),
            _ => None,
        }
    }

    pub const ALL: [StatusSection; 6] = [
        StatusSection::Auth,
        StatusSection::Project,
        StatusSection::Git,
        StatusSection::Locks,
        StatusSection::Cache,
        StatusSection::Sync,
    ];
}

#[derive(Debug, Serialize, Default)]
pub struct StatusReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locks: Option<LocksStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub authenticated: bool,
    pub user_email: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    pub script_id: String,
    pub working_tree: String,
    pub exists: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitStatus {
    pub branch: Option<String>,
    pub uncommitted_count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocksStatus {
    pub locked: bool,
    pub holder_pid: Option<u32>,
    pub currently_held: usize,
    pub contentions: u64,
    pub timeouts: u64,
    pub stale_removed: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub home: String,
    pub lock_timeout_secs: u64,
    pub dev_mode: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub has_manifest: bool,
    pub direction: Option<String>,
    pub file_count: usize,
}

pub struct StatusInput<'a> {
    pub script_id: &'a str,
    pub sections: &'a [StatusSection],
    pub paths: &'a RsmcpPaths,
    pub config: &'a RsmcpConfig,
    pub lock_manager: &'a LockManager,
    pub cached_tokens: Option<&'a CachedTokens>,
}

pub fn collect(input: StatusInput<'_>) -> StatusReport {
    let mut report = StatusReport::default();
    let project_dir = input.paths.project_repo(input.script_id);

    for section in input.sections {
        match section {
            StatusSection::Auth => {
                report.auth = Some(AuthStatus {
                    authenticated: input.cached_tokens.is_some(),
                    user_email: input.cached_tokens.map(|t| t.user_email.clone()),
                    expires_at: input.cached_tokens.map(|t| t.expires_at.clone()),
                });
            }
            StatusSection::Project => {
                report.project = Some(ProjectStatus {
                    script_id: input.script_id.to_string(),
                    working_tree: project_dir.display().to_string(),
                    exists: project_dir.exists(),
                });
            }
            StatusSection::Git => {
                let (branch, uncommitted_count) = if project_dir.join(".git").exists() {
                    (
                        repo::current_branch(&project_dir).ok(),
                        repo::staged_names(&project_dir).ok().map(|v| v.len()),
                    )
                } else {
                    (None, None)
                };
                report.git = Some(GitStatus {
                    branch,
                    uncommitted_count,
                });
            }
            StatusSection::Locks => {
                let lock_status = input.lock_manager.status(input.script_id);
                let metrics = input.lock_manager.metrics();
                report.locks = Some(LocksStatus {
                    locked: lock_status.locked,
                    holder_pid: lock_status.holder.map(|h| h.pid),
                    currently_held: metrics.currently_held,
                    contentions: metrics.contentions,
                    timeouts: metrics.timeouts,
                    stale_removed: metrics.stale_removed,
                });
            }
            StatusSection::Cache => {
                report.cache = Some(CacheStatus {
                    home: input.paths.repos_root().display().to_string(),
                    lock_timeout_secs: input.config.lock_timeout_secs,
                    dev_mode: input.config.dev_mode,
                });
            }
            StatusSection::Sync => {
                let loaded = manifest::load(&project_dir).ok().flatten();
                report.sync = Some(SyncStatus {
                    has_manifest: loaded.is_some(),
                    direction: loaded.as_ref().map(|m| format!("{:?}", m.direction).to_lowercase()),
                    file_count: loaded.map(|m| m.files.len()).unwrap_or(0),
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn collects_only_requested_sections() {
        let dir = tempdir().unwrap();
        let paths = RsmcpPaths::for_home(dir.path().to_path_buf());
        let config = RsmcpConfig::default();
        let lock_manager = LockManager::new(paths.locks_dir()).unwrap();

        let report = collect(StatusInput {
            script_id: "script123456789012345678901",
            sections: &[StatusSection::Locks, StatusSection::Cache],
            paths: &paths,
            config: &config,
            lock_manager: &lock_manager,
            cached_tokens: None,
        });

        assert!(report.locks.is_some());
        assert!(report.cache.is_some());
        assert!(report.auth.is_none());
        assert!(report.project.is_none());
    }

    #[test]
    fn parses_known_section_names() {
        assert_eq!(StatusSection::parse("git"), Some(StatusSection::Git));
        assert_eq!(StatusSection::parse("bogus"), None);
    }
}
