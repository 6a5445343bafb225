//! Resolves the persistent-state directory layout, overridable via
//! `RSMCP_HOME` so tests can run against an isolated tree.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Resolved filesystem layout for a running daemon instance.
#[derive(Debug, Clone)]
pub struct RsmcpPaths {
    home: PathBuf,
}

impl RsmcpPaths {
    /// Resolve from `RSMCP_HOME` if set (tests always set this), otherwise
    /// from the platform's standard data directory via `directories`.
    pub fn resolve() -> Result<Self> {
        if let Ok(override_dir) = std::env::var("RSMCP_HOME") {
            return Ok(Self {
                home: PathBuf::from(override_dir),
            });
        }
        if let Some(pd) = directories::ProjectDirs::from("", "", "rsmcp") {
            return Ok(Self {
                home: pd.data_dir().to_path_buf(),
            });
        }
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .context("unable to determine home directory")?;
        Ok(Self {
            home: home.join(".rsmcp"),
        })
    }

    pub fn for_home(home: PathBuf) -> Self {
        Self { home }
    }

    /// `~/gas-repos/` — primary working tree root.
    pub fn repos_root(&self) -> PathBuf {
        self.home.join("gas-repos")
    }

    pub fn project_repo(&self, script_id: &str) -> PathBuf {
        self.repos_root().join(format!("project-{script_id}"))
    }

    /// `~/.mcp-gas/worktrees/` — session-isolated worktree root.
    pub fn worktrees_root(&self) -> PathBuf {
        self.home.join(".mcp-gas").join("worktrees")
    }

    pub fn session_worktree(&self, script_id: &str, session_id: &str) -> PathBuf {
        self.worktrees_root().join(script_id).join(session_id)
    }

    /// `~/.auth/mcp-gas/locks/` — lock directory.
    pub fn locks_dir(&self) -> PathBuf {
        self.home.join(".auth").join("mcp-gas").join("locks")
    }

    /// `~/.auth/tokens/` — OAuth token cache directory.
    pub fn tokens_dir(&self) -> PathBuf {
        self.home.join(".auth").join("tokens")
    }

    pub fn token_file(&self, principal: &str) -> PathBuf {
        self.tokens_dir().join(format!("{principal}.json"))
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.json")
    }
}

/// Daemon-wide settings outside the fixed path layout: default timeouts and
/// OAuth endpoints, persisted as JSON with load-or-default / save-if-missing
/// semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsmcpConfig {
    pub lock_timeout_secs: u64,
    pub oauth_callback_port: u16,
    pub dev_mode: bool,
}

impl Default for RsmcpConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: 30,
            oauth_callback_port: 3000,
            dev_mode: false,
        }
    }
}

impl RsmcpConfig {
    pub fn load_or_default(paths: &RsmcpPaths) -> Result<Self> {
        let path = paths.config_path();
        if path.exists() {
            let data =
                fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let cfg: RsmcpConfig = serde_json::from_slice(&data)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(cfg)
        } else {
            Ok(RsmcpConfig {
                dev_mode: std::env::var("RSMCP_DEV").as_deref() == Ok("1"),
                ..Default::default()
            })
        }
    }

    pub fn save_if_missing(&self, paths: &RsmcpPaths) -> Result<()> {
        let path = paths.config_path();
        if !path.exists() {
            self.save(paths)?;
        }
        Ok(())
    }

    pub fn save(&self, paths: &RsmcpPaths) -> Result<()> {
        let path = paths.config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pretty = serde_json::to_string_pretty(self)?;
        fs::write(&path, pretty).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_matches_spec_paths() {
        let home = PathBuf::from("/home/u");
        let paths = RsmcpPaths::for_home(home.clone());
        assert_eq!(
            paths.project_repo("abc"),
            home.join("gas-repos/project-abc")
        );
        assert_eq!(
            paths.session_worktree("abc", "sess1"),
            home.join(".mcp-gas/worktrees/abc/sess1")
        );
        assert_eq!(paths.locks_dir(), home.join(".auth/mcp-gas/locks"));
        assert_eq!(
            paths.token_file("user@example.com"),
            home.join(".auth/tokens/user@example.com.json")
        );
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let paths = RsmcpPaths::for_home(dir.path().to_path_buf());
        let cfg = RsmcpConfig {
            lock_timeout_secs: 45,
            ..Default::default()
        };
        cfg.save(&paths).unwrap();
        let loaded = RsmcpConfig::load_or_default(&paths).unwrap();
        assert_eq!(loaded.lock_timeout_secs, 45);
    }
}
