//! Remote SDK collaborator seam. The real HTTP client is out of scope here;
//! this module defines the trait the core depends on plus an in-memory
//! reference implementation sufficient to run the core standalone and drive
//! tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::RemoteFile;

/// The three Remote operations the core consumes.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn get_project_content(&self, script_id: &str) -> Result<Vec<RemoteFile>, CoreError>;

    /// Atomic full replace of the project's file list.
    async fn update_project_content(
        &self,
        script_id: &str,
        files: Vec<RemoteFile>,
    ) -> Result<(), CoreError>;
}

/// Cached OAuth credentials for one principal.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CachedTokens {
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: String,
    pub scope: String,
    pub token_type: String,
    pub user_email: String,
    pub user_name: String,
    pub user_id: String,
    pub created_at: String,
    pub last_used: String,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, principal: &str) -> Result<Option<CachedTokens>, CoreError>;
    async fn save(&self, principal: &str, tokens: CachedTokens) -> Result<(), CoreError>;
}

/// In-memory `RemoteClient` for tests and standalone operation: a
/// `HashMap<scriptId, Vec<RemoteFile>>` behind a mutex, matching the
/// single-process, no-background-polling model (Non-goals: no background
/// polling).
pub struct InMemoryRemote {
    projects: Mutex<HashMap<String, Vec<RemoteFile>>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            projects: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, script_id: &str, files: Vec<RemoteFile>) {
        self.projects
            .lock()
            .expect("lock poisoned")
            .insert(script_id.to_string(), files);
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteClient for InMemoryRemote {
    async fn get_project_content(&self, script_id: &str) -> Result<Vec<RemoteFile>, CoreError> {
        Ok(self
            .projects
            .lock()
            .expect("lock poisoned")
            .get(script_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_project_content(
        &self,
        script_id: &str,
        files: Vec<RemoteFile>,
    ) -> Result<(), CoreError> {
        self.projects
            .lock()
            .expect("lock poisoned")
            .insert(script_id.to_string(), files);
        Ok(())
    }
}

/// File-backed `TokenStore`: one JSON file per principal under
/// `RsmcpPaths::tokens_dir()`, 0600/0700 perms.
pub struct FileTokenStore {
    paths: crate::config::RsmcpPaths,
}

impl FileTokenStore {
    pub fn new(paths: crate::config::RsmcpPaths) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self, principal: &str) -> Result<Option<CachedTokens>, CoreError> {
        let path = self.paths.token_file(principal);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&path)
            .map_err(|e| CoreError::io(format!("reading token cache: {e}")))?;
        let tokens = serde_json::from_slice(&data)
            .map_err(|e| CoreError::io(format!("parsing token cache: {e}")))?;
        Ok(Some(tokens))
    }

    async fn save(&self, principal: &str, tokens: CachedTokens) -> Result<(), CoreError> {
        let dir = self.paths.tokens_dir();
        std::fs::create_dir_all(&dir)
            .map_err(|e| CoreError::io(format!("creating token cache dir: {e}")))?;
        set_dir_perms(&dir);
        let path = self.paths.token_file(principal);
        let pretty = serde_json::to_vec_pretty(&tokens)
            .map_err(|e| CoreError::io(format!("serializing token cache: {e}")))?;
        std::fs::write(&path, pretty)
            .map_err(|e| CoreError::io(format!("writing token cache: {e}")))?;
        set_file_perms(&path);
        Ok(())
    }
}

#[cfg(unix)]
fn set_dir_perms(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700));
}

#[cfg(not(unix))]
fn set_dir_perms(_path: &std::path::Path) {}

#[cfg(unix)]
fn set_file_perms(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn set_file_perms(_path: &std::path::Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileKind;

    #[tokio::test]
    async fn in_memory_remote_round_trips_content() {
        let remote = InMemoryRemote::new();
        let files = vec![RemoteFile {
            name: "Utils".to_string(),
            kind: FileKind::ServerScript,
            source: "wrapped".to_string(),
            update_time: None,
        }];
        remote
            .update_project_content("proj1", files.clone())
            .await
            .unwrap();
        let fetched = remote.get_project_content("proj1").await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].name, "Utils");
    }

    #[tokio::test]
    async fn unknown_project_returns_empty() {
        let remote = InMemoryRemote::new();
        let fetched = remote.get_project_content("nope").await.unwrap();
        assert!(fetched.is_empty());
    }

    #[tokio::test]
    async fn file_token_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let paths = crate::config::RsmcpPaths::for_home(dir.path().to_path_buf());
        let store = FileTokenStore::new(paths);
        assert!(store.load("user@example.com").await.unwrap().is_none());
        let tokens = CachedTokens {
            session_id: "s1".to_string(),
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_at: "2026-01-01T00:00:00Z".to_string(),
            scope: "projects".to_string(),
            token_type: "Bearer".to_string(),
            user_email: "user@example.com".to_string(),
            user_name: "User".to_string(),
            user_id: "u1".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            last_used: "2026-01-01T00:00:00Z".to_string(),
        };
        store.save("user@example.com", tokens.clone()).await.unwrap();
        let loaded = store.load("user@example.com").await.unwrap().unwrap();
        assert_eq!(loaded.access_token, "at");
    }
}
