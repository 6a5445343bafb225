//! `.rsync-manifest.json` load/save helpers.

use std::path::Path;

use crate::error::CoreError;
use crate::model::SyncManifest;

pub const MANIFEST_FILE_NAME: &str = ".rsync-manifest.json";

pub fn manifest_path(project_dir: &Path) -> std::path::PathBuf {
    project_dir.join(MANIFEST_FILE_NAME)
}

pub fn load(project_dir: &Path) -> Result<Option<SyncManifest>, CoreError> {
    let path = manifest_path(project_dir);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)
        .map_err(|e| CoreError::io(format!("reading {}: {e}", path.display())))?;
    let manifest: SyncManifest = serde_json::from_str(&data)
        .map_err(|e| CoreError::io(format!("parsing {}: {e}", path.display())))?;
    Ok(Some(manifest))
}

pub fn save(project_dir: &Path, manifest: &SyncManifest) -> Result<(), CoreError> {
    let path = manifest_path(project_dir);
    let data = serde_json::to_string_pretty(manifest)
        .map_err(|e| CoreError::io(format!("serializing manifest: {e}")))?;
    std::fs::write(&path, data)
        .map_err(|e| CoreError::io(format!("writing {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ManifestEntry, SyncDirection};
    use tempfile::tempdir;

    #[test]
    fn missing_manifest_is_bootstrap() {
        let dir = tempdir().unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let manifest = SyncManifest {
            script_id: "abc".to_string(),
            direction: SyncDirection::Pull,
            files: vec![ManifestEntry {
                filename: "Utils".to_string(),
                hash: "deadbeef".to_string(),
                last_modified: "2026-07-26T00:00:00Z".to_string(),
            }],
            commit_sha: Some("cafe".to_string()),
        };
        save(dir.path(), &manifest).unwrap();
        let loaded = load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.script_id, "abc");
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.commit_sha, Some("cafe".to_string()));
    }
}
