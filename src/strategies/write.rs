//! `write` strategy: full-file replacement or creation.

use crate::error::CoreError;
use crate::model::{split_name_and_kind, FileKind, RemoteFile};

use super::{fold_into_list, ChangeMap, Strategy};

pub struct WriteStrategy {
    pub path: String,
    pub content: String,
}

impl Strategy for WriteStrategy {
    fn name(&self) -> &'static str {
        "write"
    }

    fn compute_changes(&self, _remote_files: &[RemoteFile]) -> Result<ChangeMap, CoreError> {
        let (name, _kind) = split_name_and_kind(&self.path);
        let mut changes = ChangeMap::new();
        changes.insert(name, self.content.clone());
        Ok(changes)
    }

    fn kind_for_new(&self, _name: &str, _remote_files: &[RemoteFile]) -> FileKind {
        split_name_and_kind(&self.path).1
    }

    fn apply_wrapped(
        &self,
        remote_files: &[RemoteFile],
        validated: &ChangeMap,
    ) -> Result<(Vec<RemoteFile>, ChangeMap), CoreError> {
        let (_, inferred_kind) = split_name_and_kind(&self.path);
        Ok(fold_into_list(remote_files, validated, |_| inferred_kind))
    }
}
