//! `rm` strategy: delete a file.

use crate::error::CoreError;
use crate::model::RemoteFile;

use super::{find, fold_into_list, ChangeMap, Strategy};

pub struct RmStrategy {
    pub from: String,
}

impl Strategy for RmStrategy {
    fn name(&self) -> &'static str {
        "rm"
    }

    fn compute_changes(&self, remote_files: &[RemoteFile]) -> Result<ChangeMap, CoreError> {
        let (name, _) = crate::model::split_name_and_kind(&self.from);
        if find(remote_files, &name).is_none() {
            return Err(CoreError::validation(format!(
                "no such file on Remote: {name}"
            )));
        }
        let mut changes = ChangeMap::new();
        changes.insert(name, String::new());
        Ok(changes)
    }

    fn apply_wrapped(
        &self,
        remote_files: &[RemoteFile],
        validated: &ChangeMap,
    ) -> Result<(Vec<RemoteFile>, ChangeMap), CoreError> {
        Ok(fold_into_list(remote_files, validated, |_| {
            crate::model::FileKind::ServerScript
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileKind;

    #[test]
    fn deletes_existing_file() {
        let remote = vec![RemoteFile {
            name: "Utils".to_string(),
            kind: FileKind::ServerScript,
            source: crate::wrapper::wrap("body", None),
            update_time: None,
        }];
        let strategy = RmStrategy {
            from: "Utils".to_string(),
        };
        let changes = strategy.compute_changes(&remote).unwrap();
        assert_eq!(changes["Utils"], "");
        let (list, _written) = strategy.apply_wrapped(&remote, &changes).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn rejects_missing_file() {
        let strategy = RmStrategy {
            from: "Missing".to_string(),
        };
        assert!(matches!(
            strategy.compute_changes(&[]),
            Err(CoreError::Validation { .. })
        ));
    }
}
