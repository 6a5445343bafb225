//! `cp` strategy: duplicate a file within the remote's flat namespace.

use crate::error::CoreError;
use crate::model::RemoteFile;

use super::{find, ChangeMap, Strategy};

pub struct CpStrategy {
    pub from: String,
    pub to: String,
}

impl Strategy for CpStrategy {
    fn name(&self) -> &'static str {
        "cp"
    }

    fn compute_changes(&self, remote_files: &[RemoteFile]) -> Result<ChangeMap, CoreError> {
        let (from_name, _) = crate::model::split_name_and_kind(&self.from);
        let (to_name, _) = crate::model::split_name_and_kind(&self.to);

        let source = find(remote_files, &from_name)
            .ok_or_else(|| CoreError::validation(format!("no such file on Remote: {from_name}")))?;

        if find(remote_files, &to_name).is_some() {
            return Err(CoreError::validation(format!(
                "destination already exists: {to_name}"
            )));
        }

        let unwrapped = if crate::wrapper::is_wrap_eligible(source.kind, &source.name) {
            crate::wrapper::unwrap(&source.source).user_text
        } else {
            source.source.clone()
        };

        let mut changes = ChangeMap::new();
        changes.insert(to_name, unwrapped);
        Ok(changes)
    }

    fn kind_for_new(&self, _name: &str, remote_files: &[RemoteFile]) -> crate::model::FileKind {
        let (from_name, _) = crate::model::split_name_and_kind(&self.from);
        find(remote_files, &from_name)
            .map(|f| f.kind)
            .unwrap_or(crate::model::FileKind::ServerScript)
    }

    fn apply_wrapped(
        &self,
        remote_files: &[RemoteFile],
        validated: &ChangeMap,
    ) -> Result<(Vec<RemoteFile>, ChangeMap), CoreError> {
        let (from_name, _) = crate::model::split_name_and_kind(&self.from);
        let source_kind = find(remote_files, &from_name).map(|f| f.kind);
        Ok(super::fold_into_list(remote_files, validated, |_| {
            source_kind.unwrap_or(crate::model::FileKind::ServerScript)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileKind;

    fn seed() -> Vec<RemoteFile> {
        vec![RemoteFile {
            name: "Orig".to_string(),
            kind: FileKind::ServerScript,
            source: crate::wrapper::wrap("body", None),
            update_time: None,
        }]
    }

    #[test]
    fn duplicates_file_leaving_original_intact() {
        let remote = seed();
        let strategy = CpStrategy {
            from: "Orig".to_string(),
            to: "Copy".to_string(),
        };
        let changes = strategy.compute_changes(&remote).unwrap();
        assert_eq!(changes["Copy"], "body");
        let (list, _written) = strategy.apply_wrapped(&remote, &changes).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().any(|f| f.name == "Orig"));
        assert!(list.iter().any(|f| f.name == "Copy"));
    }

    #[test]
    fn rejects_when_destination_exists() {
        let mut remote = seed();
        remote.push(RemoteFile {
            name: "Copy".to_string(),
            kind: FileKind::ServerScript,
            source: crate::wrapper::wrap("other", None),
            update_time: None,
        });
        let strategy = CpStrategy {
            from: "Orig".to_string(),
            to: "Copy".to_string(),
        };
        assert!(matches!(
            strategy.compute_changes(&remote),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn kind_for_new_carries_over_the_source_kind() {
        let remote = vec![RemoteFile {
            name: "Index".to_string(),
            kind: FileKind::Markup,
            source: "<p>hi</p>".to_string(),
            update_time: None,
        }];
        let strategy = CpStrategy {
            from: "Index".to_string(),
            to: "Copy".to_string(),
        };
        assert_eq!(strategy.kind_for_new("Copy", &remote), FileKind::Markup);
    }
}
