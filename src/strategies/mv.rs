//! `mv` strategy: rename within the remote's flat namespace. Rejects the
//! rename outright when the destination name is already taken rather than
//! silently overwriting it.

use crate::error::CoreError;
use crate::model::RemoteFile;

use super::{find, ChangeMap, Strategy};

pub struct MvStrategy {
    pub from: String,
    pub to: String,
}

impl Strategy for MvStrategy {
    fn name(&self) -> &'static str {
        "mv"
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
        changes.insert(from_name, String::new());
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
