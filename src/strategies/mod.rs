//! One strategy per mutation kind. Each strategy implements `compute_changes`
//! (read the remote, decide new unwrapped content, empty string = deletion)
//! and `apply_wrapped` (fold the validated content into the full remote file
//! list, wrapping eligible files). `rollback` is a no-op for every strategy
//! here since the remote API is a single atomic full-replace — there is no
//! partial remote effect to undo; the hook exists to satisfy the pipeline's
//! uniform rollback contract, and collaborators with non-atomic remote SDKs
//! can override it.

pub mod aider;
pub mod cp;
pub mod edit;
pub mod mv;
pub mod rm;
pub mod write;

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::model::{FileKind, RemoteFile};
use crate::wrapper;

/// `newContent`, keyed by bare Remote filename. Empty string denotes deletion
///.
pub type ChangeMap = BTreeMap<String, String>;

pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Read `remote_files`, decide this operation's changes. Returns
    /// **unwrapped** content.
    fn compute_changes(&self, remote_files: &[RemoteFile]) -> Result<ChangeMap, CoreError>;

    /// The `FileKind` a newly created `name` should take (existing files keep
    /// their own kind regardless of this). `write` infers it from the
    /// caller's path suffix; `mv`/`cp` carry over the source file's kind from
    /// `remote_files`.
    fn kind_for_new(&self, _name: &str, _remote_files: &[RemoteFile]) -> FileKind {
        FileKind::ServerScript
    }

    /// Fold `validated` (post hook-read-back) into the full
    /// Remote file list. Returns the new list to send via
    /// `RemoteClient::update_project_content` and a map of filename to the
    /// exact wrapped bytes written, for local reconciliation.
    fn apply_wrapped(
        &self,
        remote_files: &[RemoteFile],
        validated: &ChangeMap,
    ) -> Result<(Vec<RemoteFile>, ChangeMap), CoreError>;

    /// Undo any partial remote effect. No-op by default (see module docs).
    fn rollback(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

pub fn find<'a>(remote_files: &'a [RemoteFile], name: &str) -> Option<&'a RemoteFile> {
    remote_files.iter().find(|f| f.name == name)
}

/// Kind a local file named `name` should take: existing remote kind if
/// present, else the strategy's own inference for brand-new files. Used by
/// the pipeline to pick the local kind-derived extension before the write
/// has actually reached the Remote.
pub fn resolve_kind(remote_files: &[RemoteFile], name: &str, strategy: &dyn Strategy) -> FileKind {
    find(remote_files, name)
        .map(|f| f.kind)
        .unwrap_or_else(|| strategy.kind_for_new(name, remote_files))
}

/// Default apply: replace/insert/remove entries in `remote_files` per
/// `validated`, wrapping content for wrap-eligible `ServerScript` entries and
/// preserving each file's existing module options across the edit, the same
/// way the rsync push-apply preserves them.
pub fn fold_into_list(
    remote_files: &[RemoteFile],
    validated: &ChangeMap,
    kind_for_new: impl Fn(&str) -> FileKind,
) -> (Vec<RemoteFile>, ChangeMap) {
    let mut list: Vec<RemoteFile> = remote_files.to_vec();
    let mut written = ChangeMap::new();

    for (name, new_content) in validated {
        let existing_idx = list.iter().position(|f| f.name == *name);

        if new_content.is_empty() {
            if let Some(idx) = existing_idx {
                list.remove(idx);
            }
            continue;
        }

        let kind = existing_idx
            .map(|idx| list[idx].kind)
            .unwrap_or_else(|| kind_for_new(name));

        let existing_options = existing_idx.and_then(|idx| {
            if wrapper::is_wrap_eligible(list[idx].kind, &list[idx].name) {
                wrapper::unwrap(&list[idx].source).existing_options
            } else {
                None
            }
        });

        let wrapped = if wrapper::is_wrap_eligible(kind, name) {
            wrapper::wrap(new_content, existing_options.as_ref())
        } else {
            new_content.clone()
        };

        written.insert(name.clone(), wrapped.clone());

        let entry = RemoteFile {
            name: name.clone(),
            kind,
            source: wrapped,
            update_time: None,
        };
        match existing_idx {
            Some(idx) => list[idx] = entry,
            None => list.push(entry),
        }
    }

    (list, written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_preserves_module_options_on_update() {
        let opts = crate::model::ModuleOptions {
            load_now: Some(true),
            hoisted_functions: None,
        };
        let wrapped = wrapper::wrap("old body", Some(&opts));
        let remote = vec![RemoteFile {
            name: "Utils".to_string(),
            kind: FileKind::ServerScript,
            source: wrapped,
            update_time: None,
        }];
        let mut validated = ChangeMap::new();
        validated.insert("Utils".to_string(), "new body".to_string());

        let (list, written) = fold_into_list(&remote, &validated, |_| FileKind::ServerScript);
        assert_eq!(list.len(), 1);
        let unwrapped = wrapper::unwrap(&list[0].source);
        assert_eq!(unwrapped.user_text, "new body");
        assert_eq!(unwrapped.existing_options, Some(opts));
        assert!(written.contains_key("Utils"));
    }

    #[test]
    fn fold_removes_entry_on_empty_content() {
        let remote = vec![RemoteFile {
            name: "Utils".to_string(),
            kind: FileKind::ServerScript,
            source: wrapper::wrap("body", None),
            update_time: None,
        }];
        let mut validated = ChangeMap::new();
        validated.insert("Utils".to_string(), String::new());
        let (list, _written) = fold_into_list(&remote, &validated, |_| FileKind::ServerScript);
        assert!(list.is_empty());
    }
}
