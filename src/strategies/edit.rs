//! `edit` strategy: exact find/replace through the pipeline.

use crate::error::CoreError;
use crate::model::{FileKind, RemoteFile};
use crate::wrapper;

use super::{find, fold_into_list, ChangeMap, Strategy};

#[derive(Debug, Clone)]
pub struct ExactEdit {
    pub old_string: String,
    pub new_string: String,
}

pub struct EditStrategy {
    pub path: String,
    pub edits: Vec<ExactEdit>,
}

impl Strategy for EditStrategy {
    fn name(&self) -> &'static str {
        "edit"
    }

    fn compute_changes(&self, remote_files: &[RemoteFile]) -> Result<ChangeMap, CoreError> {
        if self.edits.is_empty() || self.edits.len() > 20 {
            return Err(CoreError::validation(
                "edits must contain between 1 and 20 entries",
            ));
        }

        let (name, _kind) = crate::model::split_name_and_kind(&self.path);
        let file = find(remote_files, &name).ok_or_else(|| {
            CoreError::validation(format!("no such file on Remote: {name}"))
        })?;

        let current_text = if wrapper::is_wrap_eligible(file.kind, &file.name) {
            wrapper::unwrap(&file.source).user_text
        } else {
            file.source.clone()
        };

        // Locate every edit's range against the *original* text first (not
        // progressively modified text) so overlap detection is meaningful,
        // then apply replacements back-to-front so earlier offsets stay valid.
        let mut ranges: Vec<(usize, usize, &str)> = Vec::new();
        for edit in &self.edits {
            let Some(start) = current_text.find(&edit.old_string) else {
                return Err(CoreError::validation(format!(
                    "no match for search text in {name}: {:?}",
                    truncate(&edit.old_string)
                )));
            };
            let end = start + edit.old_string.len();
            if ranges.iter().any(|(s, e, _)| start < *e && end > *s) {
                return Err(CoreError::validation(format!(
                    "overlap detected while applying edits to {name}"
                )));
            }
            ranges.push((start, end, edit.new_string.as_str()));
        }

        ranges.sort_by(|a, b| b.0.cmp(&a.0));
        let mut result = current_text.clone();
        for (start, end, replacement) in ranges {
            result.replace_range(start..end, replacement);
        }

        let mut changes = ChangeMap::new();
        changes.insert(name, result);
        Ok(changes)
    }

    fn apply_wrapped(
        &self,
        remote_files: &[RemoteFile],
        validated: &ChangeMap,
    ) -> Result<(Vec<RemoteFile>, ChangeMap), CoreError> {
        Ok(fold_into_list(remote_files, validated, |_| {
            FileKind::ServerScript
        }))
    }
}

fn truncate(s: &str) -> String {
    const MAX_CHARS: usize = 80;
    let truncated: String = s.chars().take(MAX_CHARS).collect();
    if s.chars().count() > MAX_CHARS {
        format!("{truncated}…")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(content: &str) -> Vec<RemoteFile> {
        vec![RemoteFile {
            name: "Utils".to_string(),
            kind: FileKind::ServerScript,
            source: wrapper::wrap(content, None),
            update_time: None,
        }]
    }

    #[test]
    fn single_exact_replace_succeeds() {
        let remote = seed("function f(){return 1}");
        let strategy = EditStrategy {
            path: "Utils".to_string(),
            edits: vec![ExactEdit {
                old_string: "return 1".to_string(),
                new_string: "return 2".to_string(),
            }],
        };
        let changes = strategy.compute_changes(&remote).unwrap();
        assert_eq!(changes["Utils"], "function f(){return 2}");
    }

    #[test]
    fn no_match_is_validation_error() {
        let remote = seed("function f(){return 1}");
        let strategy = EditStrategy {
            path: "Utils".to_string(),
            edits: vec![ExactEdit {
                old_string: "nonexistent".to_string(),
                new_string: "x".to_string(),
            }],
        };
        assert!(matches!(
            strategy.compute_changes(&remote),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn overlapping_edits_rejected() {
        let remote = seed("aaaa");
        let strategy = EditStrategy {
            path: "Utils".to_string(),
            edits: vec![
                ExactEdit {
                    old_string: "aaa".to_string(),
                    new_string: "bbb".to_string(),
                },
                ExactEdit {
                    old_string: "aaaa".to_string(),
                    new_string: "cccc".to_string(),
                },
            ],
        };
        assert!(matches!(
            strategy.compute_changes(&remote),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn empty_edits_rejected() {
        let remote = seed("x");
        let strategy = EditStrategy {
            path: "Utils".to_string(),
            edits: vec![],
        };
        assert!(matches!(
            strategy.compute_changes(&remote),
            Err(CoreError::Validation { .. })
        ));
    }
}
