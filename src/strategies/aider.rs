//! `aider` strategy: Levenshtein-similarity fuzzy edits.

use crate::error::CoreError;
use crate::model::{FileKind, RemoteFile};
use crate::similarity::best_match;
use crate::wrapper;

use super::{find, fold_into_list, ChangeMap, Strategy};

const MAX_EDITS: usize = 20;
const MAX_SEARCH_TEXT_CHARS: usize = 1000;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct FuzzyEdit {
    pub search_text: String,
    pub replace_text: String,
    pub similarity_threshold: Option<f64>,
}

pub struct AiderStrategy {
    pub path: String,
    pub edits: Vec<FuzzyEdit>,
}

impl Strategy for AiderStrategy {
    fn name(&self) -> &'static str {
        "aider"
    }

    fn compute_changes(&self, remote_files: &[RemoteFile]) -> Result<ChangeMap, CoreError> {
        if self.edits.is_empty() || self.edits.len() > MAX_EDITS {
            return Err(CoreError::validation(format!(
                "edits must contain between 1 and {MAX_EDITS} entries"
            )));
        }
        for edit in &self.edits {
            if edit.search_text.chars().count() > MAX_SEARCH_TEXT_CHARS {
                return Err(CoreError::validation(format!(
                    "searchText exceeds {MAX_SEARCH_TEXT_CHARS} characters"
                )));
            }
        }

        let (name, _kind) = crate::model::split_name_and_kind(&self.path);
        let file = find(remote_files, &name)
            .ok_or_else(|| CoreError::validation(format!("no such file on Remote: {name}")))?;

        let current_text = if wrapper::is_wrap_eligible(file.kind, &file.name) {
            wrapper::unwrap(&file.source).user_text
        } else {
            file.source.clone()
        };

        let mut ranges: Vec<(usize, usize, &str)> = Vec::new();
        let chars: Vec<char> = current_text.chars().collect();

        for edit in &self.edits {
            let threshold = edit.similarity_threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
            let (start, end, score) = best_match(&current_text, &edit.search_text)
                .ok_or_else(|| CoreError::validation(format!("no match above threshold in {name}")))?;
            if score < threshold {
                return Err(CoreError::validation(format!(
                    "no match above threshold in {name} (best score {score:.2} < {threshold:.2})"
                )));
            }
            if ranges.iter().any(|(s, e, _)| start < *e && end > *s) {
                return Err(CoreError::validation(format!(
                    "overlap detected while applying edits to {name}"
                )));
            }
            ranges.push((start, end, edit.replace_text.as_str()));
        }

        ranges.sort_by(|a, b| b.0.cmp(&a.0));
        let mut out_chars = chars;
        for (start, end, replacement) in ranges {
            out_chars.splice(start..end, replacement.chars());
        }

        let mut changes = ChangeMap::new();
        changes.insert(name, out_chars.into_iter().collect());
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
