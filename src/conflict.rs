//! Content-hash conflict detection: optimistic concurrency over the stored
//! wrapped bytes.

use crate::error::CoreError;
use crate::hash::git_blob_hash_str;

pub struct ConflictCheck<'a> {
    pub script_id: &'a str,
    pub filename: &'a str,
    pub operation: &'a str,
    pub expected_hash: Option<&'a str>,
    pub current_wrapped_content: &'a str,
    pub force: bool,
}

/// Compare `expectedHash` against the hash of the stored wrapped content. No
/// mismatch (or none supplied, or `force`) returns the current hash for the
/// caller to thread into its next call; a mismatch returns a `Conflict` error
/// carrying both hashes and a short diff preview.
pub fn check(args: ConflictCheck<'_>) -> Result<String, CoreError> {
    let current_hash = git_blob_hash_str(args.current_wrapped_content);

    if args.force {
        return Ok(current_hash);
    }

    match args.expected_hash {
        Some(expected) if expected != current_hash => Err(CoreError::Conflict {
            script_id: args.script_id.to_string(),
            filename: args.filename.to_string(),
            operation: args.operation.to_string(),
            expected_hash: expected.to_string(),
            current_hash: current_hash.clone(),
            diff_preview: diff_preview(args.current_wrapped_content),
            hints: vec![
                "re-read the file to get the current hash, then retry with the new expectedHash"
                    .to_string(),
                "or pass force: true to overwrite".to_string(),
            ],
        }),
        _ => Ok(current_hash),
    }
}

fn diff_preview(content: &str) -> String {
    const MAX_CHARS: usize = 200;
    let truncated: String = content.chars().take(MAX_CHARS).collect();
    if content.chars().count() > MAX_CHARS {
        format!("{truncated}…")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_hash_succeeds() {
        let content = "function _main(module, exports, require){x}\n__defineModule__(_main);";
        let hash = git_blob_hash_str(content);
        let result = check(ConflictCheck {
            script_id: "s",
            filename: "Utils",
            operation: "edit",
            expected_hash: Some(&hash),
            current_wrapped_content: content,
            force: false,
        });
        assert_eq!(result.unwrap(), hash);
    }

    #[test]
    fn mismatched_hash_without_force_is_conflict() {
        let content = "a";
        let result = check(ConflictCheck {
            script_id: "s",
            filename: "Utils",
            operation: "edit",
            expected_hash: Some("deadbeef"),
            current_wrapped_content: content,
            force: false,
        });
        assert!(matches!(result, Err(CoreError::Conflict { .. })));
    }

    #[test]
    fn force_bypasses_mismatch() {
        let content = "a";
        let result = check(ConflictCheck {
            script_id: "s",
            filename: "Utils",
            operation: "edit",
            expected_hash: Some("deadbeef"),
            current_wrapped_content: content,
            force: true,
        });
        assert!(result.is_ok());
    }

    #[test]
    fn no_expected_hash_always_succeeds() {
        let content = "a";
        let result = check(ConflictCheck {
            script_id: "s",
            filename: "Utils",
            operation: "edit",
            expected_hash: None,
            current_wrapped_content: content,
            force: false,
        });
        assert!(result.is_ok());
    }
}
