//! A typed error taxonomy the pipeline and tool router match on: `thiserror`
//! for matchable core variants, `anyhow` at the CLI/tool-call boundary.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    Auth {
        message: String,
        hints: Vec<String>,
    },

    #[error("conflict on {filename}: expected {expected_hash}, current {current_hash}")]
    Conflict {
        script_id: String,
        filename: String,
        operation: String,
        expected_hash: String,
        current_hash: String,
        diff_preview: String,
        hints: Vec<String>,
    },

    #[error("lock timeout on {script_id} (held by {holder})")]
    LockTimeout { script_id: String, holder: String },

    #[error("remote error: {message}")]
    Remote { message: String, retryable: bool },

    #[error("local I/O or git error: {message}")]
    Io { message: String },

    #[error("deletions require confirmation: {}", files.join(", "))]
    DeletionRequiresConfirmation { files: Vec<String> },

    #[error("invariant violated: {message}")]
    Fatal { message: String },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        CoreError::Io {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        CoreError::Fatal {
            message: message.into(),
        }
    }

    /// Structured envelope `{code, message, details?, hints?}` for the tool-call
    /// response.
    pub fn to_envelope(&self, dev_mode: bool) -> ErrorEnvelope {
        let (code, details, hints) = match self {
            CoreError::Validation { .. } => ("validation", None, vec![]),
            CoreError::Auth { hints, .. } => ("auth", None, hints.clone()),
            CoreError::Conflict {
                expected_hash,
                current_hash,
                diff_preview,
                hints,
                ..
            } => (
                "conflict",
                Some(serde_json::json!({
                    "expectedHash": expected_hash,
                    "currentHash": current_hash,
                    "diffPreview": diff_preview,
                })),
                hints.clone(),
            ),
            CoreError::LockTimeout { holder, .. } => (
                "lock_timeout",
                Some(serde_json::json!({ "holder": holder })),
                vec![],
            ),
            CoreError::Remote { retryable, .. } => (
                "remote",
                Some(serde_json::json!({ "retryable": retryable })),
                vec![],
            ),
            CoreError::Io { .. } => ("io", None, vec![]),
            CoreError::DeletionRequiresConfirmation { files } => (
                "deletion_requires_confirmation",
                Some(serde_json::json!({ "files": files })),
                vec!["pass confirmDeletions: true to proceed".to_string()],
            ),
            CoreError::Fatal { .. } => ("fatal", None, vec![]),
        };
        ErrorEnvelope {
            code: code.to_string(),
            message: self.to_string(),
            details,
            hints,
            stack: if dev_mode {
                Some(format!("{self:?}"))
            } else {
                None
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

pub type CoreResult<T> = Result<T, CoreError>;
