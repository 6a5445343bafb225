//! Stateless three-way diff and unidirectional apply between a project's
//! local files, its remote copy, and the last-synced manifest.

pub mod apply;
pub mod diff;
pub mod manifest;

pub use apply::{apply_pull, apply_push, ApplyResult};
pub use diff::{compute_diff, DiffSummary, FileDiff, FileDiffKind};
