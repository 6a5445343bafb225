//! The atomic write pipeline every mutating tool routes through.

pub mod pipeline;
pub mod repo;

pub use pipeline::{execute_with_git, GitAction, GitHint, PipelineInput, PipelineOutput, SyncMode};
