//! MCP tool surface: one tool per mutating operation plus `status`, all
//! routed through the git operation pipeline or the rsync engine.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters, ServerHandler},
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    service::ServiceExt,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::{RsmcpConfig, RsmcpPaths};
use crate::error::CoreError;
use crate::git_ops::{execute_with_git, GitAction, GitHint, PipelineInput, PipelineOutput, SyncMode};
use crate::lock::LockManager;
use crate::model::{ScriptId, SyncDirection};
use crate::remote::RemoteClient;
use crate::rsync::{apply::{apply_pull, apply_push}, diff::{compute_diff, list_local_files}, manifest};
use crate::status::{self, StatusSection};
use crate::strategies::{
    aider::{AiderStrategy, FuzzyEdit},
    cp::CpStrategy,
    edit::{EditStrategy, ExactEdit},
    mv::MvStrategy,
    rm::RmStrategy,
    write::WriteStrategy,
    Strategy,
};

pub fn run_server(
    paths: RsmcpPaths,
    config: RsmcpConfig,
    remote: Arc<dyn RemoteClient>,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(async move { serve_stdio(paths, config, remote).await })
}

async fn serve_stdio(paths: RsmcpPaths, config: RsmcpConfig, remote: Arc<dyn RemoteClient>) -> Result<()> {
    let lock_manager =
        LockManager::new(paths.locks_dir()).context("failed to initialize lock manager")?;
    let server = RsmcpServer::new(paths, config, Arc::new(lock_manager), remote);
    let running = server
        .serve(stdio())
        .await
        .context("failed to start MCP server")?;
    running.waiting().await.context("server task failed")?;
    Ok(())
}

#[derive(Clone)]
struct RsmcpServer {
    paths: RsmcpPaths,
    config: RsmcpConfig,
    lock_manager: Arc<LockManager>,
    remote: Arc<dyn RemoteClient>,
    tool_router: ToolRouter<Self>,
}

impl RsmcpServer {
    fn new(
        paths: RsmcpPaths,
        config: RsmcpConfig,
        lock_manager: Arc<LockManager>,
        remote: Arc<dyn RemoteClient>,
    ) -> Self {
        Self {
            paths,
            config,
            lock_manager,
            remote,
            tool_router: Self::tool_router(),
        }
    }

    async fn run_strategy(
        &self,
        script_id: &str,
        session_id: Option<&str>,
        strategy: &dyn Strategy,
        expected_hash: Option<&str>,
        force: bool,
        dry_run: bool,
    ) -> Result<CallToolResult, McpError> {
        let id = ScriptId::parse(script_id).map_err(core_error_to_mcp)?;
        let mode = if dry_run { SyncMode::LocalOnly } else { SyncMode::Simple };
        let output = execute_with_git(
            strategy,
            self.remote.as_ref(),
            &self.lock_manager,
            &self.paths,
            PipelineInput {
                script_id: id.as_str(),
                session_id,
                mode,
                expected_hash,
                force,
            },
        )
        .await
        .map_err(core_error_to_mcp)?;

        Ok(write_result(output))
    }
}

fn write_result(output: PipelineOutput) -> CallToolResult {
    let git = git_hint_json(&output.git);
    let structured = json!({
        "success": true,
        "written": output.written,
        "hash": output.hash,
        "git": git,
    });
    let summary = format!(
        "{} file(s) written; branch {} has {} uncommitted change(s)",
        output.written.len(),
        output.git.branch,
        output.git.uncommitted_count
    );
    CallToolResult {
        content: vec![Content::text(summary)],
        structured_content: Some(structured),
        is_error: Some(false),
        meta: None,
    }
}

fn git_hint_json(hint: &GitHint) -> Value {
    let action = match hint.action {
        GitAction::Commit => "commit",
        GitAction::Push => "push",
        GitAction::Finish => "finish",
    };
    json!({
        "branch": hint.branch,
        "uncommittedCount": hint.uncommitted_count,
        "action": action,
        "command": hint.command,
    })
}

fn core_error_to_mcp(err: CoreError) -> McpError {
    let envelope = err.to_envelope(false);
    let data = serde_json::to_value(&envelope).ok();
    match err {
        CoreError::Validation { .. }
        | CoreError::Conflict { .. }
        | CoreError::DeletionRequiresConfirmation { .. }
        | CoreError::Auth { .. } => McpError::invalid_params(envelope.message, data),
        CoreError::LockTimeout { .. }
        | CoreError::Remote { .. }
        | CoreError::Io { .. }
        | CoreError::Fatal { .. } => McpError::internal_error(envelope.message, data),
    }
}

// --- Tool argument schemas ------------------------------------------------

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct EditArgs {
    script_id: String,
    session_id: Option<String>,
    path: String,
    edits: Vec<ExactEditArg>,
    expected_hash: Option<String>,
    #[serde(default)]
    force: bool,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct ExactEditArg {
    old_string: String,
    new_string: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct AiderArgs {
    script_id: String,
    session_id: Option<String>,
    path: String,
    edits: Vec<FuzzyEditArg>,
    expected_hash: Option<String>,
    #[serde(default)]
    force: bool,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct FuzzyEditArg {
    search_text: String,
    replace_text: String,
    similarity_threshold: Option<f64>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct WriteArgs {
    script_id: String,
    session_id: Option<String>,
    path: String,
    content: String,
    expected_hash: Option<String>,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct MvArgs {
    script_id: String,
    session_id: Option<String>,
    from: String,
    to: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct CpArgs {
    script_id: String,
    session_id: Option<String>,
    from: String,
    to: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct RmArgs {
    script_id: String,
    session_id: Option<String>,
    from: String,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct RsyncArgs {
    script_id: String,
    operation: String,
    #[serde(default)]
    dryrun: bool,
    #[serde(default)]
    confirm_deletions: bool,
    #[serde(default)]
    exclude_patterns: Vec<String>,
}

#[derive(Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct StatusArgs {
    script_id: String,
    sections: Option<Vec<String>>,
}

#[tool_router]
impl RsmcpServer {
    #[tool(name = "edit", description = "Exact find/replace through the write pipeline")]
    async fn route_edit(
        &self,
        Parameters(args): Parameters<EditArgs>,
    ) -> Result<CallToolResult, McpError> {
        let strategy = EditStrategy {
            path: args.path,
            edits: args
                .edits
                .into_iter()
                .map(|e| ExactEdit {
                    old_string: e.old_string,
                    new_string: e.new_string,
                })
                .collect(),
        };
        self.run_strategy(
            &args.script_id,
            args.session_id.as_deref(),
            &strategy,
            args.expected_hash.as_deref(),
            args.force,
            args.dry_run,
        )
        .await
    }

    #[tool(name = "aider", description = "Levenshtein-similarity fuzzy edits through the write pipeline")]
    async fn route_aider(
        &self,
        Parameters(args): Parameters<AiderArgs>,
    ) -> Result<CallToolResult, McpError> {
        let strategy = AiderStrategy {
            path: args.path,
            edits: args
                .edits
                .into_iter()
                .map(|e| FuzzyEdit {
                    search_text: e.search_text,
                    replace_text: e.replace_text,
                    similarity_threshold: e.similarity_threshold,
                })
                .collect(),
        };
        self.run_strategy(
            &args.script_id,
            args.session_id.as_deref(),
            &strategy,
            args.expected_hash.as_deref(),
            args.force,
            args.dry_run,
        )
        .await
    }

    #[tool(name = "write", description = "Full-file replacement or creation through the write pipeline")]
    async fn route_write(
        &self,
        Parameters(args): Parameters<WriteArgs>,
    ) -> Result<CallToolResult, McpError> {
        let strategy = WriteStrategy {
            path: args.path,
            content: args.content,
        };
        self.run_strategy(
            &args.script_id,
            args.session_id.as_deref(),
            &strategy,
            args.expected_hash.as_deref(),
            args.force,
            false,
        )
        .await
    }

    #[tool(name = "mv", description = "Rename a file within the project's flat namespace")]
    async fn route_mv(&self, Parameters(args): Parameters<MvArgs>) -> Result<CallToolResult, McpError> {
        let strategy = MvStrategy {
            from: args.from,
            to: args.to,
        };
        self.run_strategy(&args.script_id, args.session_id.as_deref(), &strategy, None, false, false)
            .await
    }

    #[tool(name = "cp", description = "Duplicate a file within the project's flat namespace")]
    async fn route_cp(&self, Parameters(args): Parameters<CpArgs>) -> Result<CallToolResult, McpError> {
        let strategy = CpStrategy {
            from: args.from,
            to: args.to,
        };
        self.run_strategy(&args.script_id, args.session_id.as_deref(), &strategy, None, false, false)
            .await
    }

    #[tool(name = "rm", description = "Delete a file through the write pipeline")]
    async fn route_rm(&self, Parameters(args): Parameters<RmArgs>) -> Result<CallToolResult, McpError> {
        let strategy = RmStrategy { from: args.from };
        self.run_strategy(&args.script_id, args.session_id.as_deref(), &strategy, None, false, false)
            .await
    }

    #[tool(name = "rsync", description = "Stateless pull/push reconciliation of the entire project")]
    async fn route_rsync(
        &self,
        Parameters(args): Parameters<RsyncArgs>,
    ) -> Result<CallToolResult, McpError> {
        let id = ScriptId::parse(&args.script_id).map_err(core_error_to_mcp)?;
        let direction = match args.operation.as_str() {
            "pull" => SyncDirection::Pull,
            "push" => SyncDirection::Push,
            other => {
                return Err(core_error_to_mcp(CoreError::validation(format!(
                    "unknown rsync operation: {other}"
                ))))
            }
        };
        let _guard = self
            .lock_manager
            .acquire(id.as_str(), "rsync", None)
            .map_err(core_error_to_mcp)?;

        let project_dir = self.paths.project_repo(id.as_str());
        crate::git_ops::repo::ensure_repo(&project_dir).map_err(core_error_to_mcp)?;

        let remote_files = self
            .remote
            .get_project_content(id.as_str())
            .await
            .map_err(core_error_to_mcp)?;
        let existing_manifest = manifest::load(&project_dir).map_err(core_error_to_mcp)?;
        let local_files =
            list_local_files(&project_dir, &args.exclude_patterns).map_err(core_error_to_mcp)?;
        let summary = compute_diff(&local_files, &remote_files, existing_manifest.as_ref(), direction);

        if args.dryrun {
            let structured = json!({
                "success": true,
                "dryrun": true,
                "isBootstrap": summary.is_bootstrap,
                "adds": summary.adds,
                "updates": summary.updates,
                "deletes": summary.deletes,
                "unchanged": summary.unchanged,
            });
            return Ok(CallToolResult {
                content: vec![Content::text(format!(
                    "{} add, {} update, {} delete planned",
                    summary.adds.len(),
                    summary.updates.len(),
                    summary.deletes.len()
                ))],
                structured_content: Some(structured),
                is_error: Some(false),
                meta: None,
            });
        }

        let result = match direction {
            SyncDirection::Pull => {
                apply_pull(&project_dir, id.as_str(), &remote_files, summary, args.confirm_deletions)
                    .await
                    .map_err(core_error_to_mcp)?
            }
            SyncDirection::Push => {
                apply_push(
                    &project_dir,
                    self.remote.as_ref(),
                    id.as_str(),
                    &local_files,
                    &remote_files,
                    summary,
                    args.confirm_deletions,
                )
                .await
                .map_err(core_error_to_mcp)?
            }
        };

        let structured = json!({
            "success": true,
            "adds": result.summary.adds,
            "updates": result.summary.updates,
            "deletes": result.summary.deletes,
            "commitSha": result.commit_sha,
            "recoveryCommand": result.recovery_command,
        });
        Ok(CallToolResult {
            content: vec![Content::text(format!(
                "rsync {} complete: {} operation(s)",
                args.operation,
                result.summary.total_operations()
            ))],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }

    #[tool(name = "status", description = "Aggregated health across auth, project, git, locks, cache, and sync")]
    async fn route_status(
        &self,
        Parameters(args): Parameters<StatusArgs>,
    ) -> Result<CallToolResult, McpError> {
        let id = ScriptId::parse(&args.script_id).map_err(core_error_to_mcp)?;
        let sections: Vec<StatusSection> = match args.sections {
            Some(names) => names
                .iter()
                .filter_map(|n| StatusSection::parse(n))
                .collect(),
            None => StatusSection::ALL.to_vec(),
        };
        let report = status::collect(status::StatusInput {
            script_id: id.as_str(),
            sections: &sections,
            paths: &self.paths,
            config: &self.config,
            lock_manager: &self.lock_manager,
            cached_tokens: None,
        });
        let structured = serde_json::to_value(&report).unwrap_or(Value::Null);
        Ok(CallToolResult {
            content: vec![Content::text(format!(
                "status collected for {} section(s)",
                sections.len()
            ))],
            structured_content: Some(structured),
            is_error: Some(false),
            meta: None,
        })
    }
}

#[tool_handler]
impl ServerHandler for RsmcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: server_implementation(),
            instructions: Some(
                "Write and sync tool surface for a remote script-hosting project: edit/aider/write/mv/cp/rm go through the atomic git pipeline, rsync reconciles the whole project, status reports health.".to_string(),
            ),
        }
    }
}

fn server_implementation() -> Implementation {
    Implementation {
        name: "rsmcp".into(),
        title: Some("rsmcp".into()),
        version: env!("CARGO_PKG_VERSION").into(),
        icons: None,
        website_url: None,
    }
}
