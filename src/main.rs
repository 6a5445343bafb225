use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use rsmcp::cli::{AuthCmd, Cli, Commands, LockCmd};
use rsmcp::config::{RsmcpConfig, RsmcpPaths};
use rsmcp::lock::LockManager;
use rsmcp::oauth::{self, OAuthEndpoints};
use rsmcp::remote::{FileTokenStore, InMemoryRemote, TokenStore};
use rsmcp::{hash, logging, mcp, wrapper};

fn main() -> Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    let paths = RsmcpPaths::resolve().context("resolving rsmcp home directory")?;
    let config = RsmcpConfig::load_or_default(&paths).context("loading rsmcp config")?;
    config
        .save_if_missing(&paths)
        .context("writing default rsmcp config")?;

    match cli.command {
        Commands::Serve => cmd_serve(paths, config),
        Commands::Auth { cmd } => cmd_auth(paths, cmd),
        Commands::Lock { cmd } => cmd_lock(paths, cmd),
        Commands::Hash { file } => cmd_hash(&file),
        Commands::Wrap { file } => cmd_wrap(&file),
        Commands::Unwrap { file } => cmd_unwrap(&file),
    }
}

fn cmd_serve(paths: RsmcpPaths, config: RsmcpConfig) -> Result<()> {
    // The Remote's HTTP SDK is out of scope (see `remote.rs`); `serve` runs
    // against the in-memory reference client until a real one is wired in by
    // a collaborator binary.
    let remote = Arc::new(InMemoryRemote::new());
    mcp::run_server(paths, config, remote)
}

fn cmd_auth(paths: RsmcpPaths, cmd: AuthCmd) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(async move { run_auth(paths, cmd).await })
}

async fn run_auth(paths: RsmcpPaths, cmd: AuthCmd) -> Result<()> {
    match cmd {
        AuthCmd::Login {
            client_id,
            authorization_endpoint,
            token_endpoint,
            scopes,
            principal,
            no_browser,
        } => {
            let endpoints = OAuthEndpoints {
                authorization_endpoint,
                token_endpoint,
                client_id,
                scopes,
            };
            let result = oauth::start_auth_flow(&endpoints, !no_browser)
                .await
                .context("oauth authorization flow failed")?;
            let now = chrono::Utc::now().to_rfc3339();
            let cached = oauth::to_cached_tokens(
                &principal,
                &principal,
                &principal,
                &principal,
                &now,
                &result.tokens,
            );
            let store = FileTokenStore::new(paths);
            store
                .save(&principal, cached)
                .await
                .context("saving cached tokens")?;
            println!("Authenticated as {principal}; tokens cached.");
            Ok(())
        }
        AuthCmd::Status { principal } => {
            let store = FileTokenStore::new(paths);
            match store.load(&principal).await? {
                Some(tokens) => println!(
                    "{principal}: authenticated (expires {})",
                    tokens.expires_at
                ),
                None => println!("{principal}: no cached tokens"),
            }
            Ok(())
        }
    }
}

fn cmd_lock(paths: RsmcpPaths, cmd: LockCmd) -> Result<()> {
    let manager = LockManager::new(paths.locks_dir()).context("initializing lock manager")?;
    match cmd {
        LockCmd::Status { script_id } => {
            let status = manager.status(&script_id);
            if status.locked {
                let holder = status.holder.expect("locked implies a holder record");
                println!(
                    "{script_id}: locked by pid {} on {} since {}",
                    holder.pid, holder.hostname, holder.timestamp
                );
            } else {
                println!("{script_id}: unlocked");
            }
            Ok(())
        }
        LockCmd::Gc => {
            let removed = manager.cleanup_stale().context("cleaning up stale locks")?;
            println!("removed {removed} stale lock(s)");
            Ok(())
        }
    }
}

fn cmd_hash(file: &str) -> Result<()> {
    let content = std::fs::read(file).with_context(|| format!("reading {file}"))?;
    println!("{}", hash::git_blob_hash(&content));
    Ok(())
}

fn cmd_wrap(file: &str) -> Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
    println!("{}", wrapper::wrap(&content, None));
    Ok(())
}

fn cmd_unwrap(file: &str) -> Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {file}"))?;
    println!("{}", wrapper::unwrap(&content).user_text);
    Ok(())
}
