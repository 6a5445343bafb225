//! Operator-facing CLI: the `serve` entry point the MCP host spawns, plus
//! debug/maintenance commands for auth, locks, and the hash/wrap/unwrap
//! primitives.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rsmcp", version, about = "Write/sync MCP daemon for a remote script-hosting project")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP server over stdio.
    Serve,
    /// OAuth PKCE login / token cache inspection.
    Auth {
        #[command(subcommand)]
        cmd: AuthCmd,
    },
    /// Filesystem-advisory lock maintenance.
    Lock {
        #[command(subcommand)]
        cmd: LockCmd,
    },
    /// Print the git-blob hash of a file's content.
    Hash { file: String },
    /// Wrap a file's content as the Remote would store it.
    Wrap { file: String },
    /// Unwrap a Remote-stored file back to its authored form.
    Unwrap { file: String },
}

#[derive(Subcommand, Debug)]
pub enum AuthCmd {
    /// Run the PKCE authorization-code flow and cache the resulting tokens.
    Login {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        authorization_endpoint: String,
        #[arg(long)]
        token_endpoint: String,
        #[arg(long, value_delimiter = ',')]
        scopes: Vec<String>,
        /// Principal the cached tokens are filed under (e.g. the account email).
        #[arg(long)]
        principal: String,
        #[arg(long)]
        no_browser: bool,
    },
    /// Report whether a cached token exists for a principal, and its expiry.
    Status {
        #[arg(long)]
        principal: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum LockCmd {
    /// Report whether a scriptId is currently locked, and by whom.
    Status { script_id: String },
    /// Remove stale lock files left behind by crashed holders.
    Gc,
}
