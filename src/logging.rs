//! Tracing setup. stdout is reserved for the MCP protocol transport, so every
//! layer writes to stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber from `RSMCP_LOG` (falls back to `info`
/// for this crate, `warn` for its dependencies).
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_env("RSMCP_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info,rsmcp=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
