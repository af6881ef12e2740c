//! Runtime configuration: CLI flags with env-var fallback, then built-in
//! defaults — same priority order as the teacher's `DaemonConfig` (CLI/env
//! over file over default), minus the TOML layer this crate has no use for.

use std::path::PathBuf;

use clap::Parser;

use crate::store::file_store::default_data_dir;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG: &str = "info";

/// Agent Runtime Core — an Assistants-style HTTP API over a user-supplied
/// generator function.
#[derive(Debug, Clone, Parser)]
#[command(name = "agent-runtime", version, about)]
pub struct RuntimeConfig {
    /// Port the HTTP server binds to.
    #[arg(long, env = "AGENT_RUNTIME_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory where threads/ and runs/ are persisted. Defaults to
    /// `$TEGG_AGENT_DATA_DIR`, then `<cwd>/.agent-data` (spec §6).
    #[arg(long, env = "TEGG_AGENT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Tracing filter string, e.g. "info", "debug,tower_http=trace".
    #[arg(long, env = "AGENT_RUNTIME_LOG", default_value_t = DEFAULT_LOG.to_string())]
    pub log: String,
}

impl RuntimeConfig {
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}
