//! Process-level configuration: workspace root, bind address, dev-server
//! port range (spec §9 Design Notes: "Global state... must be process-scoped
//! and thread-safe; both should be passed in at construction rather than
//! implicit").

use std::path::PathBuf;

use crate::policy::PolicyConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Root directory under which every session's workspace directory lives.
    pub workspace_root: PathBuf,
    /// Address the `serve` HTTP listener binds to.
    pub bind_addr: String,
    /// First port the dev-server allocator hands out; sessions lease
    /// sequential ports above this.
    pub dev_server_port_base: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            workspace_root: std::env::var("WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("orchestrator-workspaces")),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string()),
            dev_server_port_base: std::env::var("DEV_SERVER_PORT_BASE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5173),
        }
    }

    pub fn policy(&self) -> PolicyConfig {
        PolicyConfig::from_env()
    }
}
