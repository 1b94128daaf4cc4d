//! Node Spawner
//!
//! Launching a node process on a (possibly remote) host is delegated to an
//! operator-supplied deploy script. The trait seam keeps the membership
//! service testable without shelling out.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Starts a node process. A `true` return means the child was started, not
/// that it is ready; readiness is established separately by health probes.
pub trait NodeSpawner: Send + Sync {
    fn launch(&self, host: &str, port: u16, id: u32) -> bool;
}

/// Runs the deploy script with `<host> <id> <port> <controller-url>`.
pub struct ScriptSpawner {
    script: PathBuf,
    controller_url: String,
}

impl ScriptSpawner {
    pub fn new(script: PathBuf, controller_url: String) -> Self {
        Self {
            script,
            controller_url,
        }
    }
}

impl NodeSpawner for ScriptSpawner {
    fn launch(&self, host: &str, port: u16, id: u32) -> bool {
        tracing::info!("Deploying node {} on {}:{}", id, host, port);

        let status = Command::new(&self.script)
            .arg(host)
            .arg(id.to_string())
            .arg(port.to_string())
            .arg(&self.controller_url)
            .status();

        match status {
            Ok(status) if status.success() => {
                tracing::info!("Finished deploying node {}", id);
                true
            }
            Ok(status) => {
                tracing::error!("Deploy script exited with {} for node {}", status, id);
                false
            }
            Err(e) => {
                tracing::error!("Failed to run the deploy script for node {}: {}", id, e);
                false
            }
        }
    }
}

/// The pool of host names nodes may be deployed to, read from `hosts.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostPool {
    pub hosts: Vec<String>,
}

pub fn load_host_pool(path: &Path) -> anyhow::Result<HostPool> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read hosts file {}: {}", path.display(), e))?;

    Ok(serde_json::from_str(&raw)?)
}
