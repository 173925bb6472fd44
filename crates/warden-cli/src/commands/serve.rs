//! Serve the tool server over stdio.

use std::path::Path;
use warden_core::Policy;
use warden_server::ToolServer;

pub async fn run(policy_path: &Path) -> anyhow::Result<()> {
    let policy = Policy::load(policy_path)
        .map_err(|e| anyhow::anyhow!("cannot load policy from {}: {e}", policy_path.display()))?;

    let server = ToolServer::new(policy)
        .await
        .map_err(|e| anyhow::anyhow!("cannot start tool server: {e}"))?;

    server.serve_stdio().await?;
    Ok(())
}
