use anyhow::Result;
use tracing::info;

use crate::cli::Workspace;
use crate::mcp::server::McpServer;

pub async fn serve_stdio(repo: String) -> Result<()> {
    let workspace = Workspace::open(&repo);
    info!(
        "Serving index at {} over stdio",
        workspace.trees_dir.display()
    );

    let server = McpServer::new(workspace.engine()?, workspace.analyzer());
    server.run().await
}
