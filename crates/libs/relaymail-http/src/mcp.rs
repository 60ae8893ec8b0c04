//! MCP-over-HTTP bridge.
//!
//! Mounts the same [`relaymail_mcp::AgentMailService`] tool surface used by
//! the stdio transport at `/mcp`, sharing this process's [`ModelManager`]
//! instead of opening a second database/archive.

use crate::AppState;
use axum::Router;
use relaymail_core::ModelManager;
use relaymail_mcp::AgentMailService;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager,
    tower::{StreamableHttpServerConfig, StreamableHttpService},
};
use std::sync::Arc;

pub fn mcp_routes(mm: ModelManager) -> Router<AppState> {
    let worktrees_enabled = mm.app_config.mcp.worktrees_active();
    let mm = Arc::new(mm);

    let session_manager = Arc::new(LocalSessionManager::default());
    let server_config = StreamableHttpServerConfig::default();

    let service_factory = move || Ok(AgentMailService::new_with_mm(mm.clone(), worktrees_enabled));

    let mcp_service = StreamableHttpService::new(service_factory, session_manager, server_config);

    Router::new().route("/mcp", axum::routing::any_service(mcp_service))
}
