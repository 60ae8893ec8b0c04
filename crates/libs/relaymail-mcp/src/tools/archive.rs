//! Archive admin tool implementation.
//!
//! Exposes a manual "flush the archive" escape hatch on top of the
//! project-scoped git mirror described for the Archive component. Normal
//! message/reservation writes commit themselves; this tool exists for the
//! orphaned-file recovery case where a client-cancelled call left files
//! written to the working tree without a commit.

use relaymail_core::{ctx::Ctx, model::ModelManager, store::git_store};
use rmcp::{ErrorData as McpError, model::CallToolResult, model::Content};
use std::sync::Arc;

use super::CommitArchiveParams;
use super::helpers;

pub async fn commit_archive_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: CommitArchiveParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;

    let _archive_guard = mm
        .acquire_archive_lock(Some(format!("commit_archive:{}", project.slug)))
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let repo_arc = mm
        .get_repo()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    let repo = repo_arc.lock().await;

    let oid = git_store::commit_all(&repo, &params.message, "relaymail", "relaymail@localhost")
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let msg = match oid {
        Some(oid) => format!(
            "Committed pending archive changes for '{}' ({})",
            params.project_slug, oid
        ),
        None => format!("No pending archive changes for '{}'", params.project_slug),
    };
    Ok(CallToolResult::success(vec![Content::text(msg)]))
}
