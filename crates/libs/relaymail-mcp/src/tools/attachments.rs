//! Attachment tool implementations.
//!
//! Decodes base64 attachment payloads, validates and archives them via
//! `AttachmentBmc`, and serves them back out on request.

use base64::{Engine as _, engine::general_purpose};
use relaymail_core::{
    ctx::Ctx,
    model::{ModelManager, attachment::AttachmentBmc},
};
use rmcp::{ErrorData as McpError, model::CallToolResult, model::Content};
use std::sync::Arc;

use super::helpers;
use super::{AddAttachmentParams, GetAttachmentParams};

/// Decode and archive a base64-encoded attachment for a message.
pub async fn add_attachment_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: AddAttachmentParams,
) -> Result<CallToolResult, McpError> {
    let project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;

    let raw = general_purpose::STANDARD
        .decode(params.content_base64.as_bytes())
        .map_err(|e| McpError::invalid_params(format!("Invalid base64 content: {}", e), None))?;

    let attachment = AttachmentBmc::create_from_bytes(
        ctx,
        mm,
        project.id,
        &project.slug,
        &params.filename,
        &raw,
    )
    .await
    .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let msg = format!(
        "Stored attachment '{}' for message {} (attachment id: {}, {} bytes, {})",
        params.filename, params.message_id, attachment.id, attachment.size_bytes, attachment.media_type
    );
    Ok(CallToolResult::success(vec![Content::text(msg)]))
}

/// Fetch a previously archived attachment and return it base64-encoded.
pub async fn get_attachment_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: GetAttachmentParams,
) -> Result<CallToolResult, McpError> {
    let _project = helpers::resolve_project(ctx, mm, &params.project_slug).await?;

    let attachment_id: i64 = params.attachment_id.parse().map_err(|_| {
        McpError::invalid_params(
            format!("attachment_id must be numeric, got '{}'", params.attachment_id),
            None,
        )
    })?;

    let attachment = AttachmentBmc::get(ctx, mm, attachment_id)
        .await
        .map_err(|e| McpError::invalid_params(format!("Attachment not found: {}", e), None))?;

    if attachment.filename != params.filename {
        return Err(McpError::invalid_params(
            format!(
                "Attachment {} has filename '{}', not '{}'",
                attachment_id, attachment.filename, params.filename
            ),
            None,
        ));
    }

    let raw = AttachmentBmc::read_bytes(mm, &attachment)
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    let encoded = general_purpose::STANDARD.encode(&raw);

    let json = serde_json::json!({
        "attachment_id": attachment.id,
        "filename": attachment.filename,
        "media_type": attachment.media_type,
        "size_bytes": attachment.size_bytes,
        "content_base64": encoded,
    });
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&json)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?,
    )]))
}
