//! OpenAPI document assembly.
//!
//! Only the handlers annotated with `#[utoipa::path(...)]` are registered
//! here; the bulk of `tools.rs`'s routes are plain axum handlers mirroring
//! the MCP tool surface and aren't independently documented.

use utoipa::OpenApi;

use crate::api::attachments::{
    AddAttachmentPayload, AddAttachmentResponse, add_attachment, get_attachment, list_attachments,
};
use crate::{HealthResponse, ReadyResponse, health_handler, ready_handler};
use relaymail_core::model::attachment::Attachment;

#[derive(OpenApi)]
#[openapi(
    paths(health_handler, ready_handler, add_attachment, list_attachments, get_attachment),
    components(schemas(
        HealthResponse,
        ReadyResponse,
        AddAttachmentPayload,
        AddAttachmentResponse,
        Attachment
    )),
    tags(
        (name = "relaymail", description = "Multi-agent coordination bus HTTP surface")
    )
)]
pub struct ApiDoc;
