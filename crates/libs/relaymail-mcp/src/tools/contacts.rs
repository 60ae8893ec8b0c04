//! Contact-link tool implementations.
//!
//! Wraps `AgentLinkBmc` to expose the directed contact state machine
//! described for the Contacts component: request -> approve/block.

use relaymail_core::{
    ctx::Ctx,
    model::{
        ModelManager,
        agent::{AgentBmc, AgentProfileUpdate},
        agent_link::{AgentLink, AgentLinkBmc, AgentLinkForCreate},
    },
};
use rmcp::{ErrorData as McpError, model::CallToolResult, model::Content};
use serde::Serialize;
use std::sync::Arc;

use super::helpers;
use super::{ListContactsParams, RequestContactParams, RespondContactParams, SetContactPolicyParams};

/// Translate the internal `pending`/`accepted`/`rejected` column values into
/// the `pending`/`approved`/`blocked` vocabulary the tool surface exposes.
fn wire_status(internal: &str) -> &'static str {
    match internal {
        "accepted" => "approved",
        "rejected" => "blocked",
        _ => "pending",
    }
}

#[derive(Serialize)]
struct ContactView {
    link_id: i64,
    counterparty_project_id: i64,
    counterparty_agent_id: i64,
    status: &'static str,
    reason: String,
    created_ts: String,
    updated_ts: String,
}

fn to_view(link: &AgentLink, self_project_id: i64, self_agent_id: i64) -> ContactView {
    let (counterparty_project_id, counterparty_agent_id) =
        if link.a_project_id == self_project_id && link.a_agent_id == self_agent_id {
            (link.b_project_id, link.b_agent_id)
        } else {
            (link.a_project_id, link.a_agent_id)
        };
    ContactView {
        link_id: link.id,
        counterparty_project_id,
        counterparty_agent_id,
        status: wire_status(&link.status),
        reason: link.reason.clone(),
        created_ts: link.created_ts.to_string(),
        updated_ts: link.updated_ts.to_string(),
    }
}

/// Request contact from one agent to another, possibly cross-project.
pub async fn request_contact_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: RequestContactParams,
) -> Result<CallToolResult, McpError> {
    let (from_project, from_agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.from_project_slug, &params.from_agent_name)
            .await?;
    let (to_project, to_agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.to_project_slug, &params.to_agent_name)
            .await?;

    let link_c = AgentLinkForCreate {
        a_project_id: from_project.id,
        a_agent_id: from_agent.id,
        b_project_id: to_project.id,
        b_agent_id: to_agent.id,
        reason: params.reason.clone(),
    };

    let link_id = AgentLinkBmc::request_contact(ctx, mm, link_c)
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let msg = format!(
        "Requested contact from {}/{} to {}/{} (link id: {}, status: pending)",
        params.from_project_slug, params.from_agent_name, params.to_project_slug, params.to_agent_name, link_id
    );
    Ok(CallToolResult::success(vec![Content::text(msg)]))
}

/// Accept or reject a pending contact request.
pub async fn respond_contact_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: RespondContactParams,
) -> Result<CallToolResult, McpError> {
    AgentLinkBmc::respond_contact(ctx, mm, params.link_id, params.accept)
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let status = if params.accept { "approved" } else { "blocked" };
    let msg = format!("Contact request {} is now {}", params.link_id, status);
    Ok(CallToolResult::success(vec![Content::text(msg)]))
}

/// List approved contacts for an agent.
pub async fn list_contacts_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ListContactsParams,
) -> Result<CallToolResult, McpError> {
    let (project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;

    let links = AgentLinkBmc::list_contacts(ctx, mm, project.id, agent.id)
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let views: Vec<ContactView> = links.iter().map(|l| to_view(l, project.id, agent.id)).collect();
    let json = serde_json::to_string_pretty(&views)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// List pending contact requests addressed to an agent.
pub async fn list_pending_contact_requests_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: ListContactsParams,
) -> Result<CallToolResult, McpError> {
    let (project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;

    let links = AgentLinkBmc::list_pending_requests(ctx, mm, project.id, agent.id)
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let views: Vec<ContactView> = links.iter().map(|l| to_view(l, project.id, agent.id)).collect();
    let json = serde_json::to_string_pretty(&views)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Update an agent's contact acceptance policy (open, auto, contacts_only, block_all).
pub async fn set_contact_policy_impl(
    ctx: &Ctx,
    mm: &Arc<ModelManager>,
    params: SetContactPolicyParams,
) -> Result<CallToolResult, McpError> {
    let (_project, agent) =
        helpers::resolve_project_and_agent(ctx, mm, &params.project_slug, &params.agent_name).await?;

    let valid = ["open", "auto", "contacts_only", "block_all"];
    if !valid.contains(&params.contact_policy.as_str()) {
        return Err(McpError::invalid_params(
            format!(
                "contact_policy must be one of {:?}, got '{}'",
                valid, params.contact_policy
            ),
            None,
        ));
    }

    AgentBmc::update_profile(
        ctx,
        mm,
        agent.id,
        AgentProfileUpdate {
            contact_policy: Some(params.contact_policy.clone()),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| McpError::internal_error(e.to_string(), None))?;

    let msg = format!(
        "Set contact policy for {}/{} to '{}'",
        params.project_slug, params.agent_name, params.contact_policy
    );
    Ok(CallToolResult::success(vec![Content::text(msg)]))
}
