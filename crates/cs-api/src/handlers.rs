//! HTTP handlers
//!
//! Request handlers for the gateway, specialist and orchestrator surfaces.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::{Value as JsonValue, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cs_core::workflow::UserRequest;
use cs_core::{
    CapabilityCard, DelegatedTask, Error, SpecialistReport, ToolInvocation, ToolInvoker,
    WorkflowResponse,
};

use crate::error::{ApiError, Result};
use crate::server::{AgentState, GatewayState, OrchestratorState};

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

// ============================================================================
// Tool Gateway
// ============================================================================

/// `GET /tools`
pub async fn list_tools(State(state): State<GatewayState>) -> Json<JsonValue> {
    Json(json!({ "tools": state.gateway.definitions() }))
}

/// `POST /call`
pub async fn call_tool(
    State(state): State<GatewayState>,
    payload: std::result::Result<Json<ToolInvocation>, JsonRejection>,
) -> Result<Json<JsonValue>> {
    let invocation = body(payload)?;
    debug!(tool = %invocation.tool, "Tool call request");

    let output = state.gateway.invoke(invocation).await?;
    Ok(Json(json!({ "result": output.to_value()? })))
}

// ============================================================================
// Specialist agents
// ============================================================================

/// `GET /.well-known/agent-card.json` of a specialist
pub async fn agent_card(State(state): State<AgentState>) -> Json<CapabilityCard> {
    Json(state.agent.card().clone())
}

/// `POST /` of a specialist: run a delegated task to completion
pub async fn handle_task(
    State(state): State<AgentState>,
    payload: std::result::Result<Json<DelegatedTask>, JsonRejection>,
) -> Result<Json<SpecialistReport>> {
    let task = body(payload)?;
    let agent = state.agent.clone();

    // Detached so a dropped request cannot interrupt a started call sequence
    let report = tokio::spawn(async move { agent.handle(task).await })
        .await
        .map_err(|e| Error::Other(format!("Task handler failed: {}", e)))?;
    Ok(Json(report))
}

// ============================================================================
// Orchestrator
// ============================================================================

/// `GET /.well-known/agent-card.json` of the orchestrator
pub async fn orchestrator_card(State(state): State<OrchestratorState>) -> Json<CapabilityCard> {
    Json(state.card.as_ref().clone())
}

/// `POST /` of the orchestrator: run one end-user request.
///
/// If the client goes away the workflow is cancelled: the in-flight step
/// completes and no further steps are issued.
pub async fn ask(
    State(state): State<OrchestratorState>,
    payload: std::result::Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<WorkflowResponse>> {
    let request = body(payload)?;
    if request.message.trim().is_empty() {
        return Err(ApiError::InvalidRequest("message must not be empty".to_string()));
    }
    info!(chars = request.message.len(), "User request received");

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let orchestrator = state.orchestrator.clone();
    let response = tokio::spawn(async move { orchestrator.run(&request.message, cancel).await })
        .await
        .map_err(|e| Error::Other(format!("Workflow task failed: {}", e)))?;
    Ok(Json(response))
}
