//! Route definitions

use axum::Router;
use axum::routing::{get, post};

use cs_core::agents::AGENT_CARD_PATH;

use crate::handlers::{agent_card, ask, call_tool, handle_task, health, list_tools, orchestrator_card};
use crate::server::{AgentState, GatewayState, OrchestratorState};

/// Tool Gateway surface
pub fn gateway_routes() -> Router<GatewayState> {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/call", post(call_tool))
}

/// Agent surface of a specialist
pub fn agent_routes() -> Router<AgentState> {
    Router::new()
        .route("/health", get(health))
        .route(AGENT_CARD_PATH, get(agent_card))
        .route("/", post(handle_task))
}

/// Agent surface of the orchestrator
pub fn orchestrator_routes() -> Router<OrchestratorState> {
    Router::new()
        .route("/health", get(health))
        .route(AGENT_CARD_PATH, get(orchestrator_card))
        .route("/", post(ask))
}
