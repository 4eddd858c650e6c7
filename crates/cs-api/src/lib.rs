//! cs-api: HTTP surfaces of the customer support mesh
//!
//! The Tool Gateway surface (`GET /tools`, `POST /call`) and the agent
//! surface (`GET /.well-known/agent-card.json`, `POST /`) served by the
//! specialists and the orchestrator. Built with axum.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{
    AgentState, GatewayState, OrchestratorState, agent_app, gateway_app, orchestrator_app, serve,
};
