//! HTTP servers
//!
//! Builds the routers with their shared state and serves them until a
//! shutdown signal resolves.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use cs_core::{CapabilityCard, Orchestrator, SpecialistAgent};
use cs_tools::ToolGateway;

use crate::routes::{agent_routes, gateway_routes, orchestrator_routes};

/// State of the Tool Gateway server
#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<ToolGateway>,
}

/// State of a specialist agent server
#[derive(Clone)]
pub struct AgentState {
    pub agent: Arc<SpecialistAgent>,
}

/// State of the orchestrator server
#[derive(Clone)]
pub struct OrchestratorState {
    pub orchestrator: Arc<Orchestrator>,
    pub card: Arc<CapabilityCard>,
}

pub fn gateway_app(gateway: Arc<ToolGateway>) -> Router {
    gateway_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(GatewayState { gateway })
}

pub fn agent_app(agent: Arc<SpecialistAgent>) -> Router {
    agent_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AgentState { agent })
}

pub fn orchestrator_app(orchestrator: Arc<Orchestrator>, card: CapabilityCard) -> Router {
    orchestrator_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(OrchestratorState {
            orchestrator,
            card: Arc::new(card),
        })
}

/// Serve `app` on `addr` (`host:port`) until `shutdown` resolves
pub async fn serve<F>(name: &str, addr: &str, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(service = name, addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    info!(service = name, "Stopped");
    Ok(())
}
