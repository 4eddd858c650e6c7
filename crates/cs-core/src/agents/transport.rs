//! Agent transport
//!
//! The orchestrator talks to specialists only through [`AgentTransport`], a
//! synchronous request/response contract. The HTTP implementation lives in
//! `cs-a2a`; [`InProcessTransport`] calls agents living in the same process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::registry::ResolvedAgent;
use super::specialist::SpecialistAgent;
use super::types::{DelegatedTask, SpecialistReport};
use crate::{Error, Result};

/// Delivers a delegated task to a resolved agent and returns its report
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn delegate(&self, agent: &ResolvedAgent, task: DelegatedTask) -> Result<SpecialistReport>;
}

/// Transport for agents hosted in the current process
#[derive(Default)]
pub struct InProcessTransport {
    agents: HashMap<String, Arc<SpecialistAgent>>,
}

impl InProcessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent: Arc<SpecialistAgent>) -> Self {
        self.agents.insert(agent.name().to_string(), agent);
        self
    }
}

#[async_trait]
impl AgentTransport for InProcessTransport {
    async fn delegate(&self, agent: &ResolvedAgent, task: DelegatedTask) -> Result<SpecialistReport> {
        let specialist = self.agents.get(&agent.name).ok_or_else(|| {
            Error::Unavailable(format!("Agent '{}' is not hosted in this process", agent.name))
        })?;

        // Detached so a caller giving up cannot cut a started call sequence short
        let specialist = Arc::clone(specialist);
        tokio::spawn(async move { specialist.handle(task).await })
            .await
            .map_err(|e| Error::Other(format!("Agent task failed: {}", e)))
    }
}
