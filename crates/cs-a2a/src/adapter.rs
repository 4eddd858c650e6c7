//! HTTP agent transport
//!
//! Adapts [`AgentClient`] to the orchestrator's [`AgentTransport`] contract.

use async_trait::async_trait;
use tracing::debug;

use cs_core::agents::{AgentTransport, ResolvedAgent};
use cs_core::{DelegatedTask, Result, SpecialistReport};

use crate::client::AgentClient;

/// Delivers delegated tasks to remote agents over HTTP
#[derive(Clone)]
pub struct HttpAgentTransport {
    client: AgentClient,
}

impl HttpAgentTransport {
    pub fn new(client: AgentClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AgentClient {
        &self.client
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn delegate(&self, agent: &ResolvedAgent, task: DelegatedTask) -> Result<SpecialistReport> {
        debug!(
            agent = %agent.name,
            address = %agent.address,
            task_id = %task.task_id,
            correlation_id = %task.correlation_id,
            "Sending task"
        );
        self.client.send_task(&agent.address, &task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::post;
    use cs_core::AgentOutcome;
    use cs_core::agents::{TaskAction, TaskHints};
    use std::time::Duration;

    #[tokio::test]
    async fn test_delegate_posts_task_to_agent_address() {
        let router = Router::new().route(
            "/",
            post(|axum::Json(task): axum::Json<DelegatedTask>| async move {
                axum::Json(SpecialistReport {
                    task_id: task.task_id,
                    agent: "customer_info".to_string(),
                    outcome: AgentOutcome::Success,
                    tool_calls_made: vec![],
                    result_payload: serde_json::json!({"echo": task.intent}),
                    failed_step: None,
                    summary: "ok".to_string(),
                })
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let transport = HttpAgentTransport::new(AgentClient::new(Duration::from_secs(5)).unwrap());
        let agent = ResolvedAgent {
            name: "customer_info".to_string(),
            address,
            permitted_tools: vec![],
        };
        let task = DelegatedTask::new("c-9", "show customer 2", TaskHints::new(TaskAction::Lookup).customer(2));
        let task_id = task.task_id.clone();

        let report = transport.delegate(&agent, task).await.unwrap();
        assert_eq!(report.task_id, task_id);
        assert_eq!(report.result_payload["echo"], "show customer 2");
    }
}
