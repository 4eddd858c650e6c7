//! HTTP clients
//!
//! [`GatewayClient`] speaks the Tool Gateway surface (`GET /tools`,
//! `POST /call`); [`AgentClient`] speaks the agent surface
//! (`GET /.well-known/agent-card.json`, `POST /`).

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use cs_core::agents::AGENT_CARD_PATH;
use cs_core::workflow::UserRequest;
use cs_core::{
    CapabilityCard, DelegatedTask, Error, ErrorBody, Result, SpecialistReport, ToolDefinition,
    ToolInvocation, ToolInvoker, ToolName, ToolOutput, WorkflowResponse,
};

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder().timeout(timeout).build().map_err(Error::Http)
}

/// Classify a failed send: refused connections never reached the peer
fn send_error(err: reqwest::Error, target: &str) -> Error {
    if err.is_connect() {
        Error::Unavailable(format!("{} is unreachable", target))
    } else if err.is_timeout() {
        Error::Timeout(format!("{} did not answer in time", target))
    } else {
        Error::Http(err)
    }
}

/// Decode a response body, turning `{"error": {...}}` bodies back into errors
async fn read_json<T: DeserializeOwned>(response: Response, target: &str) -> Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(|e| send_error(e, target))?;

    if !status.is_success() {
        if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&body) {
            return Err(error.into());
        }
        warn!(target, status = %status, body = %body, "Unexpected error response");
        return Err(match status {
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                Error::Unavailable(format!("{} answered {}", target, status))
            }
            StatusCode::GATEWAY_TIMEOUT => Error::Timeout(format!("{} answered {}", target, status)),
            _ => Error::Other(format!("{} answered {}", target, status)),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

#[derive(Deserialize)]
struct ToolsResponse {
    tools: Vec<ToolDefinition>,
}

#[derive(Deserialize)]
struct CallResponse {
    result: JsonValue,
}

/// Client of the Tool Gateway HTTP surface
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    /// Create a client whose calls give up after `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /tools`
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        let url = format!("{}/tools", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(e, "tool gateway"))?;
        let tools: ToolsResponse = read_json(response, "tool gateway").await?;
        Ok(tools.tools)
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(e, "tool gateway"))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Unavailable(format!("tool gateway answered {}", response.status())))
        }
    }
}

#[async_trait]
impl ToolInvoker for GatewayClient {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        // The result type depends on the tool, so unknown names fail here
        let tool = ToolName::from_str(&invocation.tool)?;
        let url = format!("{}/call", self.base_url);

        debug!(
            tool = %tool,
            correlation_id = invocation.correlation_id.as_deref().unwrap_or("-"),
            "Calling tool gateway"
        );
        let response = self
            .client
            .post(&url)
            .json(&invocation)
            .send()
            .await
            .map_err(|e| send_error(e, "tool gateway"))?;
        let call: CallResponse = read_json(response, "tool gateway").await?;
        ToolOutput::decode(tool, call.result)
    }
}

/// Client of the agent-to-agent surface
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
}

impl AgentClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }

    /// Fetch the capability card an agent serves
    pub async fn fetch_card(&self, base_url: &str) -> Result<CapabilityCard> {
        let url = format!("{}{}", base_url.trim_end_matches('/'), AGENT_CARD_PATH);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(e, base_url))?;
        read_json(response, base_url).await
    }

    /// Deliver a delegated task and wait for the specialist report
    pub async fn send_task(&self, base_url: &str, task: &DelegatedTask) -> Result<SpecialistReport> {
        let url = format!("{}/", base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(task)
            .send()
            .await
            .map_err(|e| send_error(e, base_url))?;
        read_json(response, base_url).await
    }

    /// Send an end-user request to the orchestrator
    pub async fn ask(&self, orchestrator_url: &str, message: &str) -> Result<WorkflowResponse> {
        let url = format!("{}/", orchestrator_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&UserRequest::new(message))
            .send()
            .await
            .map_err(|e| send_error(e, orchestrator_url))?;
        read_json(response, orchestrator_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use cs_core::ErrorKind;
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn closed_port_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_call_decodes_result_by_tool() {
        let router = Router::new().route(
            "/call",
            post(|| async {
                axum::Json(json!({"result": {
                    "identifier": 1,
                    "full_name": "Alice Premium",
                    "contact_email": "alice@example.com",
                    "contact_phone": "111-111-1111",
                    "account_status": "active",
                    "creation_timestamp": "2025-01-01T00:00:00Z",
                    "last_modified_timestamp": "2025-01-01T00:00:00Z"
                }}))
            }),
        );
        let client = GatewayClient::new(serve(router).await, Duration::from_secs(5)).unwrap();
        let output = client
            .invoke(ToolInvocation::new("fetch_customer_data", json!({"customer_id": 1})))
            .await
            .unwrap();
        assert_eq!(output.as_account().unwrap().full_name, "Alice Premium");
    }

    #[tokio::test]
    async fn test_error_body_becomes_error_kind() {
        let router = Router::new().route(
            "/call",
            post(|| async {
                (
                    AxumStatus::NOT_FOUND,
                    axum::Json(json!({"error": {"kind": "not_found", "message": "Customer with ID 9 not found"}})),
                )
            }),
        );
        let client = GatewayClient::new(serve(router).await, Duration::from_secs(5)).unwrap();
        let err = client
            .invoke(ToolInvocation::new("fetch_customer_data", json!({"customer_id": 9})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.public_message(), "Customer with ID 9 not found");
    }

    #[tokio::test]
    async fn test_refused_connection_is_unavailable() {
        let client = GatewayClient::new(closed_port_url().await, Duration::from_secs(5)).unwrap();
        let err = client
            .invoke(ToolInvocation::new("retrieve_customer_history", json!({"customer_id": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert!(!err.may_have_applied());
    }

    #[tokio::test]
    async fn test_slow_gateway_is_timeout() {
        let router = Router::new().route(
            "/call",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                axum::Json(json!({"result": []}))
            }),
        );
        let client = GatewayClient::new(serve(router).await, Duration::from_millis(200)).unwrap();
        let err = client
            .invoke(ToolInvocation::new("retrieve_customer_history", json!({"customer_id": 1})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.may_have_applied());
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_locally() {
        let client = GatewayClient::new(closed_port_url().await, Duration::from_secs(1)).unwrap();
        let err = client
            .invoke(ToolInvocation::new("drop_everything", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_fetch_card() {
        let card = CapabilityCard::support("http://127.0.0.1:9301");
        let served = card.clone();
        let router = Router::new().route(
            AGENT_CARD_PATH,
            get(move || {
                let card = served.clone();
                async move { axum::Json(card) }
            }),
        );
        let client = AgentClient::new(Duration::from_secs(5)).unwrap();
        let fetched = client.fetch_card(&serve(router).await).await.unwrap();
        assert_eq!(fetched, card);
    }

    #[tokio::test]
    async fn test_plain_503_is_unavailable() {
        let router = Router::new().route("/", post(|| async { AxumStatus::SERVICE_UNAVAILABLE }));
        let client = AgentClient::new(Duration::from_secs(5)).unwrap();
        let task = DelegatedTask::new(
            "c-1",
            "show customer 1",
            cs_core::agents::TaskHints::new(cs_core::agents::TaskAction::Lookup).customer(1),
        );
        let err = client.send_task(&serve(router).await, &task).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }
}
