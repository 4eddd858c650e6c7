//! Final response of a workflow

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::context::{DelegationStep, StepStatus, WorkflowContext};
use crate::agents::{AgentOutcome, ToolCallRecord};
use crate::ErrorDetail;

/// End-user request sent to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRequest {
    pub message: String,
}

impl UserRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminal status of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Completed,
    Failed,
}

/// Stage a failed workflow stopped in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Delegation,
    Aggregation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Delegation => "delegation",
            Self::Aggregation => "aggregation",
        }
    }
}

/// Why a workflow failed, without internal detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub reason: String,
}

/// User-facing view of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub index: usize,
    pub agent: String,
    pub action: String,
    pub status: StepStatus,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl From<&DelegationStep> for StepSummary {
    fn from(step: &DelegationStep) -> Self {
        let summary = match (&step.report, &step.error, &step.skip_reason) {
            (Some(report), _, _) => report.summary.clone(),
            (None, Some(err), _) => format!("Delegation failed: {}", err.message),
            (None, None, Some(reason)) => format!("Skipped: {}", reason),
            (None, None, None) => String::new(),
        };
        Self {
            index: step.index,
            agent: step.target_agent.clone(),
            action: step.request.hints.action.to_string(),
            status: step.status,
            summary,
            result: step
                .report
                .as_ref()
                .map(|r| r.result_payload.clone())
                .filter(|payload| !payload.is_null()),
            tool_calls: step
                .report
                .as_ref()
                .map(|r| r.tool_calls_made.clone())
                .unwrap_or_default(),
            error: step.error.clone(),
        }
    }
}

/// Final answer of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResponse {
    pub correlation_id: String,
    pub status: WorkflowStatus,
    pub outcome: AgentOutcome,
    pub message: String,
    pub steps: Vec<StepSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
}

impl WorkflowResponse {
    pub fn is_completed(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    /// Steps that reached an agent and produced a result
    pub fn results(&self) -> impl Iterator<Item = &JsonValue> {
        self.steps.iter().filter_map(|s| s.result.as_ref())
    }
}

fn contributed(step: &DelegationStep) -> bool {
    matches!(step.status, StepStatus::Succeeded | StepStatus::Partial)
}

/// Combine the recorded steps of a finished delegation phase.
///
/// Fails when no step produced anything.
pub fn aggregate(context: &WorkflowContext) -> Result<WorkflowResponse, StageFailure> {
    let steps = context.steps();
    if !steps.iter().any(contributed) {
        return Err(StageFailure {
            stage: Stage::Aggregation,
            reason: "No step produced a result".to_string(),
        });
    }

    let outcome = if steps.iter().all(|s| s.status == StepStatus::Succeeded) {
        AgentOutcome::Success
    } else {
        AgentOutcome::Partial
    };
    let summaries: Vec<StepSummary> = steps.iter().map(StepSummary::from).collect();
    let message = summaries
        .iter()
        .map(|s| format!("{}. {}", s.index, s.summary))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(WorkflowResponse {
        correlation_id: context.correlation_id().to_string(),
        status: WorkflowStatus::Completed,
        outcome,
        message,
        steps: summaries,
        failure: None,
    })
}

/// Response for a workflow that stopped in `failure.stage`
pub fn failed_response(context: &WorkflowContext, failure: StageFailure) -> WorkflowResponse {
    let steps: Vec<StepSummary> = context.steps().iter().map(StepSummary::from).collect();
    WorkflowResponse {
        correlation_id: context.correlation_id().to_string(),
        status: WorkflowStatus::Failed,
        outcome: AgentOutcome::Failure,
        message: format!("Request failed during {}: {}", failure.stage.as_str(), failure.reason),
        steps,
        failure: Some(failure),
    }
}
