//! Per-request workflow state

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agents::{AgentOutcome, DelegatedTask, SpecialistReport};
use crate::{Error, ErrorDetail, Result};

/// States of one orchestrated request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Received,
    Planning,
    /// Delegating the step with this 1-based index
    Delegating(usize),
    Aggregating,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: &WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Received, Planning)
                | (Planning, Delegating(_))
                | (Planning, Aggregating)
                | (Planning, Failed)
                | (Delegating(_), Planning)
                | (Delegating(_), Failed)
                | (Aggregating, Completed)
                | (Aggregating, Failed)
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => f.write_str("RECEIVED"),
            Self::Planning => f.write_str("PLANNING"),
            Self::Delegating(n) => write!(f, "DELEGATING({})", n),
            Self::Aggregating => f.write_str("AGGREGATING"),
            Self::Completed => f.write_str("COMPLETED"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// How a planned step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Partial,
    Failed,
    /// Never sent to an agent
    Skipped,
}

impl From<AgentOutcome> for StepStatus {
    fn from(outcome: AgentOutcome) -> Self {
        match outcome {
            AgentOutcome::Success => Self::Succeeded,
            AgentOutcome::Partial => Self::Partial,
            AgentOutcome::Failure => Self::Failed,
        }
    }
}

/// One recorded step of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationStep {
    /// 1-based position in the workflow
    pub index: usize,
    pub target_agent: String,
    pub request: DelegatedTask,
    pub load_bearing: bool,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<SpecialistReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// State of one end-user request, owned by a single orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowContext {
    correlation_id: String,
    request: String,
    state: WorkflowState,
    steps: Vec<DelegationStep>,
    started_at: DateTime<Utc>,
}

impl WorkflowContext {
    /// Capture a request under a fresh correlation id
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            correlation_id: uuid::Uuid::now_v7().to_string(),
            request: request.into(),
            state: WorkflowState::Received,
            steps: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn steps(&self) -> &[DelegationStep] {
        &self.steps
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Index the next recorded step will get
    pub fn next_index(&self) -> usize {
        self.steps.len() + 1
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, next: WorkflowState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        info!(
            correlation_id = %self.correlation_id,
            from = %self.state,
            to = %next,
            "Workflow transition"
        );
        self.state = next;
        Ok(())
    }

    pub(crate) fn record(&mut self, step: DelegationStep) {
        self.steps.push(step);
    }
}
