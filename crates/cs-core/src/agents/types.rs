//! Delegation contract between the orchestrator and specialist agents
//!
//! - DelegatedTask: what the orchestrator sends to `POST /`
//! - SpecialistReport: what a specialist answers
//! - ToolCallRecord: one gateway call made while handling a task

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::ErrorDetail;
use crate::records::{AccountId, AccountStatus, CustomerUpdate, Priority};
use crate::tool::ToolName;

/// Unique identifier for a delegated task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a sub-task asks the specialist to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    /// Show one customer record
    Lookup,
    /// Change contact fields or status
    Update,
    /// Show contact info plus all tickets
    History,
    /// Accounts with open tickets
    OpenTicketReport,
    /// Log a new support ticket
    RaiseIssue,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::Update => "update",
            Self::History => "history",
            Self::OpenTicketReport => "open_ticket_report",
            Self::RaiseIssue => "raise_issue",
        }
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured hints accompanying the natural-language intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHints {
    pub action: TaskAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<CustomerUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_status: Option<AccountStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl TaskHints {
    pub fn new(action: TaskAction) -> Self {
        Self {
            action,
            customer_id: None,
            update: None,
            urgency: None,
            description: None,
            account_status: None,
            limit: None,
        }
    }

    pub fn customer(mut self, id: AccountId) -> Self {
        self.customer_id = Some(id);
        self
    }

    pub fn update(mut self, update: CustomerUpdate) -> Self {
        self.update = Some(update);
        self
    }

    pub fn urgency(mut self, urgency: Priority) -> Self {
        self.urgency = Some(urgency);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn account_status(mut self, status: AccountStatus) -> Self {
        self.account_status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Sub-task sent from the orchestrator to a specialist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegatedTask {
    #[serde(default)]
    pub task_id: TaskId,
    pub correlation_id: String,
    pub intent: String,
    pub hints: TaskHints,
}

impl DelegatedTask {
    pub fn new(correlation_id: impl Into<String>, intent: impl Into<String>, hints: TaskHints) -> Self {
        Self {
            task_id: TaskId::default(),
            correlation_id: correlation_id.into(),
            intent: intent.into(),
            hints,
        }
    }
}

/// Overall result of a delegated task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    Success,
    Partial,
    Failure,
}

impl AgentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for AgentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of a tool call during execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: ToolName,
    pub arguments: JsonValue,
    /// Whether a failure of this call fails the task
    pub required: bool,
    /// Number of attempts including retries
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ToolCallRecord {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Structured answer of a specialist to a delegated task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistReport {
    pub task_id: TaskId,
    pub agent: String,
    pub outcome: AgentOutcome,
    #[serde(default)]
    pub tool_calls_made: Vec<ToolCallRecord>,
    #[serde(default)]
    pub result_payload: JsonValue,
    /// Index into `tool_calls_made` of the first failed call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<usize>,
    pub summary: String,
}
