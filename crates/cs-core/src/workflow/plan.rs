//! Planning
//!
//! The planner maps a request to the steps that remain to be delegated.
//! It is consulted again after every step, so a plan may depend on what
//! earlier steps returned.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::context::WorkflowContext;
use crate::agents::{
    CUSTOMER_INFO_AGENT, SUPPORT_AGENT, TaskAction, TaskHints, classify_urgency,
};
use crate::records::{AccountStatus, CustomerUpdate};
use crate::tool::ToolName;
use crate::{Error, Result};

/// One planned delegation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub target_agent: String,
    /// Natural-language sub-task sent with the hints
    pub intent: String,
    pub hints: TaskHints,
    /// Tools the target must be permitted to call
    pub required_tools: Vec<ToolName>,
    /// `None` defers to the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_bearing: Option<bool>,
}

impl PlannedStep {
    pub fn new(target_agent: impl Into<String>, intent: impl Into<String>, hints: TaskHints) -> Self {
        Self {
            target_agent: target_agent.into(),
            intent: intent.into(),
            hints,
            required_tools: vec![],
            load_bearing: None,
        }
    }

    pub fn requires(mut self, tools: &[ToolName]) -> Self {
        self.required_tools = tools.to_vec();
        self
    }

    pub fn load_bearing(mut self, load_bearing: bool) -> Self {
        self.load_bearing = Some(load_bearing);
        self
    }
}

/// Decides the remaining plan for a request
#[async_trait]
pub trait PlanningPolicy: Send + Sync {
    /// Steps still to run, in order; empty when the request is served.
    ///
    /// `context` holds every step recorded so far, skipped ones included.
    async fn plan(&self, context: &WorkflowContext) -> Result<Vec<PlannedStep>>;
}

static CUSTOMER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:customer|account|client|user)(?:\s+id)?(?:\s+is|\s+number|\s*[:#])?\s*(\d+)\b")
        .expect("customer id pattern is a compile-time constant")
});

static BARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bid(?:\s+is|\s*[:#])?\s*(\d+)\b")
        .expect("id pattern is a compile-time constant")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+")
        .expect("email pattern is a compile-time constant")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)phone(?:\s+number)?\s+(?:to\s+)?(\+?[\d][\d\s().-]{5,}\d)")
        .expect("phone pattern is a compile-time constant")
});

static OPEN_TICKETS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bopen\s+(?:\w+\s+)?tickets?\b")
        .expect("open tickets pattern is a compile-time constant")
});

const UPDATE_WORDS: [&str; 4] = ["change", "update", "set ", "modify"];
const HISTORY_WORDS: [&str; 3] = ["history", "tickets", "past issues"];
const LOOKUP_WORDS: [&str; 7] = ["get", "show", "record", "detail", "info", "look up", "find"];
const ISSUE_WORDS: [&str; 17] = [
    "urgent",
    "refund",
    "charged",
    "billing",
    "outage",
    "issue",
    "problem",
    "help",
    "upgrade",
    "password",
    "cancel",
    "broken",
    "not working",
    "complaint",
    "can't",
    "cannot",
    "support",
];

fn first_position(haystack: &str, words: &[&str]) -> Option<usize> {
    words.iter().filter_map(|w| haystack.find(w)).min()
}

/// Deterministic keyword planner.
///
/// Extracts the customer id, contact changes and the intents in the order
/// they appear in the request, then plans one step per intent: updates and
/// lookups go to the customer information agent, issues to support.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulePlanner;

impl RulePlanner {
    /// The whole plan for a request
    pub fn full_plan(&self, request: &str) -> Result<Vec<PlannedStep>> {
        let lower = request.to_lowercase();
        let customer_id = CUSTOMER_ID
            .captures(request)
            .or_else(|| BARE_ID.captures(request))
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok());

        let mut update = CustomerUpdate::default();
        if let Some(email) = EMAIL.find(request) {
            update.contact_email = Some(email.as_str().to_string());
        }
        if let Some(phone) = PHONE.captures(request).and_then(|c| c.get(1)) {
            update.contact_phone = Some(phone.as_str().trim().to_string());
        }

        let report_at = OPEN_TICKETS.find(&lower).map(|m| m.start()).filter(|_| {
            customer_id.is_none()
                && ["active", "all ", "accounts", "customers"]
                    .iter()
                    .any(|w| lower.contains(w))
        });

        let mut intents: Vec<(usize, TaskAction)> = Vec::new();
        if let Some(at) = report_at {
            intents.push((at, TaskAction::OpenTicketReport));
        }
        if customer_id.is_some() {
            if !update.is_empty() {
                if let Some(at) = first_position(&lower, &UPDATE_WORDS) {
                    intents.push((at, TaskAction::Update));
                }
            }
            if let Some(at) = first_position(&lower, &HISTORY_WORDS) {
                intents.push((at, TaskAction::History));
            }
            if let Some(at) = first_position(&lower, &ISSUE_WORDS) {
                intents.push((at, TaskAction::RaiseIssue));
            }
            if intents.is_empty() {
                let at = first_position(&lower, &LOOKUP_WORDS).unwrap_or(0);
                intents.push((at, TaskAction::Lookup));
            }
        }
        intents.sort_by_key(|(at, _)| *at);

        if intents.is_empty() {
            return Err(Error::Validation(
                "Could not determine which customer the request is about".to_string(),
            ));
        }

        let steps = intents
            .into_iter()
            .map(|(_, action)| {
                let base = TaskHints::new(action);
                let hints = match customer_id {
                    Some(id) => base.customer(id),
                    None => base,
                };
                match action {
                    TaskAction::Lookup => PlannedStep::new(CUSTOMER_INFO_AGENT, request, hints)
                        .requires(&[ToolName::FetchCustomerData]),
                    TaskAction::Update => PlannedStep::new(
                        CUSTOMER_INFO_AGENT,
                        request,
                        hints.update(update.clone()),
                    )
                    .requires(&[ToolName::ModifyCustomerRecord]),
                    TaskAction::History => PlannedStep::new(CUSTOMER_INFO_AGENT, request, hints)
                        .requires(&[
                            ToolName::FetchCustomerData,
                            ToolName::RetrieveCustomerHistory,
                        ]),
                    TaskAction::OpenTicketReport => PlannedStep::new(
                        CUSTOMER_INFO_AGENT,
                        request,
                        hints.account_status(AccountStatus::Active),
                    )
                    .requires(&[
                        ToolName::SearchCustomerAccounts,
                        ToolName::RetrieveCustomerHistory,
                    ]),
                    TaskAction::RaiseIssue => PlannedStep::new(
                        SUPPORT_AGENT,
                        request,
                        hints
                            .urgency(classify_urgency(request))
                            .description(request.trim()),
                    )
                    .requires(&[ToolName::RegisterSupportIssue]),
                }
            })
            .collect();
        Ok(steps)
    }
}

#[async_trait]
impl PlanningPolicy for RulePlanner {
    async fn plan(&self, context: &WorkflowContext) -> Result<Vec<PlannedStep>> {
        let full = self.full_plan(context.request())?;
        Ok(full.into_iter().skip(context.steps().len()).collect())
    }
}
