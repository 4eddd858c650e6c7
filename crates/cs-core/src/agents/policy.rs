//! Specialist decision policies
//!
//! A policy decides which gateway call a specialist makes next, given the
//! task and the calls already made. It is the seam where a language model
//! would plug in; the rule policies here are deterministic.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use super::types::{DelegatedTask, TaskAction};
use crate::records::{AccountId, AccountStatus, Priority, TicketStatus};
use crate::tool::{DEFAULT_RESULT_LIMIT, ToolCall, ToolOutput};
use crate::{Error, ErrorDetail, Result};

/// A call already made while handling a task
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub call: ToolCall,
    pub outcome: std::result::Result<ToolOutput, ErrorDetail>,
}

impl Observation {
    pub fn output(&self) -> Option<&ToolOutput> {
        self.outcome.as_ref().ok()
    }
}

/// The next call a policy wants to make
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCall {
    pub call: ToolCall,
    /// A failed required call ends the task
    pub required: bool,
}

impl PlannedCall {
    pub fn required(call: ToolCall) -> Self {
        Self {
            call,
            required: true,
        }
    }

    pub fn optional(call: ToolCall) -> Self {
        Self {
            call,
            required: false,
        }
    }
}

/// Payload and one-line summary built from the observations
#[derive(Debug, Clone, PartialEq)]
pub struct Conclusion {
    pub payload: JsonValue,
    pub summary: String,
}

/// Decision policy of a specialist agent
#[async_trait]
pub trait SpecialistPolicy: Send + Sync {
    /// Next call to make, or `None` when the task is done.
    ///
    /// `done` holds every call made so far in order, failed ones included.
    async fn next_call(&self, task: &DelegatedTask, done: &[Observation]) -> Result<Option<PlannedCall>>;

    /// Combine the observations into the result payload
    fn conclude(&self, task: &DelegatedTask, done: &[Observation]) -> Conclusion;
}

const HIGH_URGENCY: [&str; 9] = [
    "billing",
    "refund",
    "charge",
    "outage",
    "immediately",
    "urgent",
    "asap",
    "critical",
    "emergency",
];

const LOW_URGENCY: [&str; 5] = ["password", "reset", "minor", "question", "inquiry"];

/// Ticket priority for a free-text request.
///
/// Billing, refunds, charges, outages and explicit urgency are high;
/// password resets and minor inquiries are low; anything else is medium.
pub fn classify_urgency(text: &str) -> Priority {
    let lower = text.to_lowercase();
    if HIGH_URGENCY.iter().any(|k| lower.contains(k)) {
        Priority::High
    } else if LOW_URGENCY.iter().any(|k| lower.contains(k)) {
        Priority::Low
    } else {
        Priority::Medium
    }
}

fn require_customer(task: &DelegatedTask) -> Result<AccountId> {
    task.hints
        .customer_id
        .ok_or_else(|| Error::Validation("A customer id is required for this request".to_string()))
}

fn unsupported(agent: &str, action: TaskAction) -> Error {
    Error::Validation(format!("The {} agent cannot handle '{}' tasks", agent, action))
}

fn output_at(done: &[Observation], index: usize) -> Option<&ToolOutput> {
    done.get(index).and_then(Observation::output)
}

/// Policy of the customer information agent
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerInfoPolicy;

#[async_trait]
impl SpecialistPolicy for CustomerInfoPolicy {
    async fn next_call(&self, task: &DelegatedTask, done: &[Observation]) -> Result<Option<PlannedCall>> {
        let hints = &task.hints;
        match hints.action {
            TaskAction::Lookup => {
                if !done.is_empty() {
                    return Ok(None);
                }
                Ok(Some(PlannedCall::required(ToolCall::FetchCustomerData {
                    customer_id: require_customer(task)?,
                })))
            }
            TaskAction::Update => {
                if !done.is_empty() {
                    return Ok(None);
                }
                let customer_id = require_customer(task)?;
                let update = hints
                    .update
                    .clone()
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| Error::Validation("No fields to update were given".to_string()))?;
                Ok(Some(PlannedCall::required(ToolCall::ModifyCustomerRecord {
                    customer_id,
                    update,
                })))
            }
            // Contact info first, so the answer reflects any earlier update
            TaskAction::History => {
                let customer_id = require_customer(task)?;
                Ok(match done.len() {
                    0 => Some(PlannedCall::required(ToolCall::FetchCustomerData { customer_id })),
                    1 => Some(PlannedCall::required(ToolCall::RetrieveCustomerHistory {
                        customer_id,
                    })),
                    _ => None,
                })
            }
            TaskAction::OpenTicketReport => {
                if done.is_empty() {
                    return Ok(Some(PlannedCall::required(ToolCall::SearchCustomerAccounts {
                        account_status: Some(hints.account_status.unwrap_or(AccountStatus::Active)),
                        result_limit: hints.limit.unwrap_or(DEFAULT_RESULT_LIMIT),
                    })));
                }
                let accounts = output_at(done, 0).and_then(ToolOutput::as_accounts).unwrap_or(&[]);
                Ok(accounts.get(done.len() - 1).map(|account| {
                    PlannedCall::optional(ToolCall::RetrieveCustomerHistory {
                        customer_id: account.identifier,
                    })
                }))
            }
            TaskAction::RaiseIssue => Err(unsupported("customer information", hints.action)),
        }
    }

    fn conclude(&self, task: &DelegatedTask, done: &[Observation]) -> Conclusion {
        match task.hints.action {
            TaskAction::Lookup => {
                let account = output_at(done, 0).and_then(ToolOutput::as_account);
                Conclusion {
                    payload: json!({ "customer": account }),
                    summary: match account {
                        Some(a) => format!(
                            "Customer {}: {} <{}>, {}, account {}",
                            a.identifier,
                            a.full_name,
                            a.contact_email,
                            a.contact_phone,
                            a.account_status.as_str()
                        ),
                        None => "Customer record unavailable".to_string(),
                    },
                }
            }
            TaskAction::Update => {
                let account = output_at(done, 0).and_then(ToolOutput::as_account);
                let fields = task
                    .hints
                    .update
                    .as_ref()
                    .map(|u| u.field_names())
                    .unwrap_or_default();
                Conclusion {
                    payload: json!({ "customer": account, "updated_fields": fields }),
                    summary: match account {
                        Some(a) => format!(
                            "Updated {} for customer {}",
                            fields.join(", "),
                            a.identifier
                        ),
                        None => "Customer record was not updated".to_string(),
                    },
                }
            }
            TaskAction::History => {
                let account = output_at(done, 0).and_then(ToolOutput::as_account);
                let tickets = output_at(done, 1).and_then(ToolOutput::as_tickets);
                let summary = match (account, tickets) {
                    (Some(a), Some(t)) => format!(
                        "Customer {} ({}) has {} ticket(s)",
                        a.identifier,
                        a.contact_email,
                        t.len()
                    ),
                    _ => "Ticket history unavailable".to_string(),
                };
                Conclusion {
                    payload: json!({ "customer": account, "tickets": tickets }),
                    summary,
                }
            }
            TaskAction::OpenTicketReport => {
                let accounts = output_at(done, 0).and_then(ToolOutput::as_accounts).unwrap_or(&[]);
                let mut matches = Vec::new();
                for observation in done.iter().skip(1) {
                    let (Some(customer_id), Some(tickets)) = (
                        observation.call.customer_id(),
                        observation.output().and_then(ToolOutput::as_tickets),
                    ) else {
                        continue;
                    };
                    let open: Vec<_> = tickets
                        .iter()
                        .filter(|t| t.status == TicketStatus::Open)
                        .collect();
                    if open.is_empty() {
                        continue;
                    }
                    if let Some(account) = accounts.iter().find(|a| a.identifier == customer_id) {
                        matches.push(json!({ "customer": account, "open_tickets": open }));
                    }
                }
                Conclusion {
                    summary: format!(
                        "{} of {} {} account(s) have open tickets",
                        matches.len(),
                        accounts.len(),
                        task.hints
                            .account_status
                            .unwrap_or(AccountStatus::Active)
                            .as_str()
                    ),
                    payload: json!({ "accounts": matches }),
                }
            }
            TaskAction::RaiseIssue => Conclusion {
                payload: JsonValue::Null,
                summary: "Ticket creation is handled by the support agent".to_string(),
            },
        }
    }
}

/// Policy of the support agent
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportPolicy;

#[async_trait]
impl SpecialistPolicy for SupportPolicy {
    async fn next_call(&self, task: &DelegatedTask, done: &[Observation]) -> Result<Option<PlannedCall>> {
        if !done.is_empty() {
            return Ok(None);
        }
        let hints = &task.hints;
        let customer_id = require_customer(task)?;
        let call = match hints.action {
            TaskAction::RaiseIssue => {
                let description = hints
                    .description
                    .clone()
                    .unwrap_or_else(|| task.intent.clone());
                ToolCall::RegisterSupportIssue {
                    customer_id,
                    urgency_level: hints.urgency.unwrap_or_else(|| classify_urgency(&description)),
                    query_description: description,
                }
            }
            TaskAction::History => ToolCall::RetrieveCustomerHistory { customer_id },
            TaskAction::Lookup => ToolCall::FetchCustomerData { customer_id },
            other => return Err(unsupported("support", other)),
        };
        Ok(Some(PlannedCall::required(call)))
    }

    fn conclude(&self, _task: &DelegatedTask, done: &[Observation]) -> Conclusion {
        match output_at(done, 0) {
            Some(ToolOutput::Ticket(ticket)) => Conclusion {
                payload: json!({ "ticket": ticket }),
                summary: format!(
                    "Opened ticket #{} for customer {} with {} priority; status {}",
                    ticket.ticket_id,
                    ticket.account_id,
                    ticket.priority_level.as_str(),
                    ticket.status.as_str()
                ),
            },
            Some(ToolOutput::Tickets(tickets)) => Conclusion {
                payload: json!({ "tickets": tickets }),
                summary: format!("Found {} ticket(s)", tickets.len()),
            },
            Some(ToolOutput::Account(account)) => Conclusion {
                payload: json!({ "customer": account }),
                summary: format!("Customer {}: {}", account.identifier, account.full_name),
            },
            _ => Conclusion {
                payload: JsonValue::Null,
                summary: "No support action completed".to_string(),
            },
        }
    }
}
