//! Specialist agent
//!
//! Wraps a decision policy, an allowed tool set and a tool invoker. Calls
//! for one task run strictly one after another so every call observes the
//! writes of the calls before it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::card::CapabilityCard;
use super::policy::{Observation, SpecialistPolicy};
use super::retry::{RetryPolicy, with_deadline};
use super::types::{AgentOutcome, DelegatedTask, SpecialistReport, ToolCallRecord};
use crate::ErrorDetail;
use crate::tool::ToolInvoker;

/// Upper bound on calls per task, guarding against a runaway policy
pub const MAX_CALLS_PER_TASK: usize = 64;

/// A specialist agent serving delegated tasks
pub struct SpecialistAgent {
    card: CapabilityCard,
    policy: Arc<dyn SpecialistPolicy>,
    tools: Arc<dyn ToolInvoker>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl SpecialistAgent {
    pub fn new(
        card: CapabilityCard,
        policy: Arc<dyn SpecialistPolicy>,
        tools: Arc<dyn ToolInvoker>,
    ) -> Self {
        Self {
            card,
            policy,
            tools,
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Deadline for a single gateway call attempt
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn card(&self) -> &CapabilityCard {
        &self.card
    }

    pub fn name(&self) -> &str {
        &self.card.name
    }

    /// Handle a delegated task.
    ///
    /// Failures are reported in the returned report, never dropped: the
    /// outcome is `success` only if every call succeeded.
    pub async fn handle(&self, task: DelegatedTask) -> SpecialistReport {
        info!(
            agent = %self.card.name,
            correlation_id = %task.correlation_id,
            task_id = %task.task_id,
            action = %task.hints.action,
            "Handling delegated task"
        );

        let mut observations: Vec<Observation> = Vec::new();
        let mut records: Vec<ToolCallRecord> = Vec::new();
        let mut failed_step: Option<usize> = None;
        let mut stop_error: Option<ErrorDetail> = None;

        loop {
            if records.len() >= MAX_CALLS_PER_TASK {
                stop_error = Some(ErrorDetail::new(
                    crate::ErrorKind::Internal,
                    "call budget for this task exhausted",
                ));
                break;
            }

            let planned = match self.policy.next_call(&task, &observations).await {
                Ok(Some(planned)) => planned,
                Ok(None) => break,
                Err(e) => {
                    warn!(agent = %self.card.name, correlation_id = %task.correlation_id, error = %e, "Policy could not decide");
                    stop_error = Some(ErrorDetail::from(&e));
                    break;
                }
            };

            let tool = planned.call.name();
            let invocation = planned.call.to_invocation(&task.correlation_id);
            let mut record = ToolCallRecord {
                tool,
                arguments: invocation.arguments.clone(),
                required: planned.required,
                attempts: 0,
                error: None,
            };

            let outcome = if !self.card.permits(tool) {
                Err(ErrorDetail::new(
                    crate::ErrorKind::Validation,
                    format!("Tool '{}' is not permitted for agent '{}'", tool, self.card.name),
                ))
            } else {
                let (result, attempts) = self
                    .retry
                    .run(tool.as_str(), tool.is_write(), || {
                        with_deadline(
                            self.call_timeout,
                            tool.as_str(),
                            self.tools.invoke(invocation.clone()),
                        )
                    })
                    .await;
                record.attempts = attempts;
                result.map_err(|e| ErrorDetail::from(&e))
            };

            debug!(
                agent = %self.card.name,
                correlation_id = %task.correlation_id,
                tool = %tool,
                attempts = record.attempts,
                ok = outcome.is_ok(),
                "Tool call finished"
            );

            let failed = outcome.as_ref().err().cloned();
            record.error = failed.clone();
            records.push(record);
            observations.push(Observation {
                call: planned.call,
                outcome,
            });

            if let Some(err) = failed {
                if failed_step.is_none() {
                    failed_step = Some(records.len() - 1);
                }
                if planned.required {
                    stop_error = Some(err);
                    break;
                }
            }
        }

        let succeeded = records.iter().filter(|r| r.succeeded()).count();
        let any_failure = stop_error.is_some() || failed_step.is_some();
        let outcome = if !any_failure {
            AgentOutcome::Success
        } else if succeeded == 0 {
            AgentOutcome::Failure
        } else {
            AgentOutcome::Partial
        };

        let conclusion = self.policy.conclude(&task, &observations);
        let first_error = failed_step
            .and_then(|i| records[i].error.clone())
            .or(stop_error);
        let summary = match (outcome, first_error) {
            (AgentOutcome::Success, _) | (_, None) => conclusion.summary,
            (AgentOutcome::Failure, Some(err)) => format!("Failed: {}", err.message),
            (AgentOutcome::Partial, Some(err)) => {
                format!("{} (incomplete: {})", conclusion.summary, err.message)
            }
        };

        match outcome {
            AgentOutcome::Success => info!(
                agent = %self.card.name,
                correlation_id = %task.correlation_id,
                calls = records.len(),
                "Task completed"
            ),
            _ => error!(
                agent = %self.card.name,
                correlation_id = %task.correlation_id,
                outcome = %outcome,
                failed_step = ?failed_step,
                summary = %summary,
                "Task did not fully succeed"
            ),
        }

        SpecialistReport {
            task_id: task.task_id,
            agent: self.card.name.clone(),
            outcome,
            tool_calls_made: records,
            result_payload: conclusion.payload,
            failed_step,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::policy::{CustomerInfoPolicy, SupportPolicy};
    use crate::agents::types::{TaskAction, TaskHints};
    use crate::records::{AccountStatus, CustomerAccount, Priority, SupportTicket, TicketStatus};
    use crate::tool::{ToolCall, ToolInvocation, ToolName, ToolOutput};
    use crate::{Error, ErrorKind, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Scripted gateway: pops one result per call and records what it saw
    struct ScriptedTools {
        script: Mutex<Vec<Result<ToolOutput>>>,
        seen: Mutex<Vec<ToolInvocation>>,
        delay: Duration,
    }

    impl ScriptedTools {
        fn new(mut script: Vec<Result<ToolOutput>>) -> Arc<Self> {
            script.reverse();
            Arc::new(Self {
                script: Mutex::new(script),
                seen: Mutex::new(vec![]),
                delay: Duration::ZERO,
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(vec![]),
                seen: Mutex::new(vec![]),
                delay,
            })
        }

        fn seen(&self) -> Vec<ToolInvocation> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolInvoker for ScriptedTools {
        async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
            self.seen.lock().unwrap().push(invocation);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(Error::Other("script exhausted".into())))
        }
    }

    fn account(id: i64) -> CustomerAccount {
        CustomerAccount {
            identifier: id,
            full_name: format!("Customer {}", id),
            contact_email: format!("c{}@example.com", id),
            contact_phone: "000".into(),
            account_status: AccountStatus::Active,
            creation_timestamp: Utc::now(),
            last_modified_timestamp: Utc::now(),
        }
    }

    fn ticket(id: i64, account_id: i64, status: TicketStatus) -> SupportTicket {
        SupportTicket {
            ticket_id: id,
            account_id,
            description: "Issue".into(),
            status,
            priority_level: Priority::High,
            submission_timestamp: Utc::now(),
        }
    }

    fn agent(card: CapabilityCard, policy: Arc<dyn SpecialistPolicy>, tools: Arc<ScriptedTools>) -> SpecialistAgent {
        SpecialistAgent::new(card, policy, tools)
            .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
            .with_call_timeout(Duration::from_millis(50))
    }

    fn customer_info(tools: Arc<ScriptedTools>) -> SpecialistAgent {
        agent(CapabilityCard::customer_info("local"), Arc::new(CustomerInfoPolicy), tools)
    }

    #[tokio::test]
    async fn test_history_success() {
        let tools = ScriptedTools::new(vec![
            Ok(ToolOutput::Account(account(5))),
            Ok(ToolOutput::Tickets(vec![ticket(1, 5, TicketStatus::Open)])),
        ]);
        let report = customer_info(tools.clone())
            .handle(DelegatedTask::new("c", "history", TaskHints::new(TaskAction::History).customer(5)))
            .await;

        assert_eq!(report.outcome, AgentOutcome::Success);
        assert_eq!(report.tool_calls_made.len(), 2);
        assert_eq!(report.result_payload["tickets"][0]["ticket_id"], 1);
        let seen = tools.seen();
        assert_eq!(seen[0].tool, "fetch_customer_data");
        assert_eq!(seen[1].tool, "retrieve_customer_history");
        assert_eq!(seen[1].correlation_id.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_not_found_is_failure_without_retry() {
        let tools = ScriptedTools::new(vec![Err(Error::NotFound("Account 9 not found".into()))]);
        let report = customer_info(tools.clone())
            .handle(DelegatedTask::new("c", "lookup", TaskHints::new(TaskAction::Lookup).customer(9)))
            .await;

        assert_eq!(report.outcome, AgentOutcome::Failure);
        assert_eq!(report.failed_step, Some(0));
        assert_eq!(report.tool_calls_made[0].attempts, 1);
        assert_eq!(
            report.tool_calls_made[0].error.as_ref().unwrap().kind,
            ErrorKind::NotFound
        );
        assert!(report.summary.contains("Account 9"));
    }

    #[tokio::test]
    async fn test_required_failure_after_success_is_partial() {
        let tools = ScriptedTools::new(vec![
            Ok(ToolOutput::Account(account(5))),
            Err(Error::Consistency("account vanished".into())),
        ]);
        let report = customer_info(tools)
            .handle(DelegatedTask::new("c", "history", TaskHints::new(TaskAction::History).customer(5)))
            .await;

        assert_eq!(report.outcome, AgentOutcome::Partial);
        assert_eq!(report.failed_step, Some(1));
    }

    #[tokio::test]
    async fn test_transient_read_is_retried() {
        let tools = ScriptedTools::new(vec![
            Err(Error::Unavailable("gateway down".into())),
            Ok(ToolOutput::Account(account(1))),
        ]);
        let report = customer_info(tools.clone())
            .handle(DelegatedTask::new("c", "lookup", TaskHints::new(TaskAction::Lookup).customer(1)))
            .await;

        assert_eq!(report.outcome, AgentOutcome::Success);
        assert_eq!(report.tool_calls_made[0].attempts, 2);
        assert_eq!(tools.seen().len(), 2);
    }

    #[tokio::test]
    async fn test_timed_out_write_is_not_retried() {
        let tools = ScriptedTools::slow(Duration::from_millis(500));
        let support = agent(CapabilityCard::support("local"), Arc::new(SupportPolicy), tools.clone());
        let report = support
            .handle(DelegatedTask::new(
                "c",
                "refund",
                TaskHints::new(TaskAction::RaiseIssue).customer(1),
            ))
            .await;

        assert_eq!(report.outcome, AgentOutcome::Failure);
        assert_eq!(tools.seen().len(), 1);
        assert_eq!(
            report.tool_calls_made[0].error.as_ref().unwrap().kind,
            ErrorKind::Transient
        );
    }

    #[tokio::test]
    async fn test_optional_failures_make_report_partial() {
        let tools = ScriptedTools::new(vec![
            Ok(ToolOutput::Accounts(vec![account(1), account(2)])),
            Err(Error::Consistency("gone".into())),
            Ok(ToolOutput::Tickets(vec![ticket(3, 2, TicketStatus::Open)])),
        ]);
        let report = customer_info(tools)
            .handle(DelegatedTask::new(
                "c",
                "report",
                TaskHints::new(TaskAction::OpenTicketReport),
            ))
            .await;

        assert_eq!(report.outcome, AgentOutcome::Partial);
        assert_eq!(report.tool_calls_made.len(), 3);
        assert_eq!(report.failed_step, Some(1));
        assert_eq!(report.result_payload["accounts"][0]["customer"]["identifier"], 2);
    }

    #[tokio::test]
    async fn test_policy_error_is_failure() {
        let tools = ScriptedTools::new(vec![]);
        let report = customer_info(tools.clone())
            .handle(DelegatedTask::new("c", "lookup", TaskHints::new(TaskAction::Lookup)))
            .await;
        assert_eq!(report.outcome, AgentOutcome::Failure);
        assert!(report.tool_calls_made.is_empty());
        assert!(tools.seen().is_empty());
    }

    struct WritesEverything;

    #[async_trait]
    impl SpecialistPolicy for WritesEverything {
        async fn next_call(
            &self,
            _task: &DelegatedTask,
            done: &[Observation],
        ) -> Result<Option<crate::agents::policy::PlannedCall>> {
            Ok(done.is_empty().then(|| {
                crate::agents::policy::PlannedCall::required(ToolCall::RegisterSupportIssue {
                    customer_id: 1,
                    query_description: "x".into(),
                    urgency_level: Priority::Low,
                })
            }))
        }

        fn conclude(&self, _task: &DelegatedTask, _done: &[Observation]) -> crate::agents::policy::Conclusion {
            crate::agents::policy::Conclusion {
                payload: serde_json::Value::Null,
                summary: String::new(),
            }
        }
    }

    #[tokio::test]
    async fn test_disallowed_tool_never_reaches_gateway() {
        let tools = ScriptedTools::new(vec![]);
        let report = agent(
            CapabilityCard::customer_info("local"),
            Arc::new(WritesEverything),
            tools.clone(),
        )
        .handle(DelegatedTask::new("c", "x", TaskHints::new(TaskAction::RaiseIssue)))
        .await;

        assert_eq!(report.outcome, AgentOutcome::Failure);
        assert_eq!(report.tool_calls_made[0].tool, ToolName::RegisterSupportIssue);
        assert!(tools.seen().is_empty());
    }
}
