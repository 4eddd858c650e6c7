//! Orchestrator workflow engine
//!
//! Drives one request through
//! `RECEIVED → PLANNING → DELEGATING(n) → … → AGGREGATING → COMPLETED | FAILED`.
//! Steps run strictly in plan order; the planner is consulted again after
//! every step.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::aggregate::{Stage, StageFailure, WorkflowResponse, aggregate, failed_response};
use super::context::{DelegationStep, StepStatus, WorkflowContext, WorkflowState};
use super::plan::{PlannedStep, PlanningPolicy};
use crate::{ErrorDetail, ErrorKind};
use crate::agents::{AgentTransport, CapabilityDirectory, DelegatedTask, ResolvedAgent, with_deadline};
use crate::config::DelegationConfig;

type StageResult<T> = std::result::Result<T, StageFailure>;

/// The orchestrator agent
pub struct Orchestrator {
    directory: Arc<CapabilityDirectory>,
    planner: Arc<dyn PlanningPolicy>,
    transport: Arc<dyn AgentTransport>,
    config: DelegationConfig,
}

impl Orchestrator {
    pub fn new(
        directory: Arc<CapabilityDirectory>,
        planner: Arc<dyn PlanningPolicy>,
        transport: Arc<dyn AgentTransport>,
        config: DelegationConfig,
    ) -> Self {
        Self {
            directory,
            planner,
            transport,
            config,
        }
    }

    pub fn directory(&self) -> &CapabilityDirectory {
        &self.directory
    }

    /// Handle a request that cannot be cancelled
    pub async fn handle(&self, request: &str) -> WorkflowResponse {
        self.run(request, CancellationToken::new()).await
    }

    /// Handle a request.
    ///
    /// Cancelling `cancel` lets the in-flight delegation finish; no further
    /// step is issued afterwards.
    pub async fn run(&self, request: &str, cancel: CancellationToken) -> WorkflowResponse {
        let mut ctx = WorkflowContext::new(request);
        info!(correlation_id = %ctx.correlation_id(), "Workflow received");

        let response = match self.drive(&mut ctx, &cancel).await {
            Ok(()) => match aggregate(&ctx) {
                Ok(response) => match ctx.transition(WorkflowState::Completed) {
                    Ok(()) => response,
                    Err(e) => self.fail(&mut ctx, internal_failure(Stage::Aggregation, &e)),
                },
                Err(failure) => self.fail(&mut ctx, failure),
            },
            Err(failure) => self.fail(&mut ctx, failure),
        };

        info!(
            correlation_id = %ctx.correlation_id(),
            state = %ctx.state(),
            steps = ctx.steps().len(),
            outcome = %response.outcome,
            "Workflow finished"
        );
        debug!(
            correlation_id = %ctx.correlation_id(),
            context = %serde_json::to_string(&ctx).unwrap_or_default(),
            "Final workflow context"
        );
        response
    }

    async fn drive(&self, ctx: &mut WorkflowContext, cancel: &CancellationToken) -> StageResult<()> {
        advance(ctx, WorkflowState::Planning, Stage::Planning)?;
        let mut rounds = 0usize;

        loop {
            let plan = self.planner.plan(ctx).await.map_err(|e| StageFailure {
                stage: Stage::Planning,
                reason: e.public_message(),
            })?;
            let Some((step, rest)) = plan.split_first() else {
                break;
            };

            if cancel.is_cancelled() {
                info!(correlation_id = %ctx.correlation_id(), "Workflow cancelled; not issuing further steps");
                self.skip_all(ctx, &plan, "cancelled");
                return Err(StageFailure {
                    stage: Stage::Delegation,
                    reason: "cancelled".to_string(),
                });
            }

            rounds += 1;
            if rounds > self.config.max_rounds {
                self.skip_all(ctx, &plan, "planning round limit reached");
                return Err(StageFailure {
                    stage: Stage::Planning,
                    reason: format!("Plan did not finish within {} rounds", self.config.max_rounds),
                });
            }

            let index = ctx.next_index();
            advance(ctx, WorkflowState::Delegating(index), Stage::Delegation)?;
            let load_bearing = step
                .load_bearing
                .unwrap_or(self.config.load_bearing_by_default);
            let task = DelegatedTask::new(ctx.correlation_id(), step.intent.clone(), step.hints.clone());

            let agent = match self.guard(step) {
                Ok(agent) => agent,
                Err(reason) => {
                    warn!(
                        correlation_id = %ctx.correlation_id(),
                        step = index,
                        agent = %step.target_agent,
                        reason = %reason,
                        "Step rejected before delegation"
                    );
                    ctx.record(DelegationStep {
                        index,
                        target_agent: step.target_agent.clone(),
                        request: task,
                        load_bearing,
                        status: StepStatus::Skipped,
                        report: None,
                        error: None,
                        skip_reason: Some(reason.clone()),
                        timestamp: chrono::Utc::now(),
                    });
                    if load_bearing {
                        self.skip_all(ctx, rest, "an earlier load-bearing step was rejected");
                        return Err(StageFailure {
                            stage: Stage::Delegation,
                            reason,
                        });
                    }
                    advance(ctx, WorkflowState::Planning, Stage::Planning)?;
                    continue;
                }
            };

            debug!(
                correlation_id = %ctx.correlation_id(),
                step = index,
                agent = %agent.name,
                address = %agent.address,
                action = %task.hints.action,
                "Delegating step"
            );
            let result = with_deadline(
                self.config.timeout(),
                &format!("agent '{}'", agent.name),
                self.transport.delegate(&agent, task.clone()),
            )
            .await;

            let (status, report, err, outcome_unknown) = match result {
                Ok(report) => (StepStatus::from(report.outcome), Some(report), None, false),
                Err(e) => {
                    // A timed-out step may still have committed its writes
                    let outcome_unknown = e.kind() == ErrorKind::Transient && e.may_have_applied();
                    let mut detail = ErrorDetail::from(&e);
                    if outcome_unknown {
                        detail.message = format!("{}; the outcome is unknown", detail.message);
                    }
                    (StepStatus::Failed, None, Some(detail), outcome_unknown)
                }
            };

            let abort_reason = (load_bearing && status != StepStatus::Succeeded).then(|| {
                match (&report, &err) {
                    (Some(report), _) => format!(
                        "Step {} ({}) reported {}: {}",
                        index, agent.name, report.outcome, report.summary
                    ),
                    (None, Some(err)) if outcome_unknown => format!(
                        "Step {} ({}) did not answer in time: {}",
                        index, agent.name, err.message
                    ),
                    (None, Some(err)) => format!(
                        "Step {} ({}) could not be delegated: {}",
                        index, agent.name, err.message
                    ),
                    (None, None) => format!("Step {} ({}) failed", index, agent.name),
                }
            });
            if status != StepStatus::Succeeded && abort_reason.is_none() {
                warn!(
                    correlation_id = %ctx.correlation_id(),
                    step = index,
                    status = ?status,
                    "Step did not fully succeed; continuing with independent steps"
                );
            }

            ctx.record(DelegationStep {
                index,
                target_agent: agent.name.clone(),
                request: task,
                load_bearing,
                status,
                report,
                error: err,
                skip_reason: None,
                timestamp: chrono::Utc::now(),
            });

            if let Some(reason) = abort_reason {
                self.skip_all(ctx, rest, &format!("aborted after step {} failed", index));
                return Err(StageFailure {
                    stage: Stage::Delegation,
                    reason,
                });
            }

            advance(ctx, WorkflowState::Planning, Stage::Planning)?;
        }

        advance(ctx, WorkflowState::Aggregating, Stage::Aggregation)
    }

    /// Capability guard: the target must exist and list every required tool
    fn guard(&self, step: &PlannedStep) -> std::result::Result<ResolvedAgent, String> {
        let agent = self
            .directory
            .resolve(&step.target_agent)
            .map_err(|e| e.public_message())?;
        let missing = agent.missing_tools(&step.required_tools);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|t| t.as_str()).collect();
            return Err(format!(
                "Agent '{}' is not permitted to call {}",
                agent.name,
                names.join(", ")
            ));
        }
        Ok(agent)
    }

    fn skip_all(&self, ctx: &mut WorkflowContext, steps: &[PlannedStep], reason: &str) {
        for step in steps {
            let index = ctx.next_index();
            let request = DelegatedTask::new(ctx.correlation_id(), step.intent.clone(), step.hints.clone());
            ctx.record(DelegationStep {
                index,
                target_agent: step.target_agent.clone(),
                request,
                load_bearing: step
                    .load_bearing
                    .unwrap_or(self.config.load_bearing_by_default),
                status: StepStatus::Skipped,
                report: None,
                error: None,
                skip_reason: Some(reason.to_string()),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn fail(&self, ctx: &mut WorkflowContext, failure: StageFailure) -> WorkflowResponse {
        if let Err(e) = ctx.transition(WorkflowState::Failed) {
            error!(correlation_id = %ctx.correlation_id(), error = %e, "Could not mark workflow failed");
        }
        error!(
            correlation_id = %ctx.correlation_id(),
            stage = failure.stage.as_str(),
            reason = %failure.reason,
            "Workflow failed"
        );
        failed_response(ctx, failure)
    }
}

fn advance(ctx: &mut WorkflowContext, next: WorkflowState, stage: Stage) -> StageResult<()> {
    ctx.transition(next).map_err(|e| internal_failure(stage, &e))
}

fn internal_failure(stage: Stage, err: &crate::Error) -> StageFailure {
    error!(error = %err, "Workflow state machine violated");
    StageFailure {
        stage,
        reason: "internal error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{
        AgentOutcome, CUSTOMER_INFO_AGENT, CapabilityCard, SUPPORT_AGENT, SpecialistReport,
        TaskAction, TaskHints,
    };
    use crate::tool::ToolName;
    use crate::workflow::aggregate::WorkflowStatus;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedPlanner(Vec<PlannedStep>);

    #[async_trait]
    impl PlanningPolicy for ScriptedPlanner {
        async fn plan(&self, context: &WorkflowContext) -> Result<Vec<PlannedStep>> {
            Ok(self.0.iter().skip(context.steps().len()).cloned().collect())
        }
    }

    struct FailingPlanner;

    #[async_trait]
    impl PlanningPolicy for FailingPlanner {
        async fn plan(&self, _context: &WorkflowContext) -> Result<Vec<PlannedStep>> {
            Err(Error::Validation("Could not understand the request".into()))
        }
    }

    struct EndlessPlanner;

    #[async_trait]
    impl PlanningPolicy for EndlessPlanner {
        async fn plan(&self, _context: &WorkflowContext) -> Result<Vec<PlannedStep>> {
            Ok(vec![lookup_step()])
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        outcomes: HashMap<String, AgentOutcome>,
        delay: Duration,
        cancel_on_call: Option<CancellationToken>,
        unreachable: bool,
        calls: Mutex<Vec<(String, TaskAction)>>,
    }

    impl FakeTransport {
        fn with_outcome(mut self, agent: &str, outcome: AgentOutcome) -> Self {
            self.outcomes.insert(agent.to_string(), outcome);
            self
        }

        fn calls(&self) -> Vec<(String, TaskAction)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentTransport for FakeTransport {
        async fn delegate(&self, agent: &ResolvedAgent, task: DelegatedTask) -> Result<SpecialistReport> {
            self.calls
                .lock()
                .unwrap()
                .push((agent.name.clone(), task.hints.action));
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.unreachable {
                return Err(Error::Unavailable(format!("{} is unreachable", agent.address)));
            }
            let outcome = self
                .outcomes
                .get(&agent.name)
                .copied()
                .unwrap_or(AgentOutcome::Success);
            Ok(SpecialistReport {
                task_id: task.task_id,
                agent: agent.name.clone(),
                outcome,
                tool_calls_made: vec![],
                result_payload: serde_json::json!({"action": task.hints.action}),
                failed_step: None,
                summary: format!("{} {}", agent.name, outcome),
            })
        }
    }

    fn lookup_step() -> PlannedStep {
        PlannedStep::new(
            CUSTOMER_INFO_AGENT,
            "show customer 1",
            TaskHints::new(TaskAction::Lookup).customer(1),
        )
        .requires(&[ToolName::FetchCustomerData])
    }

    fn history_step() -> PlannedStep {
        PlannedStep::new(
            CUSTOMER_INFO_AGENT,
            "ticket history",
            TaskHints::new(TaskAction::History).customer(1),
        )
        .requires(&[ToolName::FetchCustomerData, ToolName::RetrieveCustomerHistory])
    }

    fn ticket_step() -> PlannedStep {
        PlannedStep::new(
            SUPPORT_AGENT,
            "refund",
            TaskHints::new(TaskAction::RaiseIssue).customer(1),
        )
        .requires(&[ToolName::RegisterSupportIssue])
    }

    fn directory() -> Arc<CapabilityDirectory> {
        Arc::new(CapabilityDirectory::new([
            CapabilityCard::customer_info("http://127.0.0.1:9300"),
            CapabilityCard::support("http://127.0.0.1:9301"),
        ]))
    }

    fn orchestrator(planner: impl PlanningPolicy + 'static, transport: Arc<FakeTransport>) -> Orchestrator {
        Orchestrator::new(
            directory(),
            Arc::new(planner),
            transport,
            DelegationConfig {
                timeout_secs: 1,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_steps_run_in_plan_order() {
        let transport = Arc::new(FakeTransport::default());
        let response = orchestrator(
            ScriptedPlanner(vec![ticket_step(), history_step()]),
            transport.clone(),
        )
        .handle("refund then history")
        .await;

        assert_eq!(response.status, WorkflowStatus::Completed);
        assert_eq!(response.outcome, AgentOutcome::Success);
        assert_eq!(
            transport.calls(),
            vec![
                (SUPPORT_AGENT.to_string(), TaskAction::RaiseIssue),
                (CUSTOMER_INFO_AGENT.to_string(), TaskAction::History),
            ]
        );
        assert_eq!(response.steps.len(), 2);
        assert_eq!(response.results().count(), 2);
    }

    #[tokio::test]
    async fn test_capability_guard_rejects_before_delegation() {
        let mut step = ticket_step();
        step.target_agent = CUSTOMER_INFO_AGENT.to_string();
        step.load_bearing = Some(false);

        let transport = Arc::new(FakeTransport::default());
        let response = orchestrator(ScriptedPlanner(vec![step, lookup_step()]), transport.clone())
            .handle("x")
            .await;

        assert_eq!(response.status, WorkflowStatus::Completed);
        assert_eq!(response.outcome, AgentOutcome::Partial);
        assert_eq!(response.steps[0].status, StepStatus::Skipped);
        assert!(response.steps[0].summary.contains("register_support_issue"));
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(transport.calls()[0].1, TaskAction::Lookup);
    }

    #[tokio::test]
    async fn test_unknown_load_bearing_agent_fails_delegation() {
        let mut step = lookup_step();
        step.target_agent = "billing".to_string();

        let transport = Arc::new(FakeTransport::default());
        let response = orchestrator(ScriptedPlanner(vec![step, history_step()]), transport.clone())
            .handle("x")
            .await;

        assert_eq!(response.status, WorkflowStatus::Failed);
        let failure = response.failure.unwrap();
        assert_eq!(failure.stage, Stage::Delegation);
        assert!(failure.reason.contains("billing"));
        assert!(response.steps.iter().all(|s| s.status == StepStatus::Skipped));
        assert_eq!(response.steps.len(), 2);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_bearing_partial_aborts() {
        let transport = Arc::new(
            FakeTransport::default().with_outcome(SUPPORT_AGENT, AgentOutcome::Partial),
        );
        let response = orchestrator(
            ScriptedPlanner(vec![ticket_step(), history_step()]),
            transport.clone(),
        )
        .handle("x")
        .await;

        assert_eq!(response.status, WorkflowStatus::Failed);
        assert_eq!(response.steps[0].status, StepStatus::Partial);
        assert_eq!(response.steps[1].status, StepStatus::Skipped);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_skippable_failure_continues() {
        let mut first = ticket_step();
        first.load_bearing = Some(false);
        let transport = Arc::new(
            FakeTransport::default().with_outcome(SUPPORT_AGENT, AgentOutcome::Failure),
        );
        let response = orchestrator(ScriptedPlanner(vec![first, lookup_step()]), transport.clone())
            .handle("x")
            .await;

        assert_eq!(response.status, WorkflowStatus::Completed);
        assert_eq!(response.outcome, AgentOutcome::Partial);
        assert_eq!(response.steps[0].status, StepStatus::Failed);
        assert_eq!(response.steps[1].status, StepStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_nothing_succeeded_fails_aggregation() {
        let mut only = ticket_step();
        only.load_bearing = Some(false);
        let transport = Arc::new(
            FakeTransport::default().with_outcome(SUPPORT_AGENT, AgentOutcome::Failure),
        );
        let response = orchestrator(ScriptedPlanner(vec![only]), transport)
            .handle("x")
            .await;

        assert_eq!(response.status, WorkflowStatus::Failed);
        assert_eq!(response.failure.unwrap().stage, Stage::Aggregation);
    }

    #[tokio::test]
    async fn test_delegation_timeout_is_step_failure() {
        let transport = Arc::new(FakeTransport {
            delay: Duration::from_secs(3),
            ..Default::default()
        });
        let response = orchestrator(ScriptedPlanner(vec![lookup_step()]), transport)
            .handle("x")
            .await;

        assert_eq!(response.status, WorkflowStatus::Failed);
        let step = &response.steps[0];
        assert_eq!(step.status, StepStatus::Failed);
        let err = step.error.as_ref().unwrap();
        assert_eq!(err.kind, crate::ErrorKind::Transient);
        assert!(err.message.ends_with("the outcome is unknown"));
        assert!(step.summary.contains("the outcome is unknown"));
        let reason = response.failure.unwrap().reason;
        assert!(reason.contains("did not answer in time"), "{}", reason);
        assert!(!reason.contains("could not be delegated"));
    }

    #[tokio::test]
    async fn test_unreachable_agent_was_not_delegated() {
        let transport = Arc::new(FakeTransport {
            unreachable: true,
            ..Default::default()
        });
        let response = orchestrator(ScriptedPlanner(vec![ticket_step()]), transport)
            .handle("x")
            .await;

        assert_eq!(response.status, WorkflowStatus::Failed);
        let err = response.steps[0].error.as_ref().unwrap();
        assert!(!err.message.contains("outcome is unknown"));
        let reason = response.failure.unwrap().reason;
        assert!(reason.contains("could not be delegated"), "{}", reason);
    }

    #[tokio::test]
    async fn test_cancellation_stops_further_steps() {
        let token = CancellationToken::new();
        let transport = Arc::new(FakeTransport {
            cancel_on_call: Some(token.clone()),
            ..Default::default()
        });
        let response = orchestrator(
            ScriptedPlanner(vec![lookup_step(), history_step(), ticket_step()]),
            transport.clone(),
        )
        .run("x", token)
        .await;

        assert_eq!(transport.calls().len(), 1);
        assert_eq!(response.status, WorkflowStatus::Failed);
        assert_eq!(response.steps[0].status, StepStatus::Succeeded);
        assert_eq!(response.steps[1].status, StepStatus::Skipped);
        assert_eq!(response.steps[2].status, StepStatus::Skipped);
        let failure = response.failure.unwrap();
        assert_eq!(failure.stage, Stage::Delegation);
        assert_eq!(failure.reason, "cancelled");
    }

    #[tokio::test]
    async fn test_planning_error() {
        let transport = Arc::new(FakeTransport::default());
        let response = orchestrator(FailingPlanner, transport).handle("???").await;
        let failure = response.failure.unwrap();
        assert_eq!(failure.stage, Stage::Planning);
        assert!(failure.reason.contains("Could not understand"));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let transport = Arc::new(FakeTransport::default());
        let orchestrator = Orchestrator::new(
            directory(),
            Arc::new(EndlessPlanner),
            transport.clone(),
            DelegationConfig {
                max_rounds: 3,
                ..Default::default()
            },
        );
        let response = orchestrator.handle("x").await;
        assert_eq!(transport.calls().len(), 3);
        assert_eq!(response.failure.unwrap().stage, Stage::Planning);
    }
}
