//! Orchestrator workflow: planning, guarded delegation and aggregation

pub mod aggregate;
pub mod context;
pub mod orchestrator;
pub mod plan;

pub use aggregate::{
    Stage, StageFailure, StepSummary, UserRequest, WorkflowResponse, WorkflowStatus, aggregate,
};
pub use context::{DelegationStep, StepStatus, WorkflowContext, WorkflowState};
pub use orchestrator::Orchestrator;
pub use plan::{PlannedStep, PlanningPolicy, RulePlanner};
