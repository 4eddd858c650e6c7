//! cs-core: Customer Support Mesh Core Library
//!
//! Customer and ticket records, the tool protocol spoken with the MCP
//! gateway, the specialist agents and the orchestrator workflow.

pub mod agents;
pub mod config;
pub mod error;
pub mod records;
pub mod tool;
pub mod workflow;

pub use agents::{
    AgentOutcome, AgentTransport, CapabilityCard, CapabilityDirectory, DelegatedTask,
    SpecialistAgent, SpecialistReport,
};
pub use config::{AgentsConfig, Config, DelegationConfig, GatewayConfig, StoreConfig};
pub use error::{Error, ErrorBody, ErrorDetail, ErrorKind, Result};
pub use records::{CustomerAccount, RecordStore, SupportTicket};
pub use tool::{ToolCall, ToolDefinition, ToolInvocation, ToolInvoker, ToolName, ToolOutput};
pub use workflow::{Orchestrator, RulePlanner, WorkflowResponse};
