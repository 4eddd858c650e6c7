//! Agents of the mesh
//!
//! ```text
//!  Orchestrator ──(CapabilityDirectory)──▶ AgentTransport
//!                                              │
//!                           ┌──────────────────┴──────────────┐
//!                           ▼                                 ▼
//!                 SpecialistAgent (customer_info)   SpecialistAgent (support)
//!                   policy + permitted tools          policy + permitted tools
//!                           │                                 │
//!                           └──────────▶ ToolInvoker ◀────────┘
//! ```

pub mod card;
pub mod policy;
pub mod registry;
pub mod retry;
pub mod specialist;
pub mod transport;
pub mod types;

pub use card::{
    AGENT_CARD_PATH, AgentSkill, CARD_VERSION, CUSTOMER_INFO_AGENT, CapabilityCard,
    ORCHESTRATOR_AGENT, SUPPORT_AGENT,
};
pub use policy::{
    Conclusion, CustomerInfoPolicy, Observation, PlannedCall, SpecialistPolicy, SupportPolicy,
    classify_urgency,
};
pub use registry::{CapabilityDirectory, ResolvedAgent};
pub use retry::{RetryPolicy, with_deadline};
pub use specialist::SpecialistAgent;
pub use transport::{AgentTransport, InProcessTransport};
pub use types::{
    AgentOutcome, DelegatedTask, SpecialistReport, TaskAction, TaskHints, TaskId, ToolCallRecord,
};
