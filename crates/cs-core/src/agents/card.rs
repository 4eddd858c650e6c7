//! Capability cards
//!
//! A card is the static self-description an agent serves at
//! `/.well-known/agent-card.json`: identity, address and the tools it may
//! call. Cards are built once at startup and never change afterwards.

use serde::{Deserialize, Serialize};

use crate::tool::ToolName;

/// Name of the customer information specialist
pub const CUSTOMER_INFO_AGENT: &str = "customer_info";

/// Name of the support specialist
pub const SUPPORT_AGENT: &str = "support";

/// Name of the orchestrator
pub const ORCHESTRATOR_AGENT: &str = "orchestrator";

/// Path every agent serves its card on
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

/// Schema/version tag carried by every card
pub const CARD_VERSION: &str = "1.0.0";

/// Advertised skill of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl AgentSkill {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            tags: vec![],
            examples: vec![],
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_examples(mut self, examples: &[&str]) -> Self {
        self.examples = examples.iter().map(|e| e.to_string()).collect();
        self
    }
}

/// Static descriptor of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityCard {
    /// Routing name, unique within a mesh
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Base URL the agent serves its task endpoint on
    pub url: String,
    pub version: String,
    #[serde(default)]
    pub permitted_tools: Vec<ToolName>,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

impl CapabilityCard {
    pub fn permits(&self, tool: ToolName) -> bool {
        self.permitted_tools.contains(&tool)
    }

    /// Card of the customer information specialist
    pub fn customer_info(url: impl Into<String>) -> Self {
        Self {
            name: CUSTOMER_INFO_AGENT.to_string(),
            display_name: "Customer Information System".to_string(),
            description: "Specialized system for secure access and management of customer \
                          records and data via a service layer."
                .to_string(),
            url: url.into(),
            version: CARD_VERSION.to_string(),
            permitted_tools: vec![
                ToolName::FetchCustomerData,
                ToolName::SearchCustomerAccounts,
                ToolName::ModifyCustomerRecord,
                ToolName::RetrieveCustomerHistory,
            ],
            skills: vec![
                AgentSkill::new(
                    "get_details",
                    "Retrieve Customer Details",
                    "Fetches account details using the unique customer identifier.",
                )
                .with_tags(&["customer", "data", "lookup"])
                .with_examples(&["Find the record for ID 1", "Retrieve customer 5 information"]),
                AgentSkill::new(
                    "update_record",
                    "Modify Customer Record",
                    "Amends customer fields such as email or phone.",
                )
                .with_tags(&["customer", "update", "modify"])
                .with_examples(&[
                    "Update email for account 1",
                    "Change phone number for customer 5",
                ]),
                AgentSkill::new(
                    "complex_queries",
                    "Multi-Step Data Operations",
                    "Execute complex queries requiring multiple database operations and filtering.",
                )
                .with_tags(&["customer", "search", "filter", "analysis"])
                .with_examples(&[
                    "Find all active accounts with open tickets",
                    "List customers with high priority issues",
                ]),
            ],
        }
    }

    /// Card of the support specialist
    pub fn support(url: impl Into<String>) -> Self {
        Self {
            name: SUPPORT_AGENT.to_string(),
            display_name: "Support Specialist".to_string(),
            description: "Dedicated agent for handling service inquiries, issue logging, \
                          and resolution."
                .to_string(),
            url: url.into(),
            version: CARD_VERSION.to_string(),
            permitted_tools: vec![
                ToolName::RegisterSupportIssue,
                ToolName::FetchCustomerData,
                ToolName::RetrieveCustomerHistory,
            ],
            skills: vec![
                AgentSkill::new(
                    "log_issue",
                    "Register New Support Ticket",
                    "Logs a new ticket with customer ID, issue description, and priority level.",
                )
                .with_tags(&["support", "ticket", "create"])
                .with_examples(&[
                    "Log a ticket for customer 1 about account upgrade",
                    "Create high priority billing issue",
                ]),
                AgentSkill::new(
                    "resolve_query",
                    "Address Customer Inquiry",
                    "Processes standard support questions and delivers a resolution or advice.",
                )
                .with_tags(&["support", "help", "assistance"])
                .with_examples(&[
                    "I need help with my account",
                    "How do I upgrade my subscription?",
                ]),
            ],
        }
    }

    /// Card of the orchestrator; it calls no tools itself
    pub fn orchestrator(url: impl Into<String>) -> Self {
        Self {
            name: ORCHESTRATOR_AGENT.to_string(),
            display_name: "Orchestration System".to_string(),
            description: "The primary entry point that interprets user intent and delegates \
                          the task to the most suitable specialist agent(s)."
                .to_string(),
            url: url.into(),
            version: CARD_VERSION.to_string(),
            permitted_tools: vec![],
            skills: vec![
                AgentSkill::new(
                    "route_intent",
                    "Delegate Customer Request",
                    "Analyzes the user's message and routes it to the correct downstream agent.",
                )
                .with_tags(&["routing", "orchestration", "coordination"])
                .with_examples(&[
                    "Find account details for ID 5",
                    "I need help setting up my new service, I am ID 1",
                ]),
                AgentSkill::new(
                    "manage_workflow",
                    "Coordinate Multi-Agent Workflow",
                    "Manages sequential interaction between specialist agents for complex requests.",
                )
                .with_tags(&["coordination", "multi-agent"])
                .with_examples(&[
                    "Please update my contact info and check my open issues",
                    "I have a billing problem and want to cancel my account",
                ]),
            ],
        }
    }
}
