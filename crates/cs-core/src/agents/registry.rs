//! Capability directory
//!
//! Built once from the fetched or configured capability cards and shared by
//! reference afterwards; it has no mutating operations.

use std::collections::HashMap;

use tracing::info;

use super::card::CapabilityCard;
use crate::tool::ToolName;
use crate::{Error, Result};

/// Routing information for one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAgent {
    pub name: String,
    pub address: String,
    pub permitted_tools: Vec<ToolName>,
}

impl ResolvedAgent {
    pub fn permits(&self, tool: ToolName) -> bool {
        self.permitted_tools.contains(&tool)
    }

    /// Tools from `required` this agent may not call
    pub fn missing_tools(&self, required: &[ToolName]) -> Vec<ToolName> {
        required
            .iter()
            .copied()
            .filter(|tool| !self.permits(*tool))
            .collect()
    }
}

/// Immutable directory of capability cards keyed by agent name
#[derive(Debug, Clone, Default)]
pub struct CapabilityDirectory {
    cards: HashMap<String, CapabilityCard>,
}

impl CapabilityDirectory {
    /// Build the directory; a later card with the same name replaces an earlier one
    pub fn new(cards: impl IntoIterator<Item = CapabilityCard>) -> Self {
        let cards: HashMap<String, CapabilityCard> = cards
            .into_iter()
            .map(|card| (card.name.clone(), card))
            .collect();
        info!(agents = cards.len(), "Capability directory built");
        Self { cards }
    }

    /// Resolve an agent name to its address and permitted tools
    pub fn resolve(&self, agent_name: &str) -> Result<ResolvedAgent> {
        let card = self
            .cards
            .get(agent_name)
            .ok_or_else(|| Error::NotFound(format!("Unknown agent '{}'", agent_name)))?;
        Ok(ResolvedAgent {
            name: card.name.clone(),
            address: card.url.clone(),
            permitted_tools: card.permitted_tools.clone(),
        })
    }

    pub fn card(&self, agent_name: &str) -> Option<&CapabilityCard> {
        self.cards.get(agent_name)
    }

    /// Agent names in sorted order
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.cards.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
