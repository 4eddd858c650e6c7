//! cs-a2a: Agent-to-agent and gateway clients
//!
//! HTTP clients for the Tool Gateway surface and the agent surface, the
//! [`cs_core::AgentTransport`] over HTTP, and capability-card discovery
//! that builds the directory once at startup.

pub mod adapter;
pub mod client;
pub mod config;
pub mod registry;

pub use adapter::HttpAgentTransport;
pub use client::{AgentClient, GatewayClient};
pub use config::{PeerConfig, PeersConfig};
pub use registry::discover_directory;
