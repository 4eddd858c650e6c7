//! cs-tools: Tool Gateway for the customer support mesh
//!
//! The only component that touches the record store. Every call is parsed
//! into a typed [`cs_core::ToolCall`] first, so unknown tools and invalid
//! arguments never reach the store.

pub mod customers;
pub mod gateway;
pub mod tickets;

pub use gateway::ToolGateway;
