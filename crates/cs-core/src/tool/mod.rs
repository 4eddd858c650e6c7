//! Tool protocol shared by the gateway and its callers

pub mod definition;
pub mod protocol;
pub mod traits;

pub use definition::{SchemaBuilder, ToolDefinition, all_definitions};
pub use protocol::{
    DEFAULT_RESULT_LIMIT, MAX_RESULT_LIMIT, ToolCall, ToolInvocation, ToolName, ToolOutput,
};
pub use traits::ToolInvoker;
