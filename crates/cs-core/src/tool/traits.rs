//! Tool invocation trait

use async_trait::async_trait;

use super::protocol::{ToolInvocation, ToolOutput};
use crate::Result;

/// Anything that can execute a gateway tool call.
///
/// Implemented by the in-process gateway and by the HTTP gateway client, so
/// specialist agents do not depend on a transport.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Execute a wire invocation; unknown tools and bad arguments fail with
    /// a validation error before the record store is touched
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput>;
}
