//! Tool Gateway
//!
//! Validates a wire invocation into a [`ToolCall`] and dispatches it onto the
//! record store. Store access is blocking, so each call runs on the blocking
//! thread pool.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use cs_core::records::RecordStore;
use cs_core::tool::all_definitions;
use cs_core::{Error, Result, ToolCall, ToolDefinition, ToolInvocation, ToolInvoker, ToolOutput};

use crate::{customers, tickets};

/// Gateway over a shared record store
#[derive(Clone)]
pub struct ToolGateway {
    store: Arc<RecordStore>,
}

impl ToolGateway {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Definitions of every tool, for `GET /tools`
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        all_definitions()
    }

    /// Execute an already validated call
    pub async fn execute(&self, call: ToolCall) -> Result<ToolOutput> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || dispatch(&store, &call))
            .await
            .map_err(|e| Error::Other(format!("Tool task failed: {}", e)))?
    }
}

fn dispatch(store: &RecordStore, call: &ToolCall) -> Result<ToolOutput> {
    match call {
        ToolCall::FetchCustomerData { customer_id } => {
            customers::fetch_customer_data(store, *customer_id)
        }
        ToolCall::SearchCustomerAccounts {
            account_status,
            result_limit,
        } => customers::search_customer_accounts(store, *account_status, *result_limit),
        ToolCall::ModifyCustomerRecord {
            customer_id,
            update,
        } => customers::modify_customer_record(store, *customer_id, update),
        ToolCall::RegisterSupportIssue {
            customer_id,
            query_description,
            urgency_level,
        } => tickets::register_support_issue(store, *customer_id, query_description, *urgency_level),
        ToolCall::RetrieveCustomerHistory { customer_id } => {
            tickets::retrieve_customer_history(store, *customer_id)
        }
    }
}

#[async_trait]
impl ToolInvoker for ToolGateway {
    async fn invoke(&self, invocation: ToolInvocation) -> Result<ToolOutput> {
        let correlation_id = invocation.correlation_id.as_deref().unwrap_or("-");
        let call = match ToolCall::parse(&invocation) {
            Ok(call) => call,
            Err(e) => {
                warn!(correlation_id, tool = %invocation.tool, error = %e, "Rejected tool call");
                return Err(e);
            }
        };

        debug!(correlation_id, tool = %call.name(), customer_id = ?call.customer_id(), "Executing tool");
        let result = self.execute(call).await;
        if let Err(e) = &result {
            debug!(correlation_id, tool = %invocation.tool, kind = %e.kind(), error = %e, "Tool call failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_core::records::{AccountStatus, Priority, TicketStatus};
    use cs_core::{ErrorKind, ToolName};
    use serde_json::json;

    fn gateway() -> ToolGateway {
        let store = RecordStore::in_memory().unwrap();
        store.reset_and_seed().unwrap();
        ToolGateway::new(Arc::new(store))
    }

    async fn call(gateway: &ToolGateway, tool: &str, arguments: serde_json::Value) -> Result<ToolOutput> {
        gateway.invoke(ToolInvocation::new(tool, arguments)).await
    }

    #[tokio::test]
    async fn test_fetch_customer() {
        let gateway = gateway();
        let output = call(&gateway, "fetch_customer_data", json!({"customer_id": 1})).await.unwrap();
        let account = output.as_account().unwrap();
        assert_eq!(account.full_name, "Alice Premium");
        assert_eq!(account.account_status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_validation_error() {
        let err = call(&gateway(), "drop_tables", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_legacy_tool_name() {
        let output = call(&gateway(), "get_customer", json!({"customer_id": 5})).await.unwrap();
        assert_eq!(output.as_account().unwrap().identifier, 5);
    }

    #[tokio::test]
    async fn test_search_respects_status_and_limit() {
        let gateway = gateway();
        for limit in [1usize, 2, 3, 10] {
            let output = call(
                &gateway,
                "search_customer_accounts",
                json!({"account_status": "active", "result_limit": limit}),
            )
            .await
            .unwrap();
            let accounts = output.as_accounts().unwrap();
            assert!(accounts.len() <= limit);
            assert!(accounts.iter().all(|a| a.account_status == AccountStatus::Active));
        }
    }

    #[tokio::test]
    async fn test_modify_is_visible_to_fetch() {
        let gateway = gateway();
        call(
            &gateway,
            "modify_customer_record",
            json!({"customer_id": 5, "update_payload": {"contact_email": "new@example.com"}}),
        )
        .await
        .unwrap();

        let output = call(&gateway, "fetch_customer_data", json!({"customer_id": 5})).await.unwrap();
        let account = output.as_account().unwrap();
        assert_eq!(account.contact_email, "new@example.com");
        assert_eq!(account.contact_phone, "555-555-5555");
    }

    #[tokio::test]
    async fn test_disallowed_field_never_reaches_store() {
        let gateway = gateway();
        let before = gateway.store().get_account(2).unwrap().unwrap();
        let err = call(
            &gateway,
            "modify_customer_record",
            json!({"customer_id": 2, "update_payload": {"identifier": "7", "contact_email": "x@y.z"}}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(gateway.store().get_account(2).unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_register_unknown_customer() {
        let gateway = gateway();
        let before = gateway.store().count_tickets().unwrap();
        let err = call(
            &gateway,
            "register_support_issue",
            json!({"customer_id": 777, "query_description": "refund", "urgency_level": "high"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(gateway.store().count_tickets().unwrap(), before);
    }

    #[tokio::test]
    async fn test_invalid_urgency_rejected() {
        let err = call(
            &gateway(),
            "register_support_issue",
            json!({"customer_id": 1, "query_description": "refund", "urgency_level": "extreme"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_registered_ticket_only_in_own_history() {
        let gateway = gateway();
        let output = call(
            &gateway,
            "register_support_issue",
            json!({"customer_id": 2, "query_description": "Charged twice", "urgency_level": "HIGH"}),
        )
        .await
        .unwrap();
        let ticket = output.as_ticket().unwrap().clone();
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority_level, Priority::High);

        let own = call(&gateway, "retrieve_customer_history", json!({"customer_id": 2})).await.unwrap();
        assert!(own.as_tickets().unwrap().iter().any(|t| t.ticket_id == ticket.ticket_id));

        for other in [1, 3, 4, 5, 12345] {
            let history = call(&gateway, "retrieve_customer_history", json!({"customer_id": other}))
                .await
                .unwrap();
            assert!(history.as_tickets().unwrap().iter().all(|t| t.ticket_id != ticket.ticket_id));
        }
    }

    #[tokio::test]
    async fn test_history_unknown_account() {
        let err = call(&gateway(), "retrieve_customer_history", json!({"customer_id": 31337}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_definitions_cover_all_tools() {
        let names: Vec<String> = gateway().definitions().into_iter().map(|d| d.name).collect();
        for tool in ToolName::ALL {
            assert!(names.iter().any(|n| n == tool.as_str()));
        }
    }
}
