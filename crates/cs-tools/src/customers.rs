//! Customer account tools

use cs_core::records::{AccountId, AccountStatus, CustomerUpdate, RecordStore};
use cs_core::{Error, Result, ToolOutput};

/// `fetch_customer_data`
pub fn fetch_customer_data(store: &RecordStore, customer_id: AccountId) -> Result<ToolOutput> {
    let account = store
        .get_account(customer_id)?
        .ok_or_else(|| Error::NotFound(format!("Customer with ID {} not found", customer_id)))?;
    Ok(ToolOutput::Account(account))
}

/// `search_customer_accounts`; an empty result is not an error
pub fn search_customer_accounts(
    store: &RecordStore,
    account_status: Option<AccountStatus>,
    result_limit: usize,
) -> Result<ToolOutput> {
    let accounts = store.list_accounts(account_status, result_limit)?;
    tracing::debug!(
        status = ?account_status,
        limit = result_limit,
        found = accounts.len(),
        "Searched customer accounts"
    );
    Ok(ToolOutput::Accounts(accounts))
}

/// `modify_customer_record`
pub fn modify_customer_record(
    store: &RecordStore,
    customer_id: AccountId,
    update: &CustomerUpdate,
) -> Result<ToolOutput> {
    let account = store.update_account(customer_id, update)?;
    tracing::info!(
        customer_id,
        fields = ?update.field_names(),
        "Customer record modified"
    );
    Ok(ToolOutput::Account(account))
}
