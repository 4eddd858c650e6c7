//! Support ticket tools

use cs_core::records::{AccountId, NewTicket, Priority, RecordStore};
use cs_core::{Result, ToolOutput};

/// `register_support_issue`: always opens a new ticket
pub fn register_support_issue(
    store: &RecordStore,
    customer_id: AccountId,
    query_description: &str,
    urgency_level: Priority,
) -> Result<ToolOutput> {
    let ticket = store.create_ticket(&NewTicket::open(customer_id, query_description, urgency_level))?;
    tracing::info!(
        ticket_id = ticket.ticket_id,
        customer_id,
        priority = urgency_level.as_str(),
        "Support issue registered"
    );
    Ok(ToolOutput::Ticket(ticket))
}

/// `retrieve_customer_history`: oldest ticket first
pub fn retrieve_customer_history(store: &RecordStore, customer_id: AccountId) -> Result<ToolOutput> {
    Ok(ToolOutput::Tickets(store.tickets_for_account(customer_id)?))
}
