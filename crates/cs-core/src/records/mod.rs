//! Customer and ticket records plus their SQLite store

mod store;
mod types;

pub use store::RecordStore;
pub use types::{
    AccountId, AccountStatus, CustomerAccount, CustomerUpdate, NewAccount, NewTicket, Priority,
    SupportTicket, TicketId, TicketStatus,
};
