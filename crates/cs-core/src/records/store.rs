//! Record persistence using SQLite

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::{debug, info};

use crate::records::{
    AccountId, AccountStatus, CustomerAccount, CustomerUpdate, NewAccount, NewTicket, Priority,
    SupportTicket, TicketStatus,
};
use crate::{Error, Result};

const ACCOUNT_COLUMNS: &str = "identifier, full_name, contact_email, contact_phone, \
     account_status, creation_timestamp, last_modified_timestamp";

const TICKET_COLUMNS: &str =
    "ticket_id, account_id, description, status, priority_level, submission_timestamp";

/// SQLite-based store for customer accounts and support tickets.
///
/// The single connection is serialized behind a mutex, so every operation
/// observes only committed state.
pub struct RecordStore {
    conn: Mutex<Connection>,
}

impl RecordStore {
    /// Open (or create) a store at the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("record store lock poisoned".to_string()))
    }

    /// Create tables if they do not exist yet
    pub fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS customer_accounts (
                identifier INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                contact_email TEXT NOT NULL,
                contact_phone TEXT NOT NULL,
                account_status TEXT NOT NULL,
                creation_timestamp TEXT NOT NULL,
                last_modified_timestamp TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS support_tickets (
                ticket_id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL REFERENCES customer_accounts(identifier),
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                priority_level TEXT NOT NULL,
                submission_timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_support_tickets_account_id
                ON support_tickets(account_id);",
        )?;
        Ok(())
    }

    /// Drop all records and load the deterministic demo data set
    pub fn reset_and_seed(&self) -> Result<()> {
        {
            let conn = self.lock()?;
            conn.execute_batch(
                "DROP TABLE IF EXISTS support_tickets;
                 DROP TABLE IF EXISTS customer_accounts;",
            )?;
        }
        self.initialize_schema()?;

        let accounts = [
            (1, "Alice Premium", "alice@example.com", "111-111-1111", AccountStatus::Active),
            (2, "Bob Standard", "bob@example.com", "222-222-2222", AccountStatus::Active),
            (3, "Charlie Disabled", "charlie@example.com", "333-333-3333", AccountStatus::Disabled),
            (4, "Diana Premium", "diana@example.com", "444-444-4444", AccountStatus::Active),
            (5, "Eve Standard", "eve@example.com", "555-555-5555", AccountStatus::Active),
            (12345, "Priya Patel (Premium)", "priya@example.com", "555-0999", AccountStatus::Active),
        ];
        for (id, name, email, phone, status) in accounts {
            self.create_account(&NewAccount::new(name, email, phone).with_id(id).with_status(status))?;
        }

        let tickets = [
            (1, "Billing duplicate charge", TicketStatus::Open, Priority::High),
            (1, "Unable to login", TicketStatus::InProgress, Priority::Medium),
            (2, "Request upgrade", TicketStatus::Open, Priority::Low),
            (4, "Critical outage", TicketStatus::Open, Priority::High),
            (5, "Password reset", TicketStatus::Open, Priority::Low),
            (12345, "Account upgrade assistance", TicketStatus::Open, Priority::Medium),
            (12345, "High priority refund review", TicketStatus::Open, Priority::High),
        ];
        for (account_id, description, status, priority) in tickets {
            self.create_ticket(&NewTicket::open(account_id, description, priority).with_status(status))?;
        }

        info!(
            accounts = accounts.len(),
            tickets = tickets.len(),
            "Record store reset and seeded"
        );
        Ok(())
    }

    /// Insert a new account
    pub fn create_account(&self, account: &NewAccount) -> Result<CustomerAccount> {
        let conn = self.lock()?;
        let now = format_timestamp(Utc::now());
        conn.execute(
            "INSERT INTO customer_accounts (identifier, full_name, contact_email, contact_phone,
                 account_status, creation_timestamp, last_modified_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                account.identifier,
                account.full_name,
                account.contact_email,
                account.contact_phone,
                account.account_status.as_str(),
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        select_account(&conn, id)?
            .ok_or_else(|| Error::Consistency(format!("Account {} vanished after insert", id)))
    }

    /// Load an account by identifier
    pub fn get_account(&self, id: AccountId) -> Result<Option<CustomerAccount>> {
        let conn = self.lock()?;
        select_account(&conn, id)
    }

    /// List accounts in creation order, optionally filtered by status
    pub fn list_accounts(
        &self,
        status: Option<AccountStatus>,
        limit: usize,
    ) -> Result<Vec<CustomerAccount>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {} FROM customer_accounts
             WHERE (?1 IS NULL OR account_status = ?1)
             ORDER BY creation_timestamp ASC, identifier ASC
             LIMIT ?2",
            ACCOUNT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![status.map(|s| s.as_str()), limit], account_from_row)?;

        let mut accounts = Vec::new();
        for account in rows {
            accounts.push(account?);
        }
        Ok(accounts)
    }

    /// Apply a partial update and return the updated record.
    ///
    /// Only the named columns are written, so concurrent updates to
    /// different fields of one account never overwrite each other.
    pub fn update_account(&self, id: AccountId, update: &CustomerUpdate) -> Result<CustomerAccount> {
        if update.is_empty() {
            return Err(Error::Validation("No valid fields provided for update".to_string()));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous: Option<String> = tx
            .query_row(
                "SELECT last_modified_timestamp FROM customer_accounts WHERE identifier = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let previous = match previous {
            Some(ts) => parse_timestamp(&ts)
                .map_err(|e| Error::Other(format!("corrupt timestamp on account {}: {}", id, e)))?,
            None => return Err(Error::NotFound(format!("Account with ID {} not found", id))),
        };

        // Never move last_modified backwards, even if the clock does
        let modified = Utc::now().max(previous);

        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(name) = &update.full_name {
            assignments.push("full_name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(email) = &update.contact_email {
            assignments.push("contact_email = ?");
            values.push(Box::new(email.clone()));
        }
        if let Some(phone) = &update.contact_phone {
            assignments.push("contact_phone = ?");
            values.push(Box::new(phone.clone()));
        }
        if let Some(status) = update.account_status {
            assignments.push("account_status = ?");
            values.push(Box::new(status.as_str()));
        }
        assignments.push("last_modified_timestamp = ?");
        values.push(Box::new(format_timestamp(modified)));
        values.push(Box::new(id));

        let sql = format!(
            "UPDATE customer_accounts SET {} WHERE identifier = ?",
            assignments.join(", ")
        );
        tx.execute(&sql, rusqlite::params_from_iter(values.iter()))?;

        let account = select_account(&tx, id)?
            .ok_or_else(|| Error::Consistency(format!("Account {} vanished during update", id)))?;
        tx.commit()?;

        debug!(account_id = id, fields = ?update.field_names(), "Account updated");
        Ok(account)
    }

    /// Create a ticket for an existing account
    pub fn create_ticket(&self, ticket: &NewTicket) -> Result<SupportTicket> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !account_exists(&tx, ticket.account_id)? {
            return Err(Error::NotFound(format!(
                "Account with ID {} not found",
                ticket.account_id
            )));
        }

        tx.execute(
            "INSERT INTO support_tickets (account_id, description, status, priority_level,
                 submission_timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ticket.account_id,
                ticket.description,
                ticket.status.as_str(),
                ticket.priority_level.as_str(),
                format_timestamp(Utc::now()),
            ],
        )?;
        let ticket_id = tx.last_insert_rowid();

        let sql = format!("SELECT {} FROM support_tickets WHERE ticket_id = ?1", TICKET_COLUMNS);
        let created = tx
            .query_row(&sql, params![ticket_id], ticket_from_row)
            .optional()?
            .ok_or_else(|| Error::Consistency("Failed to log new ticket".to_string()))?;
        tx.commit()?;

        debug!(ticket_id, account_id = ticket.account_id, "Ticket created");
        Ok(created)
    }

    /// All tickets of an account, oldest first
    pub fn tickets_for_account(&self, account_id: AccountId) -> Result<Vec<SupportTicket>> {
        let conn = self.lock()?;
        if !account_exists(&conn, account_id)? {
            return Err(Error::NotFound(format!("Account with ID {} not found", account_id)));
        }

        let sql = format!(
            "SELECT {} FROM support_tickets WHERE account_id = ?1
             ORDER BY submission_timestamp ASC, ticket_id ASC",
            TICKET_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![account_id], ticket_from_row)?;

        let mut tickets = Vec::new();
        for ticket in rows {
            tickets.push(ticket?);
        }
        Ok(tickets)
    }

    /// Total number of tickets in the store
    pub fn count_tickets(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM support_tickets", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Fixed-width RFC 3339 so lexical order in SQL equals chronological order
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

fn account_exists(conn: &Connection, id: AccountId) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM customer_accounts WHERE identifier = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn select_account(conn: &Connection, id: AccountId) -> Result<Option<CustomerAccount>> {
    let sql = format!("SELECT {} FROM customer_accounts WHERE identifier = ?1", ACCOUNT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], account_from_row).optional()?)
}

fn text_column<T, E>(row: &Row<'_>, idx: usize, parse: impl FnOnce(&str) -> std::result::Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<CustomerAccount> {
    Ok(CustomerAccount {
        identifier: row.get(0)?,
        full_name: row.get(1)?,
        contact_email: row.get(2)?,
        contact_phone: row.get(3)?,
        account_status: text_column(row, 4, |s| s.parse::<AccountStatus>())?,
        creation_timestamp: text_column(row, 5, parse_timestamp)?,
        last_modified_timestamp: text_column(row, 6, parse_timestamp)?,
    })
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<SupportTicket> {
    Ok(SupportTicket {
        ticket_id: row.get(0)?,
        account_id: row.get(1)?,
        description: row.get(2)?,
        status: text_column(row, 3, |s| s.parse::<TicketStatus>())?,
        priority_level: text_column(row, 4, |s| s.parse::<Priority>())?,
        submission_timestamp: text_column(row, 5, parse_timestamp)?,
    })
}
