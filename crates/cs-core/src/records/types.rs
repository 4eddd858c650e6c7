//! Customer account and support ticket records

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identifier of a customer account
pub type AccountId = i64;

/// Identifier of a support ticket
pub type TicketId = i64;

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Disabled,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "disabled" => Ok(Self::Disabled),
            other => Err(Error::Validation(format!(
                "account_status must be 'active' or 'disabled', got '{}'",
                other
            ))),
        }
    }
}

/// Ticket lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "closed" => Ok(Self::Closed),
            other => Err(Error::Validation(format!("unknown ticket status '{}'", other))),
        }
    }
}

/// Ticket priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::Validation(format!(
                "urgency_level must be 'low', 'medium', or 'high', got '{}'",
                other
            ))),
        }
    }
}

/// Customer account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAccount {
    pub identifier: AccountId,
    pub full_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub account_status: AccountStatus,
    pub creation_timestamp: DateTime<Utc>,
    pub last_modified_timestamp: DateTime<Utc>,
}

/// Fields needed to create an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    /// Explicit identifier (seeding); `None` lets the store assign one
    pub identifier: Option<AccountId>,
    pub full_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub account_status: AccountStatus,
}

impl NewAccount {
    pub fn new(
        full_name: impl Into<String>,
        contact_email: impl Into<String>,
        contact_phone: impl Into<String>,
    ) -> Self {
        Self {
            identifier: None,
            full_name: full_name.into(),
            contact_email: contact_email.into(),
            contact_phone: contact_phone.into(),
            account_status: AccountStatus::Active,
        }
    }

    pub fn with_id(mut self, identifier: AccountId) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.account_status = status;
        self
    }
}

/// Partial update of the mutable account fields.
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_status: Option<AccountStatus>,
}

impl CustomerUpdate {
    /// Field names a caller may change
    pub const MUTABLE_FIELDS: [&'static str; 4] =
        ["full_name", "contact_email", "contact_phone", "account_status"];

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.contact_email.is_none()
            && self.contact_phone.is_none()
            && self.account_status.is_none()
    }

    /// Names of the fields this update touches
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.full_name.is_some() {
            names.push("full_name");
        }
        if self.contact_email.is_some() {
            names.push("contact_email");
        }
        if self.contact_phone.is_some() {
            names.push("contact_phone");
        }
        if self.account_status.is_some() {
            names.push("account_status");
        }
        names
    }
}

/// Support ticket record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub ticket_id: TicketId,
    pub account_id: AccountId,
    pub description: String,
    pub status: TicketStatus,
    pub priority_level: Priority,
    pub submission_timestamp: DateTime<Utc>,
}

/// Fields needed to create a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    pub account_id: AccountId,
    pub description: String,
    pub status: TicketStatus,
    pub priority_level: Priority,
}

impl NewTicket {
    /// A new ticket always starts open
    pub fn open(account_id: AccountId, description: impl Into<String>, priority: Priority) -> Self {
        Self {
            account_id,
            description: description.into(),
            status: TicketStatus::Open,
            priority_level: priority,
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = status;
        self
    }
}
