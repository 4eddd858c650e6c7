//! Typed tool protocol
//!
//! The gateway exposes a closed set of tools. Wire invocations carry a raw
//! name and an argument map; [`ToolCall::parse`] turns them into a typed
//! call or a validation error before anything touches the record store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};

use crate::records::{
    AccountId, AccountStatus, CustomerAccount, CustomerUpdate, Priority, SupportTicket,
};
use crate::{Error, Result};

/// Default number of accounts returned by a search
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Largest accepted search limit
pub const MAX_RESULT_LIMIT: usize = 100;

/// The enumerable tool set of the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
    #[serde(rename = "fetch_customer_data", alias = "get_customer")]
    FetchCustomerData,
    #[serde(rename = "search_customer_accounts", alias = "list_customers")]
    SearchCustomerAccounts,
    #[serde(rename = "modify_customer_record", alias = "update_customer")]
    ModifyCustomerRecord,
    #[serde(rename = "register_support_issue", alias = "create_ticket")]
    RegisterSupportIssue,
    #[serde(rename = "retrieve_customer_history", alias = "get_customer_history")]
    RetrieveCustomerHistory,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        Self::FetchCustomerData,
        Self::SearchCustomerAccounts,
        Self::ModifyCustomerRecord,
        Self::RegisterSupportIssue,
        Self::RetrieveCustomerHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchCustomerData => "fetch_customer_data",
            Self::SearchCustomerAccounts => "search_customer_accounts",
            Self::ModifyCustomerRecord => "modify_customer_record",
            Self::RegisterSupportIssue => "register_support_issue",
            Self::RetrieveCustomerHistory => "retrieve_customer_history",
        }
    }

    fn legacy_name(&self) -> &'static str {
        match self {
            Self::FetchCustomerData => "get_customer",
            Self::SearchCustomerAccounts => "list_customers",
            Self::ModifyCustomerRecord => "update_customer",
            Self::RegisterSupportIssue => "create_ticket",
            Self::RetrieveCustomerHistory => "get_customer_history",
        }
    }

    /// Writes are not idempotent and must not be blindly retried
    pub fn is_write(&self) -> bool {
        matches!(self, Self::ModifyCustomerRecord | Self::RegisterSupportIssue)
    }

    /// Current key for an argument key of the legacy backend
    fn current_argument_key(&self, legacy: &str) -> Option<&'static str> {
        match (self, legacy) {
            (Self::SearchCustomerAccounts, "status") => Some("account_status"),
            (Self::SearchCustomerAccounts, "limit") => Some("result_limit"),
            (Self::ModifyCustomerRecord, "data") => Some("update_payload"),
            (Self::RegisterSupportIssue, "issue") => Some("query_description"),
            (Self::RegisterSupportIssue, "priority") => Some("urgency_level"),
            _ => None,
        }
    }

    /// Argument keys accepted by this tool
    pub fn argument_keys(&self) -> &'static [&'static str] {
        match self {
            Self::FetchCustomerData | Self::RetrieveCustomerHistory => &["customer_id"],
            Self::SearchCustomerAccounts => &["account_status", "result_limit"],
            Self::ModifyCustomerRecord => &["customer_id", "update_payload"],
            Self::RegisterSupportIssue => &["customer_id", "query_description", "urgency_level"],
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = Error;

    /// Accepts the current names and the legacy backend names
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s || tool.legacy_name() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown tool '{}'", s)))
    }
}

/// Wire form of a tool call: `{"tool": ..., "arguments": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,

    #[serde(default, alias = "params")]
    pub arguments: JsonValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// A validated tool call
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    FetchCustomerData {
        customer_id: AccountId,
    },
    SearchCustomerAccounts {
        account_status: Option<AccountStatus>,
        result_limit: usize,
    },
    ModifyCustomerRecord {
        customer_id: AccountId,
        update: CustomerUpdate,
    },
    RegisterSupportIssue {
        customer_id: AccountId,
        query_description: String,
        urgency_level: Priority,
    },
    RetrieveCustomerHistory {
        customer_id: AccountId,
    },
}

impl ToolCall {
    pub fn name(&self) -> ToolName {
        match self {
            Self::FetchCustomerData { .. } => ToolName::FetchCustomerData,
            Self::SearchCustomerAccounts { .. } => ToolName::SearchCustomerAccounts,
            Self::ModifyCustomerRecord { .. } => ToolName::ModifyCustomerRecord,
            Self::RegisterSupportIssue { .. } => ToolName::RegisterSupportIssue,
            Self::RetrieveCustomerHistory { .. } => ToolName::RetrieveCustomerHistory,
        }
    }

    pub fn customer_id(&self) -> Option<AccountId> {
        match self {
            Self::FetchCustomerData { customer_id }
            | Self::ModifyCustomerRecord { customer_id, .. }
            | Self::RegisterSupportIssue { customer_id, .. }
            | Self::RetrieveCustomerHistory { customer_id } => Some(*customer_id),
            Self::SearchCustomerAccounts { .. } => None,
        }
    }

    /// Validate a wire invocation
    pub fn parse(invocation: &ToolInvocation) -> Result<Self> {
        let tool: ToolName = invocation.tool.parse()?;
        let mut args = match &invocation.arguments {
            JsonValue::Object(map) => map.clone(),
            JsonValue::Null => Map::new(),
            _ => {
                return Err(Error::Validation(format!(
                    "Arguments for '{}' must be an object",
                    tool
                )));
            }
        };
        // Legacy names arrive with the legacy backend's argument keys
        if invocation.tool == tool.legacy_name() {
            args = args
                .into_iter()
                .map(|(key, value)| match tool.current_argument_key(&key) {
                    Some(current) => (current.to_string(), value),
                    None => (key, value),
                })
                .collect();
        }
        let args = &args;

        if let Some(unknown) = args.keys().find(|k| !tool.argument_keys().contains(&k.as_str())) {
            return Err(Error::Validation(format!(
                "Unknown argument '{}' for tool '{}'",
                unknown, tool
            )));
        }

        match tool {
            ToolName::FetchCustomerData => Ok(Self::FetchCustomerData {
                customer_id: customer_id_arg(args)?,
            }),
            ToolName::RetrieveCustomerHistory => Ok(Self::RetrieveCustomerHistory {
                customer_id: customer_id_arg(args)?,
            }),
            ToolName::SearchCustomerAccounts => {
                let account_status = match optional_str(args, "account_status")? {
                    Some(s) => Some(s.parse::<AccountStatus>()?),
                    None => None,
                };
                let result_limit = match args.get("result_limit") {
                    None | Some(JsonValue::Null) => DEFAULT_RESULT_LIMIT,
                    Some(value) => {
                        let limit = value.as_u64().ok_or_else(|| {
                            Error::Validation("result_limit must be a positive integer".to_string())
                        })?;
                        usize::try_from(limit).unwrap_or(usize::MAX)
                    }
                };
                if !(1..=MAX_RESULT_LIMIT).contains(&result_limit) {
                    return Err(Error::Validation(format!(
                        "result_limit must be between 1 and {}",
                        MAX_RESULT_LIMIT
                    )));
                }
                Ok(Self::SearchCustomerAccounts {
                    account_status,
                    result_limit,
                })
            }
            ToolName::ModifyCustomerRecord => Ok(Self::ModifyCustomerRecord {
                customer_id: customer_id_arg(args)?,
                update: update_payload_arg(args)?,
            }),
            ToolName::RegisterSupportIssue => {
                let customer_id = customer_id_arg(args)?;
                let query_description = optional_str(args, "query_description")?
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        Error::Validation("query_description must be a non-empty string".to_string())
                    })?
                    .to_string();
                let urgency_level = match optional_str(args, "urgency_level")? {
                    Some(s) => s.parse::<Priority>()?,
                    None => Priority::Medium,
                };
                Ok(Self::RegisterSupportIssue {
                    customer_id,
                    query_description,
                    urgency_level,
                })
            }
        }
    }

    /// Wire arguments for this call
    pub fn to_arguments(&self) -> JsonValue {
        match self {
            Self::FetchCustomerData { customer_id } | Self::RetrieveCustomerHistory { customer_id } => {
                json!({ "customer_id": customer_id })
            }
            Self::SearchCustomerAccounts {
                account_status,
                result_limit,
            } => {
                let mut args = json!({ "result_limit": result_limit });
                if let Some(status) = account_status {
                    args["account_status"] = json!(status.as_str());
                }
                args
            }
            Self::ModifyCustomerRecord { customer_id, update } => {
                json!({ "customer_id": customer_id, "update_payload": update })
            }
            Self::RegisterSupportIssue {
                customer_id,
                query_description,
                urgency_level,
            } => json!({
                "customer_id": customer_id,
                "query_description": query_description,
                "urgency_level": urgency_level.as_str(),
            }),
        }
    }

    pub fn to_invocation(&self, correlation_id: &str) -> ToolInvocation {
        ToolInvocation::new(self.name().as_str(), self.to_arguments())
            .with_correlation_id(correlation_id)
    }
}

fn optional_str<'a>(args: &'a Map<String, JsonValue>, key: &str) -> Result<Option<&'a str>> {
    match args.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(Error::Validation(format!("{} must be a string", key))),
    }
}

/// `customer_id` as a positive integer; numeric strings are accepted
fn customer_id_arg(args: &Map<String, JsonValue>) -> Result<AccountId> {
    let id = match args.get("customer_id") {
        None | Some(JsonValue::Null) => {
            return Err(Error::Validation("customer_id is required".to_string()));
        }
        Some(JsonValue::Number(n)) => n.as_i64(),
        Some(JsonValue::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    match id {
        Some(id) if id > 0 => Ok(id),
        _ => Err(Error::Validation(
            "customer_id must be a positive integer".to_string(),
        )),
    }
}

/// `update_payload` as an object, or a string holding a JSON object
fn update_payload_arg(args: &Map<String, JsonValue>) -> Result<CustomerUpdate> {
    let parsed;
    let payload = match args.get("update_payload") {
        Some(JsonValue::Object(map)) => map,
        Some(JsonValue::String(raw)) => {
            parsed = serde_json::from_str::<JsonValue>(raw).map_err(|e| {
                Error::Validation(format!("update_payload is not valid JSON: {}", e))
            })?;
            parsed.as_object().ok_or_else(|| {
                Error::Validation("update_payload must be a JSON object".to_string())
            })?
        }
        None | Some(JsonValue::Null) => {
            return Err(Error::Validation("update_payload is required".to_string()));
        }
        Some(_) => {
            return Err(Error::Validation(
                "update_payload must be a JSON object".to_string(),
            ));
        }
    };

    if payload.is_empty() {
        return Err(Error::Validation(
            "No valid fields provided for update".to_string(),
        ));
    }

    let mut update = CustomerUpdate::default();
    for (field, value) in payload {
        let value = value.as_str().ok_or_else(|| {
            Error::Validation(format!("Value for '{}' must be a string", field))
        })?;
        match field.as_str() {
            "full_name" => {
                if value.trim().is_empty() {
                    return Err(Error::Validation("full_name must not be empty".to_string()));
                }
                update.full_name = Some(value.to_string());
            }
            "contact_email" => update.contact_email = Some(value.to_string()),
            "contact_phone" => update.contact_phone = Some(value.to_string()),
            "account_status" => update.account_status = Some(value.parse()?),
            other => {
                return Err(Error::Validation(format!(
                    "Field '{}' cannot be updated; allowed fields: {}",
                    other,
                    CustomerUpdate::MUTABLE_FIELDS.join(", ")
                )));
            }
        }
    }
    Ok(update)
}

/// Typed result of a tool call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Account(CustomerAccount),
    Accounts(Vec<CustomerAccount>),
    Ticket(SupportTicket),
    Tickets(Vec<SupportTicket>),
}

impl ToolOutput {
    /// Decode a wire `result` using the result type of `tool`
    pub fn decode(tool: ToolName, value: JsonValue) -> Result<Self> {
        Ok(match tool {
            ToolName::FetchCustomerData | ToolName::ModifyCustomerRecord => {
                Self::Account(serde_json::from_value(value)?)
            }
            ToolName::SearchCustomerAccounts => Self::Accounts(serde_json::from_value(value)?),
            ToolName::RegisterSupportIssue => Self::Ticket(serde_json::from_value(value)?),
            ToolName::RetrieveCustomerHistory => Self::Tickets(serde_json::from_value(value)?),
        })
    }

    pub fn to_value(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn as_account(&self) -> Option<&CustomerAccount> {
        match self {
            Self::Account(account) => Some(account),
            _ => None,
        }
    }

    pub fn as_accounts(&self) -> Option<&[CustomerAccount]> {
        match self {
            Self::Accounts(accounts) => Some(accounts),
            _ => None,
        }
    }

    pub fn as_ticket(&self) -> Option<&SupportTicket> {
        match self {
            Self::Ticket(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn as_tickets(&self) -> Option<&[SupportTicket]> {
        match self {
            Self::Tickets(tickets) => Some(tickets),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn parse(tool: &str, arguments: JsonValue) -> Result<ToolCall> {
        ToolCall::parse(&ToolInvocation::new(tool, arguments))
    }

    #[test]
    fn test_tool_name_aliases() {
        assert_eq!("get_customer".parse::<ToolName>().unwrap(), ToolName::FetchCustomerData);
        assert_eq!(
            "retrieve_customer_history".parse::<ToolName>().unwrap(),
            ToolName::RetrieveCustomerHistory
        );
        let err = "drop_tables".parse::<ToolName>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let name: ToolName = serde_json::from_str("\"create_ticket\"").unwrap();
        assert_eq!(name, ToolName::RegisterSupportIssue);
        assert_eq!(
            serde_json::to_string(&name).unwrap(),
            "\"register_support_issue\""
        );
    }

    #[test]
    fn test_legacy_argument_keys() {
        assert_eq!(
            parse("list_customers", json!({"limit": 5, "status": "active"})).unwrap(),
            ToolCall::SearchCustomerAccounts {
                account_status: Some(AccountStatus::Active),
                result_limit: 5,
            }
        );
        assert_eq!(
            parse(
                "create_ticket",
                json!({"customer_id": 1, "issue": "refund", "priority": "HIGH"})
            )
            .unwrap(),
            ToolCall::RegisterSupportIssue {
                customer_id: 1,
                query_description: "refund".to_string(),
                urgency_level: Priority::High,
            }
        );
        let call = parse(
            "update_customer",
            json!({"customer_id": 5, "data": {"contact_email": "a@b.co"}}),
        )
        .unwrap();
        assert_eq!(call.name(), ToolName::ModifyCustomerRecord);

        // Legacy keys stay invalid under the current names
        let err = parse("register_support_issue", json!({"customer_id": 1, "issue": "refund"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_is_write() {
        let writes: Vec<_> = ToolName::ALL.into_iter().filter(|t| t.is_write()).collect();
        assert_eq!(
            writes,
            vec![ToolName::ModifyCustomerRecord, ToolName::RegisterSupportIssue]
        );
    }

    #[test]
    fn test_params_alias() {
        let invocation: ToolInvocation = serde_json::from_value(json!({
            "tool": "get_customer",
            "params": {"customer_id": 1}
        }))
        .unwrap();
        assert_eq!(
            ToolCall::parse(&invocation).unwrap(),
            ToolCall::FetchCustomerData { customer_id: 1 }
        );
    }

    #[test]
    fn test_customer_id_validation() {
        assert!(parse("fetch_customer_data", json!({})).is_err());
        assert!(parse("fetch_customer_data", json!({"customer_id": 0})).is_err());
        assert!(parse("fetch_customer_data", json!({"customer_id": "abc"})).is_err());
        assert_eq!(
            parse("fetch_customer_data", json!({"customer_id": "12345"})).unwrap(),
            ToolCall::FetchCustomerData { customer_id: 12345 }
        );
    }

    #[test]
    fn test_unknown_argument_rejected() {
        let err = parse("fetch_customer_data", json!({"customer_id": 1, "verbose": true}))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_search_defaults_and_limits() {
        assert_eq!(
            parse("search_customer_accounts", JsonValue::Null).unwrap(),
            ToolCall::SearchCustomerAccounts {
                account_status: None,
                result_limit: DEFAULT_RESULT_LIMIT
            }
        );
        assert!(parse("search_customer_accounts", json!({"result_limit": 0})).is_err());
        assert!(parse("search_customer_accounts", json!({"result_limit": 101})).is_err());
        assert!(parse("search_customer_accounts", json!({"result_limit": -3})).is_err());
        assert!(parse("search_customer_accounts", json!({"account_status": "frozen"})).is_err());
    }

    #[test]
    fn test_update_payload_forms() {
        let from_object = parse(
            "modify_customer_record",
            json!({"customer_id": 5, "update_payload": {"contact_email": "a@b.c"}}),
        )
        .unwrap();
        let from_string = parse(
            "update_customer",
            json!({"customer_id": 5, "update_payload": "{\"contact_email\": \"a@b.c\"}"}),
        )
        .unwrap();
        assert_eq!(from_object, from_string);
    }

    #[test]
    fn test_update_payload_rejections() {
        for payload in [
            json!({}),
            json!({"identifier": "7"}),
            json!({"full_name": ""}),
            json!({"account_status": "frozen"}),
            json!({"contact_phone": 5551234}),
            json!("not json"),
            json!("[1, 2]"),
        ] {
            let err = parse(
                "modify_customer_record",
                json!({"customer_id": 1, "update_payload": payload}),
            )
            .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "payload {}", payload);
        }
    }

    #[test]
    fn test_register_issue_urgency() {
        let call = parse(
            "register_support_issue",
            json!({"customer_id": 1, "query_description": "Refund", "urgency_level": "HIGH"}),
        )
        .unwrap();
        assert!(matches!(
            call,
            ToolCall::RegisterSupportIssue { urgency_level: Priority::High, .. }
        ));

        let call = parse(
            "register_support_issue",
            json!({"customer_id": 1, "query_description": "Question"}),
        )
        .unwrap();
        assert!(matches!(
            call,
            ToolCall::RegisterSupportIssue { urgency_level: Priority::Medium, .. }
        ));

        assert!(parse(
            "register_support_issue",
            json!({"customer_id": 1, "query_description": "x", "urgency_level": "critical"})
        )
        .is_err());
        assert!(parse(
            "register_support_issue",
            json!({"customer_id": 1, "query_description": "   "})
        )
        .is_err());
    }

    #[test]
    fn test_to_invocation_reparses() {
        let call = ToolCall::ModifyCustomerRecord {
            customer_id: 2,
            update: CustomerUpdate {
                contact_phone: Some("555-0100".into()),
                ..Default::default()
            },
        };
        let invocation = call.to_invocation("corr-1");
        assert_eq!(invocation.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(ToolCall::parse(&invocation).unwrap(), call);
    }

    #[test]
    fn test_decode_empty_history() {
        let output = ToolOutput::decode(ToolName::RetrieveCustomerHistory, json!([])).unwrap();
        assert_eq!(output.as_tickets().map(|t| t.len()), Some(0));
        assert!(output.as_accounts().is_none());
    }
}
