//! Tool definitions
//!
//! Argument schemas of the gateway tools, as listed by `GET /tools`.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use super::protocol::{DEFAULT_RESULT_LIMIT, MAX_RESULT_LIMIT, ToolName};
use crate::records::CustomerUpdate;

/// Name, description and JSON schema of one tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: JsonValue,
}

/// Helper functions for creating tool schemas
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Create a closed object schema
    ///
    /// # Arguments
    /// * `properties` - A list of tuples (name, property schema, description, required)
    pub fn object_schema(properties: Vec<(&str, JsonValue, &str, bool)>) -> JsonValue {
        let props: serde_json::Map<String, JsonValue> = properties
            .iter()
            .map(|(name, schema, desc, _)| {
                let mut schema = schema.clone();
                schema["description"] = json!(desc);
                (name.to_string(), schema)
            })
            .collect();

        let required: Vec<&str> = properties
            .iter()
            .filter(|(_, _, _, required)| *required)
            .map(|(name, _, _, _)| *name)
            .collect();

        json!({
            "type": "object",
            "properties": props,
            "required": required,
            "additionalProperties": false
        })
    }

    /// Create a string enum schema
    pub fn string_enum(enum_values: &[&str]) -> JsonValue {
        json!({
            "type": "string",
            "enum": enum_values
        })
    }

    /// Create a bounded integer schema
    pub fn integer_range(minimum: i64, maximum: Option<i64>) -> JsonValue {
        let mut schema = json!({"type": "integer", "minimum": minimum});
        if let Some(maximum) = maximum {
            schema["maximum"] = json!(maximum);
        }
        schema
    }
}

impl ToolName {
    pub fn description(&self) -> &'static str {
        match self {
            Self::FetchCustomerData => "Retrieve a single customer account by its identifier.",
            Self::SearchCustomerAccounts => {
                "List customer accounts in creation order, optionally filtered by status."
            }
            Self::ModifyCustomerRecord => {
                "Apply a partial update to a customer's name, email, phone or status."
            }
            Self::RegisterSupportIssue => {
                "Open a new support ticket for an existing customer with a priority level."
            }
            Self::RetrieveCustomerHistory => {
                "List all support tickets of a customer, oldest first."
            }
        }
    }

    pub fn input_schema(&self) -> JsonValue {
        let customer_id = (
            "customer_id",
            SchemaBuilder::integer_range(1, None),
            "Unique customer identifier",
            true,
        );
        match self {
            Self::FetchCustomerData | Self::RetrieveCustomerHistory => {
                SchemaBuilder::object_schema(vec![customer_id])
            }
            Self::SearchCustomerAccounts => SchemaBuilder::object_schema(vec![
                (
                    "account_status",
                    SchemaBuilder::string_enum(&["active", "disabled"]),
                    "Only return accounts with this status; all accounts when omitted",
                    false,
                ),
                (
                    "result_limit",
                    {
                        let mut schema =
                            SchemaBuilder::integer_range(1, Some(MAX_RESULT_LIMIT as i64));
                        schema["default"] = json!(DEFAULT_RESULT_LIMIT);
                        schema
                    },
                    "Maximum number of accounts to return",
                    false,
                ),
            ]),
            Self::ModifyCustomerRecord => {
                let fields: serde_json::Map<String, JsonValue> = CustomerUpdate::MUTABLE_FIELDS
                    .iter()
                    .map(|f| (f.to_string(), json!({"type": "string"})))
                    .collect();
                SchemaBuilder::object_schema(vec![
                    customer_id,
                    (
                        "update_payload",
                        json!({
                            "type": ["object", "string"],
                            "properties": fields,
                            "additionalProperties": false,
                            "minProperties": 1
                        }),
                        "Fields to change, as an object or a JSON-encoded object string",
                        true,
                    ),
                ])
            }
            Self::RegisterSupportIssue => SchemaBuilder::object_schema(vec![
                customer_id,
                (
                    "query_description",
                    json!({"type": "string", "minLength": 1}),
                    "Description of the customer's issue",
                    true,
                ),
                (
                    "urgency_level",
                    SchemaBuilder::string_enum(&["low", "medium", "high"]),
                    "Ticket priority (case-insensitive, default medium)",
                    false,
                ),
            ]),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.as_str().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Definitions of the whole tool set
pub fn all_definitions() -> Vec<ToolDefinition> {
    ToolName::ALL.iter().map(ToolName::definition).collect()
}
