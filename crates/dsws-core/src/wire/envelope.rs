use serde::{Deserialize, Serialize};

use crate::wire::date::WireDateTime;

/// Auxiliary `{Key, Value}` option pair carried on requests and responses.
///
/// Values are strings in almost every exchange, but a handful of operations
/// send flags (e.g. a skip-retrieval option), so the value is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Property {
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Property {
    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: serde_json::Value::String(value.into()),
        }
    }

    pub fn flag(key: impl Into<String>, value: bool) -> Self {
        Self {
            key: key.into(),
            value: serde_json::Value::Bool(value),
        }
    }

    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// Case-insensitive lookup of a property value. Unrecognized keys are the
/// norm on responses and are simply ignored by callers.
pub fn find_property<'a>(properties: &'a [Property], key: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|property| property.key.eq_ignore_ascii_case(key))
        .and_then(Property::value_str)
}

/// Body of the token-issuance call. The only request that carries no
/// `TokenValue` field.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenRequest {
    pub user_name: String,
    pub password: String,
    pub properties: Vec<Property>,
}

/// Decoded token-issuance response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenResponse {
    pub token_value: String,
    pub token_expiry: WireDateTime,
    #[serde(default)]
    pub properties: Option<Vec<Property>>,
}

/// Structured rejection body returned only with HTTP 400/403.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FaultBody {
    pub code: String,
    #[serde(default)]
    pub sub_code: String,
    pub message: String,
}
