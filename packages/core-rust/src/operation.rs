//! Untyped blockchain operations and the filters routes match them against.
//!
//! Operations arrive as arbitrary JSON objects from the indexer. The only
//! field the pipeline requires is a string `type`; `contractAddress` and
//! `method` are consulted by filters when present.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON key holding the operation type.
pub const TYPE_FIELD: &str = "type";
/// JSON key holding the contract address.
pub const CONTRACT_FIELD: &str = "contractAddress";
/// JSON key holding the invoked method name.
pub const METHOD_FIELD: &str = "method";

/// A single operation extracted from a chain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(pub Value);

impl Operation {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Operation type, if present and a string.
    #[must_use]
    pub fn op_type(&self) -> Option<&str> {
        self.str_field(TYPE_FIELD)
    }

    #[must_use]
    pub fn contract_address(&self) -> Option<&str> {
        self.str_field(CONTRACT_FIELD)
    }

    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.str_field(METHOD_FIELD)
    }

    /// Looks up an arbitrary string property.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Operation {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Optional predicate attributes attached to a route.
///
/// Every field left as `None` matches any operation. Set fields are
/// compared for exact string equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFilter {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub op_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl OperationFilter {
    /// Filter matching every operation.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Filter on operation type only.
    #[must_use]
    pub fn by_type(op_type: impl Into<String>) -> Self {
        Self {
            op_type: Some(op_type.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_contract(mut self, contract_address: impl Into<String>) -> Self {
        self.contract_address = Some(contract_address.into());
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Returns `true` when every set attribute equals the operation's field.
    #[must_use]
    pub fn matches(&self, op: &Operation) -> bool {
        field_matches(self.op_type.as_deref(), op.op_type())
            && field_matches(self.contract_address.as_deref(), op.contract_address())
            && field_matches(self.method.as_deref(), op.method())
    }
}

fn field_matches(expected: Option<&str>, actual: Option<&str>) -> bool {
    match expected {
        None => true,
        Some(expected) => actual == Some(expected),
    }
}
