//! Shape checks for transactions arriving over the wire.
//!
//! The ledger itself never validates transactions; everything here runs at the
//! boundary before a [`Transaction`] is constructed.

use serde_json::Value;

use super::types::Transaction;

pub const REQUIRED_FIELDS: [&str; 3] = ["sender", "recipient", "amount"];

/// Why a transaction request was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestRejection {
    /// The body is not a JSON object.
    NotAnObject,
    /// At least one required field is absent.
    MissingValues(Vec<&'static str>),
    /// All fields are present but one has the wrong shape.
    InvalidValue { field: &'static str, reason: String },
}

/// Turns an untyped JSON request body into a [`Transaction`].
pub fn parse_transaction_request(body: &Value) -> Result<Transaction, RequestRejection> {
    let object = body.as_object().ok_or(RequestRejection::NotAnObject)?;

    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !object.contains_key(*field))
        .collect();
    if !missing.is_empty() {
        return Err(RequestRejection::MissingValues(missing));
    }

    let sender = identifier(object.get("sender"), "sender")?;
    let recipient = identifier(object.get("recipient"), "recipient")?;
    let amount = object
        .get("amount")
        .and_then(Value::as_u64)
        .ok_or_else(|| RequestRejection::InvalidValue {
            field: "amount",
            reason: "must be a non-negative integer".to_string(),
        })?;

    Ok(Transaction::new(sender, recipient, amount))
}

fn identifier(value: Option<&Value>, field: &'static str) -> Result<String, RequestRejection> {
    match value {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(RequestRejection::InvalidValue {
            field,
            reason: "must be a string".to_string(),
        }),
    }
}
