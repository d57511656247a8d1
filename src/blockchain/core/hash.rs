//! Canonical block hashing.
//!
//! A block is rendered as JSON with object keys sorted at every level and no
//! whitespace, then digested with SHA-256. Key order is fixed explicitly
//! rather than relying on the map type `serde_json` happens to be built with.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::chain::Block;
use crate::transaction::Transaction;

pub type Sha256Hash = [u8; 32];

/// Hex digest of a block: 64 lowercase characters.
pub fn hash_block(block: &Block) -> String {
    hex::encode(hash_block_bytes(block))
}

pub fn hash_block_bytes(block: &Block) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(block).as_bytes());
    hasher.finalize().into()
}

/// The exact byte string that is hashed for `block`.
pub fn canonical_json(block: &Block) -> String {
    let mut out = String::new();
    write_canonical(&block_value(block), &mut out);
    out
}

/// Same shape as the serde representation, built field by field so there is
/// no serializer error to handle.
fn block_value(block: &Block) -> Value {
    let mut map = Map::new();
    map.insert("index".to_string(), Value::from(block.index));
    map.insert("timestamp".to_string(), Value::from(block.timestamp));
    map.insert(
        "transactions".to_string(),
        Value::Array(block.transactions.iter().map(transaction_value).collect()),
    );
    map.insert("proof".to_string(), Value::from(block.proof));
    map.insert(
        "previous_hash".to_string(),
        block.previous_hash.clone().map_or(Value::Null, Value::String),
    );
    Value::Object(map)
}

fn transaction_value(tx: &Transaction) -> Value {
    let mut map = Map::new();
    map.insert("sender".to_string(), Value::String(tx.sender.clone()));
    map.insert("recipient".to_string(), Value::String(tx.recipient.clone()));
    map.insert("amount".to_string(), Value::from(tx.amount));
    Value::Object(map)
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
