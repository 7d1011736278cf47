pub mod auth;
pub mod certification;
pub mod dashboard;
pub mod export;
pub mod links;
pub mod people;
pub mod profiles;
pub mod realtime;
pub mod relations;
pub mod search;
pub mod stats;
pub mod storage;
pub mod tree;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;

/// Decode backend rows into typed records. Rows that do not decode are
/// logged and skipped so one bad shared record cannot hide the others.
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(%id, "Skipping malformed row: {}", e);
                    None
                }
            }
        })
        .collect()
}

pub(crate) fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T> {
    Ok(serde_json::from_value(row)?)
}
