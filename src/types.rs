use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};

use crate::error::Error;

/// A decoded event row as produced by the upstream indexer's event table.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawEvent {
    /// Event discriminator name (e.g. `"OrderActionRecord"`).
    pub event_type: String,
    /// Transaction signature (base58).
    pub tx_id: String,
    /// Solana slot in which the transaction landed.
    pub block_slot: u64,
    /// Block time, when the indexer recorded one.
    #[serde(default)]
    pub block_time: Option<NaiveDateTime>,
    /// Indexer-parsed event arguments, camelCase keys.
    #[serde(default)]
    pub args: Value,
}

impl RawEvent {
    /// Builds a row from a column-name → value map (one parquet record).
    pub fn from_row(row: &Map<String, Value>) -> Result<Self, Error> {
        let event_type = required_str(row, "event_type")?;
        let tx_id = required_str(row, "tx_id")?;
        let block_slot = row
            .get("block_slot")
            .and_then(value_as_u64)
            .ok_or_else(|| Error::Parse {
                reason: format!("event row {tx_id} missing block_slot"),
            })?;
        let block_time = row.get("block_time").and_then(parse_block_time);
        let args = match row.get("args") {
            Some(Value::String(s)) => serde_json::from_str(s)?,
            Some(v) => v.clone(),
            None => Value::Null,
        };
        Ok(Self {
            event_type,
            tx_id,
            block_slot,
            block_time,
            args,
        })
    }

    /// Reads a top-level string argument, e.g. `action` or `userAuthority`.
    pub fn arg_str(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(Value::as_str)
    }
}

/// A transaction row from the log table: first signature plus raw log lines.
#[derive(Debug, Clone)]
pub struct TxLogRow {
    pub signature: String,
    pub log_messages: Vec<String>,
}

impl TxLogRow {
    pub fn from_row(row: &Map<String, Value>) -> Result<Self, Error> {
        let signature = match row.get("signatures") {
            Some(Value::Array(sigs)) => sigs.first().and_then(Value::as_str),
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
        .ok_or_else(|| Error::Parse {
            reason: "txn row has no signatures".into(),
        })?
        .to_string();

        let log_messages = match row.get("log_messages") {
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(|l| l.as_str().map(String::from))
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(Error::Parse {
                    reason: format!("log_messages for {signature} is not a list: {other}"),
                });
            }
        };

        Ok(Self {
            signature,
            log_messages,
        })
    }
}

/// Per-event provenance attached to every decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    pub tx_sig: String,
    pub slot: u64,
}

/// One event decoded from a transaction's program logs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramEvent {
    /// Event name from the program IDL (e.g. `"DepositRecord"`).
    pub name: String,
    /// Event fields with snake_case keys.
    pub data: Value,
}

fn required_str(row: &Map<String, Value>, column: &str) -> Result<String, Error> {
    row.get(column)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| Error::Parse {
            reason: format!("row missing string column {column}"),
        })
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parses the handful of shapes block times arrive in: unix seconds or
/// millis, RFC 3339, parquet's `%Y-%m-%d %H:%M:%S %:z` rendering, plain
/// `%Y-%m-%d %H:%M:%S`, and the indexer's short `%m/%d/%y %H:%M`.
pub fn parse_block_time(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(n) => {
            let raw = n.as_i64()?;
            let dt = if raw > 100_000_000_000 {
                DateTime::from_timestamp_millis(raw)?
            } else {
                DateTime::from_timestamp(raw, 0)?
            };
            Some(dt.naive_utc())
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.naive_utc());
            }
            if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f %:z") {
                return Some(dt.naive_utc());
            }
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%m/%d/%y %H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        }
        _ => None,
    }
}
