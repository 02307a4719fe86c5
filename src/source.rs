//! The indexer's date-partitioned event and transaction-log files.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::{Map, Value};

use crate::error::Error;
use crate::store::ObjectStore;
use crate::types::{RawEvent, TxLogRow};

/// Reads the source listing and the rows of individual files.
///
/// A file read fails only when the file itself cannot be fetched or
/// decoded. Rows that do not parse are returned in
/// [`FileRows::malformed`] next to the rows that did.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn list(&self, prefix: &str, start_after: Option<&str>) -> Result<Vec<String>, Error>;

    async fn read_events(&self, key: &str) -> Result<FileRows<RawEvent>, Error>;

    async fn read_txns(&self, key: &str) -> Result<FileRows<TxLogRow>, Error>;
}

/// The parsed rows of one file plus the rows that failed to parse.
#[derive(Debug, Clone)]
pub struct FileRows<T> {
    pub rows: Vec<T>,
    pub malformed: Vec<MalformedRow>,
}

impl<T> FileRows<T> {
    pub fn new(rows: Vec<T>) -> Self {
        Self {
            rows,
            malformed: Vec::new(),
        }
    }
}

/// A source row that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRow {
    pub key: String,
    /// Position in the file.
    pub index: usize,
    /// The row's `event_type` column, when it could be read.
    pub event_type: Option<String>,
    pub reason: String,
}

/// Parses each row on its own; failures are logged and set aside.
pub fn parse_rows<T>(
    key: &str,
    rows: &[Map<String, Value>],
    parse: impl Fn(&Map<String, Value>) -> Result<T, Error>,
) -> FileRows<T> {
    let mut out = FileRows::new(Vec::with_capacity(rows.len()));
    for (index, row) in rows.iter().enumerate() {
        match parse(row) {
            Ok(parsed) => out.rows.push(parsed),
            Err(e) => {
                let event_type = row
                    .get("event_type")
                    .and_then(Value::as_str)
                    .map(String::from);
                tracing::warn!(file = %key, index, event_type = ?event_type, error = %e, "malformed source row");
                out.malformed.push(MalformedRow {
                    key: key.to_string(),
                    index,
                    event_type,
                    reason: e.to_string(),
                });
            }
        }
    }
    out
}

/// Parquet files in an object store.
#[derive(Clone)]
pub struct ParquetEventSource {
    store: Arc<dyn ObjectStore>,
}

impl ParquetEventSource {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    async fn rows(&self, key: &str) -> Result<Vec<Map<String, Value>>, Error> {
        let bytes = self.store.get(key).await?;
        tokio::task::spawn_blocking(move || parquet_rows(bytes))
            .await
            .map_err(|e| Error::Parse {
                reason: format!("parquet decode task for {key} failed: {e}"),
            })?
    }
}

#[async_trait]
impl EventSource for ParquetEventSource {
    async fn list(&self, prefix: &str, start_after: Option<&str>) -> Result<Vec<String>, Error> {
        self.store
            .list(prefix, start_after)
            .await
            .map_err(|e| match e {
                Error::Listing { .. } => e,
                other => Error::Listing {
                    prefix: prefix.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    async fn read_events(&self, key: &str) -> Result<FileRows<RawEvent>, Error> {
        Ok(parse_rows(key, &self.rows(key).await?, RawEvent::from_row))
    }

    async fn read_txns(&self, key: &str) -> Result<FileRows<TxLogRow>, Error> {
        Ok(parse_rows(key, &self.rows(key).await?, TxLogRow::from_row))
    }
}

/// Every record of a parquet file as a column-name → JSON map.
pub fn parquet_rows(bytes: Bytes) -> Result<Vec<Map<String, Value>>, Error> {
    let reader = SerializedFileReader::new(bytes)?;
    let expected = usize::try_from(reader.metadata().file_metadata().num_rows()).unwrap_or(0);
    let mut rows = Vec::with_capacity(expected);
    for row in reader.get_row_iter(None)? {
        let row = row?;
        rows.push(
            row.get_column_iter()
                .map(|(name, field)| (name.clone(), field.to_json_value()))
                .collect(),
        );
    }
    Ok(rows)
}

/// Date of a listed key: the first path segment after `prefix` shaped like
/// `YYYY-MM-DD`, `YYYYMMDD` or `date=YYYY-MM-DD`.
pub fn key_date(prefix: &str, key: &str) -> Option<NaiveDate> {
    key.strip_prefix(prefix)?
        .split('/')
        .filter(|s| !s.is_empty())
        .find_map(|segment| {
            let segment = segment.strip_prefix("date=").unwrap_or(segment);
            NaiveDate::parse_from_str(segment, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(segment, "%Y%m%d"))
                .ok()
        })
}

/// Groups keys by their date, keeping only dates accepted by `keep`.
/// Keys within a date stay sorted.
pub fn group_by_date(
    prefix: &str,
    keys: impl IntoIterator<Item = String>,
    keep: impl Fn(NaiveDate) -> bool,
) -> BTreeMap<NaiveDate, Vec<String>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
    for key in keys {
        match key_date(prefix, &key) {
            Some(date) if keep(date) => grouped.entry(date).or_default().push(key),
            Some(_) => {}
            None => tracing::debug!(%key, "listed key has no date segment"),
        }
    }
    for keys in grouped.values_mut() {
        keys.sort();
    }
    grouped
}

/// The listing marker: `{prefix}/{start - lookback_days}`.
pub fn start_after(prefix: &str, start: NaiveDate, lookback_days: u32) -> String {
    let from = start
        .checked_sub_days(chrono::Days::new(u64::from(lookback_days)))
        .unwrap_or(start);
    format!("{}/{}", prefix.trim_end_matches('/'), from.format("%Y-%m-%d"))
}
