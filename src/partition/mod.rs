//! Groups one kind's decoded records for one date into archive partitions.

pub mod quality;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::catalog::MarketCatalog;
use crate::error::Error;
use crate::events::{EventKind, EventRecord};

pub use quality::{GapReport, TimeCoverage};

/// Entity namespace of a partition key.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum_macros::Display,
    strum_macros::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    User,
    Market,
    Authority,
}

/// One entity a record is archived under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionTarget {
    pub scope: Scope,
    pub identifier: String,
}

impl PartitionTarget {
    pub fn new(scope: Scope, identifier: impl AsRef<str>) -> Self {
        Self {
            scope,
            identifier: identifier.as_ref().to_string(),
        }
    }
}

/// `program/{programId}/{scope}/{identifier}/{collection}/{year}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub program_id: String,
    pub target: PartitionTarget,
    pub collection: &'static str,
    pub year: i32,
}

impl PartitionKey {
    pub fn new(program_id: &str, target: PartitionTarget, kind: EventKind, date: NaiveDate) -> Self {
        Self {
            program_id: program_id.to_string(),
            target,
            collection: kind.collection(),
            year: date.year(),
        }
    }

    /// Object key of the blob for `date`.
    pub fn object_key(&self, date: NaiveDate) -> String {
        format!("{self}/{}", date.format("%Y%m%d"))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "program/{}/{}/{}/{}/{}",
            self.program_id, self.target.scope, self.target.identifier, self.collection, self.year
        )
    }
}

/// One component of a natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Null,
    Str(String),
    Int(i128),
    /// IEEE bits, with `-0.0` folded into `0.0`.
    Float(u64),
}

impl KeyPart {
    pub fn str(value: &str) -> Self {
        Self::Str(value.to_string())
    }

    pub fn opt_str(value: Option<&str>) -> Self {
        value.map_or(Self::Null, Self::str)
    }

    pub fn int(value: impl Into<i128>) -> Self {
        Self::Int(value.into())
    }

    pub fn opt_int<T: Into<i128>>(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::int)
    }

    pub fn float(value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        Self::Float(value.to_bits())
    }
}

/// The fields that define a record's logical identity within its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey(Vec<KeyPart>);

impl NaturalKey {
    pub fn new(parts: impl IntoIterator<Item = KeyPart>) -> Self {
        Self(parts.into_iter().collect())
    }
}

/// Drops duplicates by natural key, keeping the last occurrence of each key
/// at the position of that last occurrence.
pub fn dedup_keep_last(records: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut kept: Vec<EventRecord> = records
        .into_iter()
        .rev()
        .filter(|r| seen.insert(r.natural_key()))
        .collect();
    kept.reverse();
    kept
}

/// The records of one blob.
#[derive(Debug, Clone)]
pub struct Partition {
    pub key: PartitionKey,
    pub records: Vec<EventRecord>,
}

/// Result of partitioning one kind for one date.
#[derive(Debug, Default)]
pub struct PartitionSet {
    /// Non-empty partitions, ordered by key.
    pub partitions: Vec<Partition>,
    pub gaps: Vec<GapReport>,
}

pub struct Partitioner<'a> {
    catalog: &'a MarketCatalog,
    program_id: &'a str,
}

impl<'a> Partitioner<'a> {
    pub fn new(catalog: &'a MarketCatalog, program_id: &'a str) -> Self {
        Self {
            catalog,
            program_id,
        }
    }

    /// Fans records out to their targets, dedups every partition and runs the
    /// trade market checks. Unresolvable markets are fatal.
    pub fn partition(
        &self,
        kind: EventKind,
        date: NaiveDate,
        records: Vec<EventRecord>,
    ) -> Result<PartitionSet, Error> {
        let mut grouped: BTreeMap<PartitionTarget, Vec<EventRecord>> = BTreeMap::new();
        for record in records {
            debug_assert_eq!(record.kind(), kind);
            for target in record.partition_targets(self.catalog)? {
                grouped.entry(target).or_default().push(record.clone());
            }
        }

        let mut set = PartitionSet::default();
        for (target, records) in grouped {
            let key = PartitionKey::new(self.program_id, target, kind, date);
            let mut records = dedup_keep_last(records);

            if kind == EventKind::OrderActionRecord && key.target.scope == Scope::Market {
                records = fills_by_record_id(records);
                if records.is_empty() {
                    tracing::info!(partition = %key, %date, "No fills");
                    continue;
                }
                if let Some(gap) = GapReport::check(&key, trade_fill_ids(&records)) {
                    set.gaps.push(gap);
                }
            }

            if records.is_empty() {
                tracing::debug!(partition = %key, "empty partition skipped");
                continue;
            }
            set.partitions.push(Partition { key, records });
        }
        Ok(set)
    }
}

/// Keeps real fills (non-zero base amount, known record id) sorted by
/// `fillRecordId`.
fn fills_by_record_id(records: Vec<EventRecord>) -> Vec<EventRecord> {
    let mut fills: Vec<EventRecord> = records
        .into_iter()
        .filter(|r| match r {
            EventRecord::Trade(t) => t.base_asset_amount_filled != 0.0 && t.fill_record_id.is_some(),
            _ => true,
        })
        .collect();
    fills.sort_by_key(|r| match r {
        EventRecord::Trade(t) => t.fill_record_id,
        _ => None,
    });
    fills
}

fn trade_fill_ids(records: &[EventRecord]) -> impl Iterator<Item = u64> + '_ {
    records.iter().filter_map(|r| match r {
        EventRecord::Trade(t) => t.fill_record_id,
        _ => None,
    })
}
