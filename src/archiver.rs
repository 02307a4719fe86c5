//! The run loop: list source files, then for each date fetch, join, decode,
//! partition, write and finally advance each kind's watermark.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::{StreamExt, stream};

use crate::config::{ArchiveConfig, Exclusions};
use crate::error::Error;
use crate::events::{EventDecoder, EventKind, EventRecord, is_fill_action};
use crate::fetch::FetchScheduler;
use crate::logs::{LogDecoder, LogIndex};
use crate::partition::{GapReport, Partitioner, TimeCoverage};
use crate::source::{self, EventSource, MalformedRow};
use crate::store::ObjectStore;
use crate::types::{EventMetadata, RawEvent};
use crate::watermark::WatermarkStore;
use crate::writer::archive_object;

/// Knobs of one run that do not come from the collaborators themselves.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    pub events_prefix: String,
    pub txns_prefix: String,
    pub listing_lookback_days: u32,
    pub fetch: FetchScheduler,
    pub kind_concurrency: usize,
    pub exclusions: Exclusions,
    /// Kinds to process; the rest are left untouched.
    pub kinds: Vec<EventKind>,
    /// Decode and partition, but write nothing and advance nothing.
    pub dry_run: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::from_config(&ArchiveConfig::default())
    }
}

impl ArchiveOptions {
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            events_prefix: config.source.events_prefix.clone(),
            txns_prefix: config.source.txns_prefix.clone(),
            listing_lookback_days: config.source.listing_lookback_days,
            fetch: config.fetch.scheduler(),
            kind_concurrency: config.kind_concurrency.max(1),
            exclusions: config.exclusions.clone(),
            kinds: EventKind::ALL.to_vec(),
            dry_run: false,
        }
    }
}

/// What happened to one kind on one date.
#[derive(Debug, Clone, PartialEq)]
pub enum KindOutcome {
    /// Already watermarked at or past the date.
    Skipped,
    Archived {
        blobs: usize,
        records: usize,
        gaps: Vec<GapReport>,
    },
    /// Left un-watermarked; the kind sits out the rest of the run.
    Failed { error: String },
    /// Failed on an earlier date of this run.
    Excluded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateReport {
    pub date: NaiveDate,
    pub event_files: usize,
    pub txn_files: usize,
    /// Files that exhausted their retries.
    pub fetch_failures: Vec<String>,
    /// Source rows left after filtering.
    pub rows: usize,
    /// Event rows that failed to parse. Each fails its kind's pass.
    pub malformed_rows: usize,
    /// Txn rows that failed to parse; their logs are unavailable.
    pub malformed_txn_rows: usize,
    /// Signatures with no transaction logs.
    pub missing_logs: usize,
    pub time_coverage: Option<TimeCoverage>,
    pub kinds: BTreeMap<EventKind, KindOutcome>,
}

impl DateReport {
    fn new(date: NaiveDate, event_files: usize, txn_files: usize) -> Self {
        Self {
            date,
            event_files,
            txn_files,
            fetch_failures: Vec::new(),
            rows: 0,
            malformed_rows: 0,
            malformed_txn_rows: 0,
            missing_logs: 0,
            time_coverage: None,
            kinds: BTreeMap::new(),
        }
    }

    pub fn blobs(&self) -> usize {
        self.kinds
            .values()
            .map(|o| match o {
                KindOutcome::Archived { blobs, .. } => *blobs,
                _ => 0,
            })
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub dry_run: bool,
    pub dates: Vec<DateReport>,
}

impl RunReport {
    pub fn blobs(&self) -> usize {
        self.dates.iter().map(DateReport::blobs).sum()
    }

    pub fn failed_kinds(&self) -> Vec<(NaiveDate, EventKind)> {
        self.dates
            .iter()
            .flat_map(|d| {
                d.kinds
                    .iter()
                    .filter(|(_, o)| matches!(o, KindOutcome::Failed { .. }))
                    .map(|(k, _)| (d.date, *k))
            })
            .collect()
    }

    /// One log line per date plus one per failed kind.
    pub fn log_summary(&self) {
        for date in &self.dates {
            let archived = date
                .kinds
                .values()
                .filter(|o| matches!(o, KindOutcome::Archived { .. }))
                .count();
            let skipped = date
                .kinds
                .values()
                .filter(|o| matches!(o, KindOutcome::Skipped))
                .count();
            let gaps: usize = date
                .kinds
                .values()
                .map(|o| match o {
                    KindOutcome::Archived { gaps, .. } => gaps.len(),
                    _ => 0,
                })
                .sum();
            tracing::info!(
                date = %date.date,
                dry_run = self.dry_run,
                rows = date.rows,
                blobs = date.blobs(),
                archived,
                skipped,
                gaps,
                fetch_failures = date.fetch_failures.len(),
                malformed_rows = date.malformed_rows,
                malformed_txn_rows = date.malformed_txn_rows,
                missing_logs = date.missing_logs,
                "date summary"
            );
            for (kind, outcome) in &date.kinds {
                if let KindOutcome::Failed { error } = outcome {
                    tracing::error!(date = %date.date, %kind, %error, "kind failed");
                }
            }
        }
        tracing::info!(dates = self.dates.len(), blobs = self.blobs(), "run complete");
    }
}

impl fmt::Display for KindOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped"),
            Self::Archived { blobs, records, .. } => {
                write!(f, "archived {records} records in {blobs} blobs")
            }
            Self::Failed { error } => write!(f, "failed: {error}"),
            Self::Excluded => f.write_str("excluded after earlier failure"),
        }
    }
}

pub struct Archiver {
    source: Arc<dyn EventSource>,
    destination: Arc<dyn ObjectStore>,
    watermarks: Arc<dyn WatermarkStore>,
    logs: Arc<dyn LogDecoder>,
    decoder: EventDecoder,
    options: ArchiveOptions,
}

impl Archiver {
    pub fn new(
        source: Arc<dyn EventSource>,
        destination: Arc<dyn ObjectStore>,
        watermarks: Arc<dyn WatermarkStore>,
        logs: Arc<dyn LogDecoder>,
        decoder: EventDecoder,
        options: ArchiveOptions,
    ) -> Self {
        Self {
            source,
            destination,
            watermarks,
            logs,
            decoder,
            options,
        }
    }

    /// Archives every listed date in `[start, end]` that some selected kind
    /// still needs. Dates run strictly in order; a fatal error stops the run.
    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<RunReport, Error> {
        let mut report = RunReport {
            dry_run: self.options.dry_run,
            dates: Vec::new(),
        };
        if start > end {
            tracing::warn!(%start, %end, "empty date range");
            return Ok(report);
        }

        let mut marks = BTreeMap::new();
        for &kind in &self.options.kinds {
            marks.insert(kind, self.watermarks.last_processed(kind).await?);
        }
        let wanted = |date: NaiveDate| {
            date >= start
                && date <= end
                && marks.values().any(|mark| mark.is_none_or(|m| date > m))
        };

        let events = self
            .list_dates(&self.options.events_prefix, start, |_| true, &wanted)
            .await?;
        let txns = self
            .list_dates(
                &self.options.txns_prefix,
                start,
                |key| key.ends_with(".parquet"),
                &wanted,
            )
            .await?;
        tracing::info!(
            event_dates = events.len(),
            txn_dates = txns.len(),
            "listed source files"
        );

        let days = pair_dates(events, txns)?;
        let mut excluded: HashSet<EventKind> = HashSet::new();
        for (date, event_keys, txn_keys) in days {
            let date_report = self
                .process_date(date, event_keys, txn_keys, &excluded)
                .await?;
            for (kind, outcome) in &date_report.kinds {
                if matches!(outcome, KindOutcome::Failed { .. }) {
                    excluded.insert(*kind);
                }
            }
            report.dates.push(date_report);
        }
        Ok(report)
    }

    async fn list_dates(
        &self,
        prefix: &str,
        start: NaiveDate,
        accept_key: impl Fn(&str) -> bool,
        wanted: &impl Fn(NaiveDate) -> bool,
    ) -> Result<BTreeMap<NaiveDate, Vec<String>>, Error> {
        let marker = source::start_after(prefix, start, self.options.listing_lookback_days);
        let keys = self.source.list(prefix, Some(&marker)).await?;
        let keys = keys.into_iter().filter(|k| accept_key(k));
        Ok(source::group_by_date(prefix, keys, wanted))
    }

    async fn process_date(
        &self,
        date: NaiveDate,
        event_keys: Vec<String>,
        txn_keys: Vec<String>,
        excluded: &HashSet<EventKind>,
    ) -> Result<DateReport, Error> {
        let mut report = DateReport::new(date, event_keys.len(), txn_keys.len());
        tracing::info!(%date, event_files = event_keys.len(), txn_files = txn_keys.len(), "processing date");

        let mut pending = Vec::new();
        for &kind in &self.options.kinds {
            if excluded.contains(&kind) {
                report.kinds.insert(kind, KindOutcome::Excluded);
            } else if self.watermarks.is_pending(kind, date).await? {
                pending.push(kind);
            } else {
                tracing::info!(%kind, %date, "already archived, skipping");
                report.kinds.insert(kind, KindOutcome::Skipped);
            }
        }
        if pending.is_empty() {
            return Ok(report);
        }

        let source = &self.source;
        let mut fetched = self
            .options
            .fetch
            .fetch_all(event_keys, |key| async move { source.read_events(&key).await })
            .await;
        report.fetch_failures.extend(fetched.exhausted.iter().cloned());
        let mut blocked = BTreeMap::new();
        for (key, error) in std::mem::take(&mut fetched.rejected) {
            block_all(&mut blocked, &pending, &format!("undecodable events file {key}: {error}"));
        }
        let mut rows: Vec<RawEvent> = Vec::new();
        for file in fetched.into_values() {
            for bad in &file.malformed {
                block_for_malformed(&mut blocked, &pending, bad);
            }
            report.malformed_rows += file.malformed.len();
            rows.extend(file.rows);
        }
        fail_blocked(&mut report, &mut pending, &mut blocked);

        rows.retain(|row| self.keep_row(row, &pending));
        report.rows = rows.len();
        if rows.is_empty() {
            // nothing to archive; the date stays pending for every kind
            tracing::info!(%date, "no source rows for date");
            return Ok(report);
        }

        if pending.contains(&EventKind::OrderActionRecord) {
            let coverage = TimeCoverage::check(
                date,
                rows.iter()
                    .filter(|r| r.event_type == EventKind::OrderActionRecord.as_ref())
                    .filter_map(|r| r.block_time),
            );
            coverage.log();
            report.time_coverage = Some(coverage);
        }

        let signatures: HashSet<&str> = rows.iter().map(|r| r.tx_id.as_str()).collect();
        tracing::info!(%date, transactions = signatures.len(), "joining transaction logs");
        let mut txns = self
            .options
            .fetch
            .fetch_all(txn_keys, |key| async move { source.read_txns(&key).await })
            .await;
        report.fetch_failures.extend(txns.exhausted.iter().cloned());
        for (key, error) in std::mem::take(&mut txns.rejected) {
            block_all(&mut blocked, &pending, &format!("undecodable txns file {key}: {error}"));
        }
        fail_blocked(&mut report, &mut pending, &mut blocked);
        let mut logs = Vec::new();
        for file in txns.into_values() {
            // a txn row without a signature cannot be attributed to any event
            report.malformed_txn_rows += file.malformed.len();
            logs.extend(file.rows);
        }
        let index = LogIndex::build(self.logs.as_ref(), &logs, &signatures);
        drop(logs);

        let mut missing: Vec<&str> = signatures
            .iter()
            .copied()
            .filter(|sig| index.events(sig).is_none())
            .collect();
        missing.sort_unstable();
        for signature in &missing {
            tracing::warn!(%signature, "logs not found for signature");
        }
        report.missing_logs = missing.len();

        let rows = &rows;
        let index = &index;
        let outcomes: Vec<(EventKind, Result<KindOutcome, Error>)> = stream::iter(pending)
            .map(|kind| async move { (kind, self.process_kind(kind, date, rows, index).await) })
            .buffer_unordered(self.options.kind_concurrency)
            .collect()
            .await;

        let mut fatal = None;
        for (kind, outcome) in outcomes {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => {
                    tracing::error!(%kind, %date, error = %e, "fatal error, aborting run");
                    fatal.get_or_insert(e);
                    continue;
                }
                Err(e) => {
                    tracing::error!(%kind, %date, error = %e, "kind failed, not advancing its watermark");
                    KindOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            report.kinds.insert(kind, outcome);
        }
        match fatal {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Source-row filters: pending kinds only, fills only, and the
    /// configured authority exclusions.
    fn keep_row(&self, row: &RawEvent, pending: &[EventKind]) -> bool {
        let Some(kind) = EventKind::from_event_type(&row.event_type) else {
            return false;
        };
        if !pending.contains(&kind) {
            return false;
        }
        let authority = || row.arg_str("userAuthority").unwrap_or_default();
        match kind {
            EventKind::OrderActionRecord => is_fill_action(row.args.get("action")),
            EventKind::SettlePnlRecord => !self
                .options
                .exclusions
                .settle_pnl_authorities
                .iter()
                .any(|a| a == authority()),
            EventKind::DepositRecord => !self
                .options
                .exclusions
                .deposit_authorities
                .iter()
                .any(|a| a == authority()),
            _ => true,
        }
    }

    /// Decode, partition and write one kind for one date, then advance its
    /// watermark.
    async fn process_kind(
        &self,
        kind: EventKind,
        date: NaiveDate,
        rows: &[RawEvent],
        index: &LogIndex,
    ) -> Result<KindOutcome, Error> {
        let records = self.decode_kind(kind, rows, index)?;
        let record_count = records.len();
        let set = Partitioner::new(self.decoder.catalog(), self.decoder.program_id())
            .partition(kind, date, records)?;

        let mut blobs = 0;
        for partition in &set.partitions {
            let key = partition.key.object_key(date);
            let object = archive_object(&partition.records)?;
            if self.options.dry_run {
                tracing::info!(%key, records = partition.records.len(), "dry run, not writing");
            } else {
                self.destination.put(&key, object).await?;
                tracing::debug!(%key, records = partition.records.len(), "blob written");
            }
            blobs += 1;
        }

        if !self.options.dry_run {
            self.watermarks.advance(kind, date).await?;
        }
        tracing::info!(%kind, %date, records = record_count, blobs, "kind archived");
        Ok(KindOutcome::Archived {
            blobs,
            records: record_count,
            gaps: set.gaps,
        })
    }

    /// Decodes this kind's events from the joined logs, one pass per
    /// distinct transaction in row order.
    fn decode_kind(
        &self,
        kind: EventKind,
        rows: &[RawEvent],
        index: &LogIndex,
    ) -> Result<Vec<EventRecord>, Error> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for row in rows.iter().filter(|r| r.event_type == kind.as_ref()) {
            if !seen.insert(row.tx_id.as_str()) {
                continue;
            }
            let Some(events) = index.events(&row.tx_id) else {
                continue;
            };
            let meta = EventMetadata {
                tx_sig: row.tx_id.clone(),
                slot: row.block_slot,
            };
            for event in events.iter().filter(|e| e.name == kind.as_ref()) {
                if kind == EventKind::OrderActionRecord && !is_fill_action(event.data.get("action"))
                {
                    continue;
                }
                records.push(self.decoder.decode(kind, &event.data, &meta)?);
            }
        }
        Ok(records)
    }
}

type DayFiles = (NaiveDate, Vec<String>, Vec<String>);

fn block_all(blocked: &mut BTreeMap<EventKind, String>, pending: &[EventKind], reason: &str) {
    for &kind in pending {
        blocked.entry(kind).or_insert_with(|| reason.to_string());
    }
}

/// A malformed row fails the pass of the kind it belongs to. A row whose
/// kind cannot be read fails every pending kind.
fn block_for_malformed(
    blocked: &mut BTreeMap<EventKind, String>,
    pending: &[EventKind],
    bad: &MalformedRow,
) {
    let reason = format!("malformed row {} of {}: {}", bad.index, bad.key, bad.reason);
    match bad.event_type.as_deref() {
        None => block_all(blocked, pending, &reason),
        Some(event_type) => {
            if let Some(kind) = EventKind::from_event_type(event_type)
                && pending.contains(&kind)
            {
                blocked.entry(kind).or_insert(reason);
            }
        }
    }
}

/// Moves blocked kinds out of `pending` and records them as failed.
fn fail_blocked(
    report: &mut DateReport,
    pending: &mut Vec<EventKind>,
    blocked: &mut BTreeMap<EventKind, String>,
) {
    for (kind, error) in std::mem::take(blocked) {
        if let Some(pos) = pending.iter().position(|k| *k == kind) {
            pending.remove(pos);
            tracing::error!(%kind, date = %report.date, %error, "kind failed on bad source data, not advancing its watermark");
            report.kinds.insert(kind, KindOutcome::Failed { error });
        }
    }
}

/// Zips the two listings date by date. Both must list exactly the same
/// dates; anything else means the join would silently lose a day.
fn pair_dates(
    events: BTreeMap<NaiveDate, Vec<String>>,
    txns: BTreeMap<NaiveDate, Vec<String>>,
) -> Result<Vec<DayFiles>, Error> {
    let mut events = events.into_iter();
    let mut txns = txns.into_iter();
    let mut days = Vec::new();
    loop {
        match (events.next(), txns.next()) {
            (None, None) => return Ok(days),
            (Some((date, event_keys)), Some((txn_date, txn_keys))) if date == txn_date => {
                days.push((date, event_keys, txn_keys));
            }
            (e, t) => {
                let err = Error::JoinMismatch {
                    events_date: e.map(|(d, _)| d),
                    txns_date: t.map(|(d, _)| d),
                };
                tracing::error!(error = %err, "events and txns listings disagree");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use serde_json::json;

    use crate::source::FileRows;

    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn listing(dates: &[&str]) -> BTreeMap<NaiveDate, Vec<String>> {
        dates
            .iter()
            .map(|s| (d(s), vec![format!("x/{s}/part-0.parquet")]))
            .collect()
    }

    #[test]
    fn listings_pair_by_date() {
        let days = pair_dates(
            listing(&["2024-03-01", "2024-03-02"]),
            listing(&["2024-03-01", "2024-03-02"]),
        )
        .unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[1].0, d("2024-03-02"));
    }

    #[test]
    fn one_sided_or_shifted_dates_are_fatal() {
        let err = pair_dates(
            listing(&["2024-03-01", "2024-03-02"]),
            listing(&["2024-03-01"]),
        )
        .unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            Error::JoinMismatch {
                events_date: Some(_),
                txns_date: None
            }
        ));

        let err = pair_dates(listing(&["2024-03-01"]), listing(&["2024-03-02"])).unwrap_err();
        assert!(matches!(err, Error::JoinMismatch { .. }));
    }

    fn row(event_type: &str, args: serde_json::Value) -> RawEvent {
        RawEvent {
            event_type: event_type.to_string(),
            tx_id: "sig".to_string(),
            block_slot: 1,
            block_time: None,
            args,
        }
    }

    struct Nothing;

    #[async_trait::async_trait]
    impl EventSource for Nothing {
        async fn list(&self, _: &str, _: Option<&str>) -> Result<Vec<String>, Error> {
            Ok(Vec::new())
        }
        async fn read_events(&self, _: &str) -> Result<FileRows<RawEvent>, Error> {
            Ok(FileRows::new(Vec::new()))
        }
        async fn read_txns(&self, _: &str) -> Result<FileRows<crate::types::TxLogRow>, Error> {
            Ok(FileRows::new(Vec::new()))
        }
    }

    impl LogDecoder for Nothing {
        fn decode(&self, _: &[String]) -> Result<Vec<crate::types::ProgramEvent>, Error> {
            Ok(Vec::new())
        }
    }

    fn archiver() -> Archiver {
        archiver_with(ArchiveOptions::default())
    }

    fn archiver_with(options: ArchiveOptions) -> Archiver {
        Archiver::new(
            Arc::new(Nothing),
            Arc::new(crate::store::MemoryStore::new()),
            Arc::new(crate::watermark::MemoryWatermarkStore::new()),
            Arc::new(Nothing),
            EventDecoder::new(Arc::default(), crate::events::DRIFT_PROGRAM_ID),
            options,
        )
    }

    #[test]
    fn default_filters_keep_every_authority() {
        let archiver = archiver();
        let all = EventKind::ALL;
        let keeper = json!({"userAuthority": "882DFRCi5akKFyYxT4PP2vZkoQEGvm2Nsind2nPDuGqu"});
        assert!(archiver.keep_row(&row("DepositRecord", keeper.clone()), &all));
        assert!(archiver.keep_row(&row("SettlePnlRecord", keeper), &all));
    }

    #[test]
    fn row_filters() {
        let mut options = ArchiveOptions::default();
        options.exclusions = Exclusions {
            settle_pnl_authorities: vec!["FionaRdGscg9iK3RA4H4pZrmFyFPDhRAUExeEHfZtUPm".into()],
            deposit_authorities: vec!["882DFRCi5akKFyYxT4PP2vZkoQEGvm2Nsind2nPDuGqu".into()],
        };
        let archiver = archiver_with(options);
        let all = EventKind::ALL;

        assert!(archiver.keep_row(&row("OrderActionRecord", json!({"action": "Fill"})), &all));
        assert!(!archiver.keep_row(&row("OrderActionRecord", json!({"action": "Place"})), &all));
        assert!(!archiver.keep_row(&row("SwapRecord", json!({})), &all));
        assert!(!archiver.keep_row(
            &row("OrderActionRecord", json!({"action": "Fill"})),
            &[EventKind::DepositRecord]
        ));

        let excluded = json!({"userAuthority": "882DFRCi5akKFyYxT4PP2vZkoQEGvm2Nsind2nPDuGqu"});
        assert!(!archiver.keep_row(&row("DepositRecord", excluded.clone()), &all));
        // the deposit exclusion does not apply to other kinds
        assert!(archiver.keep_row(&row("SettlePnlRecord", excluded), &all));
        assert!(!archiver.keep_row(
            &row(
                "SettlePnlRecord",
                json!({"userAuthority": "FionaRdGscg9iK3RA4H4pZrmFyFPDhRAUExeEHfZtUPm"})
            ),
            &all
        ));
        assert!(archiver.keep_row(&row("DepositRecord", json!({})), &all));
    }

    #[test]
    fn malformed_rows_block_their_own_kind() {
        let bad = |event_type: Option<&str>| MalformedRow {
            key: "drift/events/2024-03-01/part-0.parquet".into(),
            index: 0,
            event_type: event_type.map(String::from),
            reason: "bad args".into(),
        };
        let mut pending = vec![EventKind::DepositRecord, EventKind::SettlePnlRecord];
        let mut blocked = BTreeMap::new();

        block_for_malformed(&mut blocked, &pending, &bad(Some("SwapRecord")));
        block_for_malformed(&mut blocked, &pending, &bad(Some("LPRecord")));
        assert!(blocked.is_empty(), "unsupported and non-pending kinds are only counted");

        block_for_malformed(&mut blocked, &pending, &bad(Some("DepositRecord")));
        let mut report = DateReport::new(d("2024-03-01"), 1, 1);
        fail_blocked(&mut report, &mut pending, &mut blocked);
        assert_eq!(pending, vec![EventKind::SettlePnlRecord]);
        assert!(blocked.is_empty());
        assert!(matches!(
            report.kinds[&EventKind::DepositRecord],
            KindOutcome::Failed { .. }
        ));

        block_for_malformed(&mut blocked, &pending, &bad(None));
        fail_blocked(&mut report, &mut pending, &mut blocked);
        assert!(pending.is_empty());
        assert_eq!(report.kinds.len(), 2);
    }

    #[tokio::test]
    async fn inverted_range_does_nothing() {
        let report = archiver().run(d("2024-03-02"), d("2024-03-01")).await.unwrap();
        assert!(report.dates.is_empty());
        assert_eq!(report.blobs(), 0);
    }

    #[test]
    fn report_totals() {
        let mut day = DateReport::new(d("2024-03-01"), 1, 1);
        day.kinds.insert(
            EventKind::DepositRecord,
            KindOutcome::Archived {
                blobs: 2,
                records: 3,
                gaps: Vec::new(),
            },
        );
        day.kinds.insert(
            EventKind::LPRecord,
            KindOutcome::Failed {
                error: "store down".into(),
            },
        );
        let report = RunReport {
            dry_run: false,
            dates: vec![day],
        };
        assert_eq!(report.blobs(), 2);
        assert_eq!(report.failed_kinds(), vec![(d("2024-03-01"), EventKind::LPRecord)]);
        assert_eq!(
            report.dates[0].kinds[&EventKind::DepositRecord].to_string(),
            "archived 3 records in 2 blobs"
        );
    }
}
