#![expect(
    clippy::unwrap_used,
    clippy::panic,
    reason = "test code uses unwrap/panic for concise assertions"
)]

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::{Map, Value};

use drift_event_archiver::events::DRIFT_PROGRAM_ID;
use drift_event_archiver::config::Exclusions;
use drift_event_archiver::fetch::{Backoff, FetchScheduler, RetryPolicy};
use drift_event_archiver::source::parse_rows;
use drift_event_archiver::store::MemoryStore;
use drift_event_archiver::watermark::MemoryWatermarkStore;
use drift_event_archiver::{
    ArchiveOptions, Archiver, Error, EventDecoder, EventKind, EventSource, FileRows, KindOutcome,
    LogDecoder, MarketCatalog, ProgramEvent, RawEvent, TxLogRow, WatermarkStore,
};

type Rows = BTreeMap<String, Vec<Map<String, Value>>>;

#[derive(Deserialize, Clone)]
struct Fixture {
    events: Rows,
    txns: Rows,
}

fn read_fixture(filename: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let path = format!("{manifest_dir}/tests/fixtures/{filename}");
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {path}: {e}"))
}

fn load_days() -> Fixture {
    serde_json::from_str(&read_fixture("archive_days.json"))
        .unwrap_or_else(|e| panic!("failed to parse archive_days.json: {e}"))
}

fn load_catalog() -> Arc<MarketCatalog> {
    Arc::new(MarketCatalog::from_snapshot(read_fixture("markets.json").as_bytes()).unwrap())
}

/// Serves fixture rows as if they were listed parquet files.
struct FixtureSource {
    fixture: Fixture,
    broken: HashSet<String>,
}

impl FixtureSource {
    fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            broken: HashSet::new(),
        }
    }

    fn rows<'a>(&'a self, table: &'a Rows, key: &str) -> Result<&'a [Map<String, Value>], Error> {
        if self.broken.contains(key) {
            return Err(Error::Store {
                key: key.to_string(),
                reason: "connection reset".into(),
            });
        }
        table
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::Store {
                key: key.to_string(),
                reason: "no such key".into(),
            })
    }
}

#[async_trait]
impl EventSource for FixtureSource {
    async fn list(&self, prefix: &str, start_after: Option<&str>) -> Result<Vec<String>, Error> {
        Ok(self
            .fixture
            .events
            .keys()
            .chain(self.fixture.txns.keys())
            .filter(|k| k.starts_with(prefix))
            .filter(|k| start_after.is_none_or(|after| k.as_str() > after))
            .cloned()
            .collect())
    }

    async fn read_events(&self, key: &str) -> Result<FileRows<RawEvent>, Error> {
        let rows = self.rows(&self.fixture.events, key)?;
        Ok(parse_rows(key, rows, RawEvent::from_row))
    }

    async fn read_txns(&self, key: &str) -> Result<FileRows<TxLogRow>, Error> {
        let rows = self.rows(&self.fixture.txns, key)?;
        Ok(parse_rows(key, rows, TxLogRow::from_row))
    }
}

/// Log lines of the form `event {"name": .., "data": {..}}`.
struct JsonEventLogs;

impl LogDecoder for JsonEventLogs {
    fn decode(&self, log_messages: &[String]) -> Result<Vec<ProgramEvent>, Error> {
        log_messages
            .iter()
            .filter_map(|line| line.strip_prefix("event "))
            .map(|json| {
                let value: Value = serde_json::from_str(json)?;
                Ok(ProgramEvent {
                    name: value["name"].as_str().unwrap_or_default().to_string(),
                    data: value["data"].clone(),
                })
            })
            .collect()
    }
}

struct Harness {
    destination: Arc<MemoryStore>,
    watermarks: Arc<MemoryWatermarkStore>,
    archiver: Archiver,
}

fn fast_options() -> ArchiveOptions {
    ArchiveOptions {
        fetch: FetchScheduler::new(2, RetryPolicy::new(2, 0, Backoff::Fixed)),
        ..ArchiveOptions::default()
    }
}

fn harness_with(
    source: FixtureSource,
    catalog: Arc<MarketCatalog>,
    watermarks: MemoryWatermarkStore,
    options: ArchiveOptions,
) -> Harness {
    let destination = Arc::new(MemoryStore::new());
    let watermarks = Arc::new(watermarks);
    let archiver = Archiver::new(
        Arc::new(source),
        destination.clone(),
        watermarks.clone(),
        Arc::new(JsonEventLogs),
        EventDecoder::new(catalog, DRIFT_PROGRAM_ID),
        options,
    );
    Harness {
        destination,
        watermarks,
        archiver,
    }
}

fn harness() -> Harness {
    harness_with(
        FixtureSource::new(load_days()),
        load_catalog(),
        MemoryWatermarkStore::new(),
        fast_options(),
    )
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn blob_key(scope: &str, id: &str, collection: &str, day: &str) -> String {
    format!("program/{DRIFT_PROGRAM_ID}/{scope}/{id}/{collection}/2024/{day}")
}

async fn csv_rows(store: &MemoryStore, key: &str) -> (Vec<String>, Vec<Vec<String>>) {
    let object = store
        .object(key)
        .await
        .unwrap_or_else(|| panic!("missing blob {key}"));
    assert_eq!(object.content_type, "text/csv");
    assert_eq!(object.content_encoding.as_deref(), Some("gzip"));
    let mut text = String::new();
    GzDecoder::new(object.body.as_ref())
        .read_to_string(&mut text)
        .unwrap();
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

fn column(headers: &[String], name: &str) -> usize {
    headers
        .iter()
        .position(|h| h == name)
        .unwrap_or_else(|| panic!("no column {name}"))
}

// ──────────────────── full runs ────────────────────

#[tokio::test]
async fn archives_each_date_into_entity_partitions() {
    let h = harness();
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();

    assert_eq!(report.dates.len(), 2);
    let first = &report.dates[0];
    assert_eq!(first.date, d("2024-03-01"));
    assert_eq!(first.event_files, 2);
    assert_eq!(first.rows, 6, "the place row is dropped");
    assert_eq!(first.malformed_rows, 0);
    assert_eq!(first.missing_logs, 1);
    assert_eq!(first.blobs(), 6);
    assert_eq!(
        first.kinds[&EventKind::OrderActionRecord],
        KindOutcome::Archived {
            blobs: 3,
            records: 2,
            gaps: Vec::new()
        }
    );
    assert_eq!(report.dates[1].blobs(), 1);

    let mut keys = h.destination.keys().await;
    keys.sort();
    let mut expected = vec![
        blob_key("user", "MakerA", "tradeRecords", "20240301"),
        blob_key("user", "TakerA", "tradeRecords", "20240301"),
        blob_key("market", "SOL-PERP", "tradeRecords", "20240301"),
        blob_key("user", "UserX", "depositRecords", "20240301"),
        blob_key("user", "UserKeeper", "depositRecords", "20240301"),
        blob_key("user", "UserY", "settlePnlRecords", "20240301"),
        blob_key("user", "UserX", "depositRecords", "20240302"),
    ];
    expected.sort();
    assert_eq!(keys, expected);

    for kind in EventKind::ALL {
        assert_eq!(
            h.watermarks.last_processed(kind).await.unwrap(),
            Some(d("2024-03-02")),
            "{kind} watermark"
        );
    }
}

#[tokio::test]
async fn market_trade_blob_is_sorted_by_fill_record_id() {
    let h = harness();
    h.archiver.run(d("2024-03-01"), d("2024-03-01")).await.unwrap();

    let key = blob_key("market", "SOL-PERP", "tradeRecords", "20240301");
    let (headers, rows) = csv_rows(&h.destination, &key).await;
    assert_eq!(headers[0], "fillerReward");
    assert_eq!(headers.last().map(String::as_str), Some("programId"));
    assert_eq!(rows.len(), 2);

    let fill_id = column(&headers, "fillRecordId");
    let base = column(&headers, "baseAssetAmountFilled");
    let action = column(&headers, "action");
    assert_eq!(rows[0][fill_id], "1");
    assert_eq!(rows[1][fill_id], "2");
    assert_eq!(rows[0][base], "1.0");
    assert_eq!(rows[1][base], "2.0");
    assert_eq!(rows[0][action], "fill");
    assert_eq!(rows[0][column(&headers, "programId")], DRIFT_PROGRAM_ID);
}

#[tokio::test]
async fn deposit_amounts_use_the_spot_mint_precision() {
    let h = harness();
    h.archiver.run(d("2024-03-01"), d("2024-03-01")).await.unwrap();

    let key = blob_key("user", "UserX", "depositRecords", "20240301");
    let (headers, rows) = csv_rows(&h.destination, &key).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][column(&headers, "amount")], "5.0");
    assert_eq!(rows[0][column(&headers, "txSig")], "sigDeposit");
    assert_eq!(rows[0][column(&headers, "direction")], "deposit");
}

// ──────────────────── idempotence ────────────────────

#[tokio::test]
async fn rerun_with_same_watermarks_writes_nothing() {
    let h = harness();
    h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();
    let writes = h.destination.put_count().await;

    let report = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();
    assert!(report.dates.is_empty());
    assert_eq!(h.destination.put_count().await, writes);
}

#[tokio::test]
async fn fresh_rerun_produces_identical_bytes() {
    let first = harness();
    let second = harness();
    first.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();
    second.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();

    let keys = first.destination.keys().await;
    assert_eq!(keys, second.destination.keys().await);
    for key in keys {
        assert_eq!(
            first.destination.object(&key).await,
            second.destination.object(&key).await,
            "{key} differs between runs"
        );
    }
}

#[tokio::test]
async fn watermarked_kind_is_skipped_while_others_run() {
    let h = harness_with(
        FixtureSource::new(load_days()),
        load_catalog(),
        MemoryWatermarkStore::with_marks([(EventKind::DepositRecord, d("2024-03-01"))]),
        fast_options(),
    );
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();

    let first = &report.dates[0];
    assert_eq!(first.kinds[&EventKind::DepositRecord], KindOutcome::Skipped);
    assert_eq!(first.rows, 4);
    assert_eq!(first.blobs(), 4);
    assert!(
        h.destination
            .object(&blob_key("user", "UserX", "depositRecords", "20240301"))
            .await
            .is_none()
    );
    assert!(
        h.destination
            .object(&blob_key("user", "UserX", "depositRecords", "20240302"))
            .await
            .is_some()
    );
}

// ──────────────────── degenerate inputs ────────────────────

#[tokio::test]
async fn empty_listing_writes_and_advances_nothing() {
    let empty = Fixture {
        events: Rows::new(),
        txns: Rows::new(),
    };
    let h = harness_with(
        FixtureSource::new(empty),
        load_catalog(),
        MemoryWatermarkStore::new(),
        fast_options(),
    );
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();

    assert!(report.dates.is_empty());
    assert_eq!(h.destination.put_count().await, 0);
    for kind in EventKind::ALL {
        assert_eq!(h.watermarks.last_processed(kind).await.unwrap(), None);
    }
}

#[tokio::test]
async fn missing_txns_date_aborts_before_any_write() {
    let mut fixture = load_days();
    fixture.txns.remove("drift/txns/2024-03-02/part-0.parquet");
    let h = harness_with(
        FixtureSource::new(fixture),
        load_catalog(),
        MemoryWatermarkStore::new(),
        fast_options(),
    );

    let err = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::JoinMismatch {
            txns_date: None,
            ..
        }
    ));
    assert_eq!(h.destination.put_count().await, 0);
}

#[tokio::test]
async fn unknown_market_aborts_and_keeps_trade_watermark() {
    let spot_only = MarketCatalog::new(
        [],
        load_catalog().spot_markets().cloned().collect::<Vec<_>>(),
    );
    let h = harness_with(
        FixtureSource::new(load_days()),
        Arc::new(spot_only),
        MemoryWatermarkStore::new(),
        fast_options(),
    );

    let err = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        Error::UnknownMarket {
            market_type: "perp",
            market_index: 0
        }
    ));
    assert_eq!(
        h.watermarks
            .last_processed(EventKind::OrderActionRecord)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn exhausted_file_is_skipped_and_reported() {
    let mut source = FixtureSource::new(load_days());
    source
        .broken
        .insert("drift/events/2024-03-01/part-1.parquet".to_string());
    let h = harness_with(
        source,
        load_catalog(),
        MemoryWatermarkStore::new(),
        fast_options(),
    );
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-01")).await.unwrap();

    let first = &report.dates[0];
    assert_eq!(
        first.fetch_failures,
        vec!["drift/events/2024-03-01/part-1.parquet".to_string()]
    );
    assert_eq!(first.rows, 4);
    assert_eq!(first.blobs(), 5);
    assert!(
        h.destination
            .object(&blob_key("user", "UserY", "settlePnlRecords", "20240301"))
            .await
            .is_none()
    );
}

fn with_extra_event_row(file: &str, row: Value) -> Fixture {
    let mut fixture = load_days();
    let Value::Object(row) = row else {
        panic!("row must be an object");
    };
    fixture.events.get_mut(file).unwrap().push(row);
    fixture
}

#[tokio::test]
async fn malformed_row_fails_only_its_kind() {
    let fixture = with_extra_event_row(
        "drift/events/2024-03-01/part-1.parquet",
        serde_json::json!({
            "event_type": "SettlePnlRecord",
            "tx_id": "sigGarbled",
            "block_slot": 250000302,
            "block_time": "2024-03-01 18:00:02",
            "args": "{not json"
        }),
    );
    let h = harness_with(
        FixtureSource::new(fixture),
        load_catalog(),
        MemoryWatermarkStore::new(),
        fast_options(),
    );
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();

    let first = &report.dates[0];
    assert!(first.fetch_failures.is_empty(), "the file itself was readable");
    assert_eq!(first.malformed_rows, 1);
    assert!(matches!(
        first.kinds[&EventKind::SettlePnlRecord],
        KindOutcome::Failed { .. }
    ));
    assert_eq!(first.rows, 4, "fills and deposits survive");
    assert_eq!(first.blobs(), 5);
    assert_eq!(
        report.dates[1].kinds[&EventKind::SettlePnlRecord],
        KindOutcome::Excluded
    );
    assert_eq!(
        report.failed_kinds(),
        vec![(d("2024-03-01"), EventKind::SettlePnlRecord)]
    );

    assert!(
        h.destination
            .object(&blob_key("user", "UserY", "settlePnlRecords", "20240301"))
            .await
            .is_none()
    );
    assert_eq!(
        h.watermarks
            .last_processed(EventKind::SettlePnlRecord)
            .await
            .unwrap(),
        None
    );
    assert_eq!(
        h.watermarks
            .last_processed(EventKind::DepositRecord)
            .await
            .unwrap(),
        Some(d("2024-03-02"))
    );
}

#[tokio::test]
async fn row_without_event_type_fails_every_kind_for_the_date() {
    let fixture = with_extra_event_row(
        "drift/events/2024-03-01/part-0.parquet",
        serde_json::json!({"tx_id": "sigUntyped", "block_slot": 250000400}),
    );
    let h = harness_with(
        FixtureSource::new(fixture),
        load_catalog(),
        MemoryWatermarkStore::new(),
        fast_options(),
    );
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-01")).await.unwrap();

    let first = &report.dates[0];
    assert_eq!(first.malformed_rows, 1);
    assert_eq!(first.rows, 0);
    for kind in EventKind::ALL {
        assert!(
            matches!(first.kinds[&kind], KindOutcome::Failed { .. }),
            "{kind} should fail"
        );
        assert_eq!(h.watermarks.last_processed(kind).await.unwrap(), None);
    }
    assert_eq!(h.destination.put_count().await, 0);
}

// ──────────────────── options ────────────────────

#[tokio::test]
async fn configured_exclusions_drop_keeper_deposits() {
    let h = harness_with(
        FixtureSource::new(load_days()),
        load_catalog(),
        MemoryWatermarkStore::new(),
        ArchiveOptions {
            exclusions: Exclusions {
                deposit_authorities: vec!["882DFRCi5akKFyYxT4PP2vZkoQEGvm2Nsind2nPDuGqu".into()],
                ..Exclusions::default()
            },
            ..fast_options()
        },
    );
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-01")).await.unwrap();

    assert_eq!(report.dates[0].rows, 5);
    assert!(
        h.destination
            .object(&blob_key("user", "UserKeeper", "depositRecords", "20240301"))
            .await
            .is_none()
    );
    assert!(
        h.destination
            .object(&blob_key("user", "UserX", "depositRecords", "20240301"))
            .await
            .is_some()
    );
}

#[tokio::test]
async fn dry_run_leaves_store_and_watermarks_untouched() {
    let h = harness_with(
        FixtureSource::new(load_days()),
        load_catalog(),
        MemoryWatermarkStore::new(),
        ArchiveOptions {
            dry_run: true,
            ..fast_options()
        },
    );
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.blobs(), 7);
    assert_eq!(h.destination.put_count().await, 0);
    assert_eq!(
        h.watermarks
            .last_processed(EventKind::DepositRecord)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn kind_selection_limits_the_run() {
    let h = harness_with(
        FixtureSource::new(load_days()),
        load_catalog(),
        MemoryWatermarkStore::new(),
        ArchiveOptions {
            kinds: vec![EventKind::DepositRecord],
            ..fast_options()
        },
    );
    let report = h.archiver.run(d("2024-03-01"), d("2024-03-02")).await.unwrap();

    assert_eq!(report.blobs(), 3);
    assert_eq!(
        h.watermarks
            .last_processed(EventKind::DepositRecord)
            .await
            .unwrap(),
        Some(d("2024-03-02"))
    );
    assert_eq!(
        h.watermarks
            .last_processed(EventKind::SettlePnlRecord)
            .await
            .unwrap(),
        None
    );
}
