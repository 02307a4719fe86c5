use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Days, NaiveDate, Utc};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use drift_event_archiver::catalog::{FileCatalogSource, StoreCatalogSource};
use drift_event_archiver::store::{LocalStore, MemoryStore, S3Settings, S3Store};
use drift_event_archiver::{
    AnchorLogDecoder, ArchiveConfig, ArchiveOptions, Archiver, CatalogSource, EventDecoder,
    EventKind, FileWatermarkStore, Idl, ObjectStore, ParquetEventSource, bootstrap,
};

/// Archive Drift protocol events from the indexer's daily files into
/// per-user and per-market gzip CSV blobs.
#[derive(Parser, Debug)]
#[command(name = "drift-archive", version)]
struct Cli {
    /// First date to archive (YYYY-MM-DD). Defaults to yesterday (UTC).
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Last date to archive, inclusive. Defaults to yesterday (UTC).
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// TOML config file; built-in defaults when omitted.
    #[arg(long, short, env = "DRIFT_ARCHIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated event kinds to process (default: all).
    #[arg(long, value_delimiter = ',')]
    kinds: Vec<EventKind>,

    /// Decode and partition without writing blobs or advancing watermarks.
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ArchiveConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ArchiveConfig::default(),
    };

    let yesterday = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .context("date underflow")?;
    let start = cli.start_date.unwrap_or(yesterday);
    let end = cli.end_date.unwrap_or(yesterday);

    let source_store = source_store(&config).await;
    let destination = destination_store(&config, cli.dry_run).await?;

    let catalog_source: Box<dyn CatalogSource> = match (&config.catalog_path, &config.catalog_key)
    {
        (Some(path), _) => Box::new(FileCatalogSource { path: path.clone() }),
        (None, Some(key)) => Box::new(StoreCatalogSource {
            store: Arc::clone(&source_store),
            key: key.clone(),
        }),
        (None, None) => bail!("either catalog_path or catalog_key must be configured"),
    };
    let catalog = bootstrap(catalog_source.as_ref())
        .await
        .context("bootstrapping market catalog")?;

    let idl_path = config
        .idl_path
        .as_ref()
        .context("idl_path must be configured to decode transaction logs")?;
    let idl = std::fs::read(idl_path)
        .with_context(|| format!("reading idl {}", idl_path.display()))?;
    let idl = Idl::from_json(&idl).context("parsing idl")?;

    let mut options = ArchiveOptions::from_config(&config);
    options.dry_run = cli.dry_run;
    if !cli.kinds.is_empty() {
        options.kinds = cli.kinds.clone();
    }

    tracing::info!(
        %start,
        %end,
        dry_run = cli.dry_run,
        kinds = options.kinds.len(),
        program_id = %config.program_id,
        "starting archive run"
    );

    let archiver = Archiver::new(
        Arc::new(ParquetEventSource::new(source_store)),
        destination,
        Arc::new(FileWatermarkStore::new(&config.watermark_dir)),
        Arc::new(AnchorLogDecoder::new(&config.program_id, Arc::new(idl))),
        EventDecoder::new(catalog, config.program_id.as_str()),
        options,
    );
    let report = archiver.run(start, end).await.context("archive run aborted")?;
    report.log_summary();

    let failed = report.failed_kinds();
    if !failed.is_empty() {
        bail!("{} kind pass(es) failed; their watermarks were not advanced", failed.len());
    }
    Ok(())
}

async fn source_store(config: &ArchiveConfig) -> Arc<dyn ObjectStore> {
    let source = &config.source;
    match &source.local_root {
        Some(root) => Arc::new(LocalStore::new(root)),
        None => Arc::new(
            S3Store::connect(&S3Settings {
                bucket: source.bucket.clone(),
                profile: source.profile.clone(),
                region: source.region.clone(),
                endpoint: source.endpoint.clone(),
            })
            .await,
        ),
    }
}

async fn destination_store(config: &ArchiveConfig, dry_run: bool) -> Result<Arc<dyn ObjectStore>> {
    let destination = &config.destination;
    if let Some(root) = &destination.local_root {
        return Ok(Arc::new(LocalStore::new(root)));
    }
    if let Some(bucket) = &destination.bucket {
        return Ok(Arc::new(
            S3Store::connect(&S3Settings {
                bucket: bucket.clone(),
                profile: destination.profile.clone(),
                region: destination.region.clone(),
                endpoint: destination.endpoint.clone(),
            })
            .await,
        ));
    }
    if dry_run {
        return Ok(Arc::new(MemoryStore::new()));
    }
    bail!("no destination configured: set destination.bucket or destination.local_root")
}
