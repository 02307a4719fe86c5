//! Run configuration, loaded from TOML. Every field has a default so an
//! empty file is a valid config.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;
use crate::events::DRIFT_PROGRAM_ID;
use crate::fetch::{Backoff, FetchScheduler, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub program_id: String,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub watermark_dir: PathBuf,
    /// Market snapshot JSON; a local path or, with `catalog_key`, a key in
    /// the source bucket.
    pub catalog_path: Option<PathBuf>,
    pub catalog_key: Option<String>,
    /// Program IDL used to decode transaction logs.
    pub idl_path: Option<PathBuf>,
    pub fetch: FetchConfig,
    /// Event kinds processed concurrently for one date.
    pub kind_concurrency: usize,
    pub exclusions: Exclusions,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            program_id: DRIFT_PROGRAM_ID.to_string(),
            source: SourceConfig::default(),
            destination: DestinationConfig::default(),
            watermark_dir: PathBuf::from("./out"),
            catalog_path: None,
            catalog_key: None,
            idl_path: None,
            fetch: FetchConfig::default(),
            kind_concurrency: 9,
            exclusions: Exclusions::default(),
        }
    }
}

impl ArchiveConfig {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            reason: format!("reading {}: {e}", path.display()),
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.program_id.trim().is_empty() {
            return Err(Error::Config {
                reason: "program_id must not be empty".into(),
            });
        }
        if self.fetch.concurrency == 0 || self.kind_concurrency == 0 {
            return Err(Error::Config {
                reason: "concurrency settings must be at least 1".into(),
            });
        }
        if self.destination.bucket.is_some() && self.destination.local_root.is_some() {
            return Err(Error::Config {
                reason: "set either destination.bucket or destination.local_root, not both".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub bucket: String,
    pub events_prefix: String,
    pub txns_prefix: String,
    /// Days before the start date where listing begins.
    pub listing_lookback_days: u32,
    /// Read from a local directory instead of the bucket.
    pub local_root: Option<PathBuf>,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bucket: "drift-topledger".to_string(),
            events_prefix: "drift/events".to_string(),
            txns_prefix: "drift/txns".to_string(),
            listing_lookback_days: 7,
            local_root: None,
            profile: None,
            region: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub bucket: Option<String>,
    pub local_root: Option<PathBuf>,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub concurrency: usize,
    pub max_attempts: usize,
    pub delay_ms: u64,
    pub backoff: Backoff,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_attempts: 3,
            delay_ms: 3_000,
            backoff: Backoff::Fixed,
        }
    }
}

impl FetchConfig {
    pub fn scheduler(&self) -> FetchScheduler {
        FetchScheduler::new(
            self.concurrency,
            RetryPolicy::new(self.max_attempts, self.delay_ms, self.backoff),
        )
    }
}

/// Source rows dropped before decoding, by `args.userAuthority`. Empty by
/// default: every record is archived unless an operator opts in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Exclusions {
    pub settle_pnl_authorities: Vec<String>,
    pub deposit_authorities: Vec<String>,
}
