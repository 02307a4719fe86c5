//! Per-kind "archived through" dates. The only state that outlives a run.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::error::Error;
use crate::events::EventKind;

#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Last date fully archived for `kind`; `None` when never processed.
    async fn last_processed(&self, kind: EventKind) -> Result<Option<NaiveDate>, Error>;

    /// Records `date` as fully archived for `kind`.
    async fn advance(&self, kind: EventKind, date: NaiveDate) -> Result<(), Error>;

    /// Whether `(kind, date)` still needs work.
    async fn is_pending(&self, kind: EventKind, date: NaiveDate) -> Result<bool, Error> {
        Ok(self
            .last_processed(kind)
            .await?
            .is_none_or(|last| date > last))
    }
}

/// One `{dir}/{Kind}.txt` file per kind holding a `YYYYMMDD` date.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    dir: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, kind: EventKind) -> PathBuf {
        self.dir.join(format!("{kind}.txt"))
    }
}

/// Accepts the written `%Y%m%d` form as well as `%Y-%m-%d`.
pub fn parse_watermark(text: &str) -> Result<NaiveDate, Error> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|e| Error::Watermark {
            reason: format!("unreadable watermark {text:?}: {e}"),
        })
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn last_processed(&self, kind: EventKind) -> Result<Option<NaiveDate>, Error> {
        let path = self.path(kind);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => parse_watermark(&text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Watermark {
                reason: format!("reading {}: {e}", path.display()),
            }),
        }
    }

    async fn advance(&self, kind: EventKind, date: NaiveDate) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(kind);
        tokio::fs::write(&path, date.format("%Y%m%d").to_string())
            .await
            .map_err(|e| Error::Watermark {
                reason: format!("writing {}: {e}", path.display()),
            })?;
        tracing::info!(%kind, %date, "watermark advanced");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    marks: Mutex<HashMap<EventKind, NaiveDate>>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marks(marks: impl IntoIterator<Item = (EventKind, NaiveDate)>) -> Self {
        Self {
            marks: Mutex::new(marks.into_iter().collect()),
        }
    }
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn last_processed(&self, kind: EventKind) -> Result<Option<NaiveDate>, Error> {
        Ok(self.marks.lock().await.get(&kind).copied())
    }

    async fn advance(&self, kind: EventKind, date: NaiveDate) -> Result<(), Error> {
        self.marks.lock().await.insert(kind, date);
        Ok(())
    }
}
