use chrono::NaiveDate;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("parse error: {reason}")]
    Parse { reason: String },

    #[error("protocol error: {reason}")]
    Protocol { reason: String },

    #[error("unsupported event kind: {0}")]
    UnsupportedEventKind(String),

    #[error("unknown {market_type} market index {market_index}")]
    UnknownMarket {
        market_type: &'static str,
        market_index: u16,
    },

    #[error("events date {events_date:?} and txns date {txns_date:?} do not match")]
    JoinMismatch {
        events_date: Option<NaiveDate>,
        txns_date: Option<NaiveDate>,
    },

    #[error("catalog bootstrap failed: {reason}")]
    Catalog { reason: String },

    #[error("listing {prefix} failed: {reason}")]
    Listing { prefix: String, reason: String },

    #[error("object store error on {key}: {reason}")]
    Store { key: String, reason: String },

    #[error("watermark error: {reason}")]
    Watermark { reason: String },

    #[error("idl error: {reason}")]
    Idl { reason: String },

    #[error("config error: {reason}")]
    Config { reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that abort the whole invocation rather than one kind's pass.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownMarket { .. }
                | Self::JoinMismatch { .. }
                | Self::Catalog { .. }
                | Self::Listing { .. }
        )
    }

    /// Errors worth retrying: the store or the filesystem may answer
    /// differently next time. Decode errors never will.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Io(_))
    }

    pub(crate) fn store(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Store {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
