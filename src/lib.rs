#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::dbg_macro,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::panic,
    )
)]

pub mod archiver;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod logs;
pub mod partition;
pub mod source;
pub mod store;
pub mod types;
pub mod watermark;
pub mod writer;

pub use archiver::{ArchiveOptions, Archiver, DateReport, KindOutcome, RunReport};
pub use catalog::{CatalogSource, MarketCatalog, bootstrap};
pub use config::ArchiveConfig;
pub use error::Error;
pub use events::{EventDecoder, EventKind, EventRecord, MarketType};
pub use logs::{AnchorLogDecoder, Idl, LogDecoder, LogIndex};
pub use partition::{PartitionKey, PartitionTarget, Partitioner, Scope};
pub use source::{EventSource, FileRows, MalformedRow, ParquetEventSource};
pub use store::{ObjectStore, StoredObject};
pub use types::{EventMetadata, ProgramEvent, RawEvent, TxLogRow};
pub use watermark::{FileWatermarkStore, WatermarkStore};
