//! Blob storage behind one small async trait: S3 in production, the local
//! filesystem for offline runs, memory for tests.

mod local;
mod memory;
#[cfg(feature = "s3")]
mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Error;

pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::{S3Settings, S3Store};

/// An object body plus the HTTP metadata it is served with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
    pub content_encoding: Option<String>,
}

impl StoredObject {
    pub fn new(body: impl Into<Bytes>, content_type: &str) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.to_string(),
            content_encoding: None,
        }
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.content_encoding = Some(encoding.to_string());
        self
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every key under `prefix` sorting after `start_after`, in key order.
    /// Implementations page through the whole listing.
    async fn list(&self, prefix: &str, start_after: Option<&str>) -> Result<Vec<String>, Error>;

    async fn get(&self, key: &str) -> Result<Bytes, Error>;

    /// Writes or overwrites `key`.
    async fn put(&self, key: &str, object: StoredObject) -> Result<(), Error>;
}

/// Shared filter for stores that list from an in-memory key set.
fn listed(key: &str, prefix: &str, start_after: Option<&str>) -> bool {
    key.starts_with(prefix) && start_after.is_none_or(|after| key > after)
}
