use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use super::{ObjectStore, StoredObject, listed};
use crate::error::Error;

/// In-process store. Counts writes so callers can assert on skipped work.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    puts: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: &str, body: impl Into<Bytes>) {
        self.objects.lock().await.insert(
            key.to_string(),
            StoredObject::new(body, "application/octet-stream"),
        );
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    /// Number of `put` calls so far.
    pub async fn put_count(&self) -> usize {
        *self.puts.lock().await
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str, start_after: Option<&str>) -> Result<Vec<String>, Error> {
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|k| listed(k, prefix, start_after))
            .cloned()
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Bytes, Error> {
        self.objects
            .lock()
            .await
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| Error::store(key, "no such key"))
    }

    async fn put(&self, key: &str, object: StoredObject) -> Result<(), Error> {
        self.objects.lock().await.insert(key.to_string(), object);
        *self.puts.lock().await += 1;
        Ok(())
    }
}
