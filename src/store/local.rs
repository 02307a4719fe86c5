use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{ObjectStore, StoredObject, listed};
use crate::error::Error;

/// Maps object keys onto files under `root`. Content metadata is not kept.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn key(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, prefix: &str, start_after: Option<&str>) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::store(&dir.display().to_string(), e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key(&path)
                    && listed(&key, prefix, start_after)
                {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Bytes, Error> {
        fs::read(self.path(key))
            .await
            .map(Bytes::from)
            .map_err(|e| Error::store(key, e))
    }

    async fn put(&self, key: &str, object: StoredObject) -> Result<(), Error> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::store(key, e))?;
        }
        fs::write(&path, &object.body)
            .await
            .map_err(|e| Error::store(key, e))
    }
}
