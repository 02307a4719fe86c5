use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use super::{ObjectStore, StoredObject};
use crate::error::Error;

/// Connection settings for one bucket.
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub profile: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Builds a client from the default credential chain, narrowed by the
    /// optional profile, region and endpoint overrides.
    pub async fn connect(settings: &S3Settings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &settings.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        tracing::debug!(bucket = %settings.bucket, "s3 client configured");
        Self::new(Client::new(&sdk_config), &settings.bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, prefix: &str, start_after: Option<&str>) -> Result<Vec<String>, Error> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_start_after(start_after.map(String::from))
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| Error::Listing {
                prefix: format!("s3://{}/{prefix}", self.bucket),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(String::from)));
        }
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Bytes, Error> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::store(key, DisplayErrorContext(&e)))?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| Error::store(key, e))?;
        Ok(data.into_bytes())
    }

    async fn put(&self, key: &str, object: StoredObject) -> Result<(), Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(object.body))
            .content_type(object.content_type)
            .set_content_encoding(object.content_encoding)
            .send()
            .await
            .map_err(|e| Error::store(key, DisplayErrorContext(&e)))?;
        Ok(())
    }
}
