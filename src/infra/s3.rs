use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use crate::fetch::{HttpClient, fetch_bytes};
use crate::storage::{FeedLocation, ObjectStore};

/// [`ObjectStore`] over S3, plain HTTP(S) reads, and the local filesystem.
pub struct S3Store {
    client: aws_sdk_s3::Client,
    http: Arc<dyn HttpClient>,
}

impl S3Store {
    pub fn new(config: &aws_config::SdkConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
            http,
        }
    }

    async fn get_s3(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let output = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                debug!(bucket, key, "S3 object does not exist");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("S3 GetObject failed for s3://{bucket}/{key}"));
            }
        };

        let body = output
            .body
            .collect()
            .await
            .with_context(|| format!("reading s3://{bucket}/{key}"))?;
        Ok(Some(body.into_bytes().to_vec()))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[tracing::instrument(skip(self), fields(location = %location))]
    async fn get(&self, location: &FeedLocation) -> Result<Option<Vec<u8>>> {
        let bytes = match location {
            FeedLocation::S3 { bucket, key } => self.get_s3(bucket, key).await?,
            FeedLocation::Http(url) => fetch_bytes(self.http.as_ref(), url).await?,
            FeedLocation::Local(path) => match std::fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
                Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
            },
        };
        debug!(bytes = bytes.as_ref().map(Vec::len), "Feed object fetched");
        Ok(bytes)
    }

    #[tracing::instrument(skip(self, body), fields(location = %location, bytes = body.len()))]
    async fn put(&self, location: &FeedLocation, body: Vec<u8>, content_type: &str) -> Result<()> {
        match location {
            FeedLocation::S3 { bucket, key } => {
                self.client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(ByteStream::from(body))
                    .content_type(content_type)
                    .send()
                    .await
                    .with_context(|| format!("S3 PutObject failed for {location}"))?;
            }
            FeedLocation::Local(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
            }
            FeedLocation::Http(url) => bail!("cannot publish to HTTP destination {url}"),
        }
        info!(content_type, "Published feed");
        Ok(())
    }
}
