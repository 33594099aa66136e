//! Where feeds come from and where they are published.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::TranslateError;

/// A parsed feed URL: `s3://bucket/key`, `http(s)://...`, or a local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    S3 { bucket: String, key: String },
    Http(String),
    Local(PathBuf),
}

impl FromStr for FeedLocation {
    type Err = TranslateError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let url = url.trim();
        if let Some(rest) = url.strip_prefix("s3://") {
            return match rest.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(FeedLocation::S3 {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }),
                _ => Err(TranslateError::Configuration(format!(
                    "S3 URL must look like s3://bucket/key, got '{url}'"
                ))),
            };
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(FeedLocation::Http(url.to_string()));
        }
        if url.is_empty() {
            return Err(TranslateError::Configuration("empty feed URL".to_string()));
        }
        Ok(FeedLocation::Local(PathBuf::from(url)))
    }
}

impl fmt::Display for FeedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedLocation::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            FeedLocation::Http(url) => f.write_str(url),
            FeedLocation::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Reads and writes whole feed objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns `None` when nothing exists at `location` yet.
    async fn get(&self, location: &FeedLocation) -> Result<Option<Vec<u8>>>;

    async fn put(&self, location: &FeedLocation, body: Vec<u8>, content_type: &str) -> Result<()>;
}

/// In-process store for dry runs and tests. Records every put.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    puts: Mutex<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an object without counting it as a put.
    pub fn insert(&self, url: &str, body: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                url.to_string(),
                StoredObject {
                    body: body.into(),
                    content_type: String::new(),
                },
            );
        }
    }

    pub fn object(&self, url: &str) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(url).cloned()
    }

    /// URLs written through [`ObjectStore::put`], in order.
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, location: &FeedLocation) -> Result<Option<Vec<u8>>> {
        Ok(self.object(&location.to_string()).map(|o| o.body))
    }

    async fn put(&self, location: &FeedLocation, body: Vec<u8>, content_type: &str) -> Result<()> {
        let url = location.to_string();
        self.objects
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?
            .insert(
                url.clone(),
                StoredObject {
                    body,
                    content_type: content_type.to_string(),
                },
            );
        self.puts
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?
            .push(url);
        Ok(())
    }
}
