//! Protobuf and JSON codecs for GTFS Realtime feeds.

use anyhow::{Context, Result};
use prost::Message;
use serde_json::Value;

use super::splice::splice_protobuf;
use crate::gtfs_rt::FeedMessage;

/// Wire format of a feed, chosen from the object's URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Protobuf,
    Json,
}

impl FeedFormat {
    /// `.json` objects are JSON; everything else is treated as protobuf.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.to_ascii_lowercase().ends_with(".json") {
            FeedFormat::Json
        } else {
            FeedFormat::Protobuf
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            FeedFormat::Protobuf => "application/x-protobuf",
            FeedFormat::Json => "application/json",
        }
    }
}

/// Decodes a GTFS-RT [`FeedMessage`] from raw bytes in the given format.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid `FeedMessage` in `format`.
pub fn parse_feed(bytes: &[u8], format: FeedFormat) -> Result<FeedMessage> {
    match format {
        FeedFormat::Protobuf => {
            FeedMessage::decode(bytes).context("invalid protobuf FeedMessage")
        }
        FeedFormat::Json => serde_json::from_slice(bytes).context("invalid JSON FeedMessage"),
    }
}

/// The source feed as it arrived, kept so a republish can carry what the
/// GTFS-RT types do not model.
#[derive(Debug, Clone)]
pub enum SourceDocument {
    Json(Value),
    Protobuf(Vec<u8>),
}

impl SourceDocument {
    pub fn capture(bytes: Vec<u8>, format: FeedFormat) -> Result<Self> {
        match format {
            FeedFormat::Protobuf => Ok(SourceDocument::Protobuf(bytes)),
            FeedFormat::Json => serde_json::from_slice(&bytes)
                .map(SourceDocument::Json)
                .context("feed is not a JSON document"),
        }
    }
}

/// Encodes a feed in the given format.
///
/// `source` is the document `feed` was parsed from, if any. Protobuf output
/// from a protobuf source is spliced over the source bytes, so unknown fields
/// and extensions survive. JSON output from a JSON source gets back any keys
/// the schema does not know about. Standard fields always come from `feed`.
pub fn serialize_feed(
    feed: &FeedMessage,
    format: FeedFormat,
    source: Option<&SourceDocument>,
) -> Result<Vec<u8>> {
    match (format, source) {
        (FeedFormat::Protobuf, Some(SourceDocument::Protobuf(original))) => {
            splice_protobuf(feed, original)
        }
        (FeedFormat::Protobuf, _) => Ok(feed.encode_to_vec()),
        (FeedFormat::Json, source) => {
            let mut value = serde_json::to_value(feed)?;
            prune_nulls(&mut value);
            if let Some(SourceDocument::Json(original)) = source {
                merge_extras(&mut value, original);
            }
            Ok(serde_json::to_vec(&value)?)
        }
    }
}

fn prune_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(prune_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(prune_nulls),
        _ => {}
    }
}

/// Copies keys present in `original` but missing from `target`, recursively.
/// Arrays of objects carrying an `id` are paired by id (entity lists can be
/// reordered); other arrays are paired by position.
fn merge_extras(target: &mut Value, original: &Value) {
    match (target, original) {
        (Value::Object(target), Value::Object(original)) => {
            for (key, orig) in original {
                match target.get_mut(key) {
                    Some(existing) => merge_extras(existing, orig),
                    None => {
                        target.insert(key.clone(), orig.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(original)) => {
            let keyed = original.iter().all(|v| v.get("id").is_some());
            if keyed {
                for item in target.iter_mut() {
                    let Some(id) = item.get("id").cloned() else {
                        continue;
                    };
                    if let Some(orig) = original.iter().find(|o| o.get("id") == Some(&id)) {
                        merge_extras(item, orig);
                    }
                }
            } else {
                for (item, orig) in target.iter_mut().zip(original) {
                    merge_extras(item, orig);
                }
            }
        }
        _ => {}
    }
}
