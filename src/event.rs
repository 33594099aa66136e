//! Invocation-event detection.
//!
//! An S3 `ObjectCreated` notification names the feed that just landed; its
//! first record overrides the configured source URL.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Record {
    s3: Option<S3Entity>,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: Bucket,
    object: Object,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Object {
    key: String,
}

/// Returns `s3://bucket/key` for an S3 event, `None` for any other payload.
///
/// Object keys arrive form-encoded, so `+` decodes to a space before the
/// percent escapes are resolved.
pub fn source_from_event(event: &Value) -> Option<String> {
    let record = event.get("Records")?.as_array()?.first()?;
    let entity = serde_json::from_value::<Record>(record.clone()).ok()?.s3?;

    let form = entity.object.key.replace('+', " ");
    let key = match urlencoding::decode(&form) {
        Ok(key) => key.into_owned(),
        Err(_) => form.clone(),
    };
    Some(format!("s3://{}/{}", entity.bucket.name, key))
}
