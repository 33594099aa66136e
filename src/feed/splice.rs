//! Protobuf republishing that keeps what the generated types cannot see.
//!
//! prost drops unknown fields and extensions on decode, so a feed that is
//! decoded, translated and re-encoded would lose producer extensions and any
//! field newer than the bundled schema. Instead the output is rebuilt from
//! the source bytes: untouched entities are copied verbatim, and an entity
//! whose only change is its alert keeps every other original field with the
//! new alert spliced in.

use std::collections::HashMap;

use anyhow::{Result, bail};
use prost::Message;
use prost::encoding::{WireType, decode_key, decode_varint, encode_key, encode_varint};

use crate::gtfs_rt::{FeedEntity, FeedHeader, FeedMessage};

const FEED_HEADER: u32 = 1;
const FEED_ENTITY: u32 = 2;
const ENTITY_ALERT: u32 = 5;

/// Field numbers the bundled schema defines on `Alert`. Anything else in an
/// original alert is an extension and is carried into the spliced alert.
const ALERT_FIELDS: [u32; 14] = [1, 5, 6, 7, 8, 10, 11, 12, 13, 14, 15, 16, 17, 18];

/// One field record of an encoded message.
struct RawField<'a> {
    number: u32,
    /// Value bytes. For length-delimited fields this excludes the length prefix.
    payload: &'a [u8],
    /// The whole record, key included.
    record: &'a [u8],
}

fn take<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if buf.len() < len {
        bail!("truncated field: need {len} bytes, {} left", buf.len());
    }
    let (head, rest) = buf.split_at(len);
    *buf = rest;
    Ok(head)
}

fn raw_fields(bytes: &[u8]) -> Result<Vec<RawField<'_>>> {
    let mut buf = bytes;
    let mut fields = Vec::new();
    while !buf.is_empty() {
        let start = buf;
        let (number, wire_type) = decode_key(&mut buf)?;
        let payload = match wire_type {
            WireType::Varint => {
                let before = buf;
                decode_varint(&mut buf)?;
                &before[..before.len() - buf.len()]
            }
            WireType::SixtyFourBit => take(&mut buf, 8)?,
            WireType::ThirtyTwoBit => take(&mut buf, 4)?,
            WireType::LengthDelimited => {
                let len = usize::try_from(decode_varint(&mut buf)?)?;
                take(&mut buf, len)?
            }
            WireType::StartGroup | WireType::EndGroup => {
                bail!("field {number} uses group encoding, which is not supported")
            }
        };
        let used = start.len() - buf.len();
        fields.push(RawField {
            number,
            payload,
            record: &start[..used],
        });
    }
    Ok(fields)
}

fn put_len_delimited(out: &mut Vec<u8>, number: u32, payload: &[u8]) {
    encode_key(number, WireType::LengthDelimited, out);
    encode_varint(payload.len() as u64, out);
    out.extend_from_slice(payload);
}

fn put_message(out: &mut Vec<u8>, number: u32, message: &impl Message) {
    put_len_delimited(out, number, &message.encode_to_vec());
}

/// Encodes `feed` using `original` (the encoded source feed) as the base.
///
/// - The header is copied verbatim when it decodes equal to `feed.header`.
/// - Entities follow `feed` order and are matched to the original by id.
///   A matched entity that decodes equal is copied verbatim. One that only
///   differs in its alert keeps its other records, and the alert is
///   re-encoded with the original alert's extension fields appended.
///   Anything else is encoded from `feed`.
/// - Top-level records other than header and entities (feed extensions) are
///   appended unchanged.
pub(crate) fn splice_protobuf(feed: &FeedMessage, original: &[u8]) -> Result<Vec<u8>> {
    let fields = raw_fields(original)?;
    let mut out = Vec::with_capacity(original.len());

    let original_header = fields.iter().find(|f| f.number == FEED_HEADER);
    match original_header {
        Some(raw) if FeedHeader::decode(raw.payload)? == feed.header => {
            out.extend_from_slice(raw.record);
        }
        _ => put_message(&mut out, FEED_HEADER, &feed.header),
    }

    let mut by_id: HashMap<String, &RawField<'_>> = HashMap::new();
    for raw in fields.iter().filter(|f| f.number == FEED_ENTITY) {
        let id = FeedEntity::decode(raw.payload)?.id;
        by_id.entry(id).or_insert(raw);
    }

    for entity in &feed.entity {
        match by_id.get(entity.id.as_str()) {
            Some(raw) => splice_entity(&mut out, entity, raw)?,
            None => put_message(&mut out, FEED_ENTITY, entity),
        }
    }

    for raw in fields
        .iter()
        .filter(|f| f.number != FEED_HEADER && f.number != FEED_ENTITY)
    {
        out.extend_from_slice(raw.record);
    }
    Ok(out)
}

fn splice_entity(out: &mut Vec<u8>, entity: &FeedEntity, raw: &RawField<'_>) -> Result<()> {
    let mut decoded = FeedEntity::decode(raw.payload)?;
    if decoded == *entity {
        out.extend_from_slice(raw.record);
        return Ok(());
    }
    decoded.alert.clone_from(&entity.alert);
    if decoded != *entity {
        put_message(out, FEED_ENTITY, entity);
        return Ok(());
    }

    let mut payload = Vec::with_capacity(raw.payload.len());
    let mut original_alert: Option<&[u8]> = None;
    for field in raw_fields(raw.payload)? {
        if field.number == ENTITY_ALERT {
            original_alert = Some(field.payload);
        } else {
            payload.extend_from_slice(field.record);
        }
    }

    if let Some(alert) = &entity.alert {
        let mut body = alert.encode_to_vec();
        if let Some(original_alert) = original_alert {
            for field in raw_fields(original_alert)? {
                if !ALERT_FIELDS.contains(&field.number) {
                    body.extend_from_slice(field.record);
                }
            }
        }
        put_len_delimited(&mut payload, ENTITY_ALERT, &body);
    }

    put_len_delimited(out, FEED_ENTITY, &payload);
    Ok(())
}
