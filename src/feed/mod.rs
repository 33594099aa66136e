//! Feed codec and translatable-field access.
//!
//! [`parse_feed`] / [`serialize_feed`] move between bytes and
//! [`FeedMessage`](crate::gtfs_rt::FeedMessage) in either wire format.
//! [`TranslatableFeed`] is the narrow view the translation core works through.

mod codec;
pub mod enum_names;
mod fields;
mod splice;

pub use codec::{FeedFormat, SourceDocument, parse_feed, serialize_feed};
pub use fields::{AlertField, FieldRef, TranslatableFeed};

#[cfg(test)]
pub(crate) use fields::tests as fixtures;
