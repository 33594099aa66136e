//! Addressable translatable text inside a feed.
//!
//! Positions are keyed by the owning entity's stable id plus the alert field,
//! never by array index, so translations follow an alert when the producer
//! reorders entities between generations.

use std::fmt;

use crate::gtfs_rt::translated_string::Translation;
use crate::gtfs_rt::{Alert, FeedEntity, FeedMessage, TranslatedString};

/// Alert fields carrying free text for riders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertField {
    HeaderText,
    DescriptionText,
    TtsHeaderText,
    TtsDescriptionText,
    CauseDetail,
    EffectDetail,
    ImageAlternativeText,
}

impl AlertField {
    pub const ALL: [AlertField; 7] = [
        AlertField::HeaderText,
        AlertField::DescriptionText,
        AlertField::TtsHeaderText,
        AlertField::TtsDescriptionText,
        AlertField::CauseDetail,
        AlertField::EffectDetail,
        AlertField::ImageAlternativeText,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertField::HeaderText => "header_text",
            AlertField::DescriptionText => "description_text",
            AlertField::TtsHeaderText => "tts_header_text",
            AlertField::TtsDescriptionText => "tts_description_text",
            AlertField::CauseDetail => "cause_detail",
            AlertField::EffectDetail => "effect_detail",
            AlertField::ImageAlternativeText => "image_alternative_text",
        }
    }

    fn get(self, alert: &Alert) -> Option<&TranslatedString> {
        match self {
            AlertField::HeaderText => alert.header_text.as_ref(),
            AlertField::DescriptionText => alert.description_text.as_ref(),
            AlertField::TtsHeaderText => alert.tts_header_text.as_ref(),
            AlertField::TtsDescriptionText => alert.tts_description_text.as_ref(),
            AlertField::CauseDetail => alert.cause_detail.as_ref(),
            AlertField::EffectDetail => alert.effect_detail.as_ref(),
            AlertField::ImageAlternativeText => alert.image_alternative_text.as_ref(),
        }
    }

    fn get_mut(self, alert: &mut Alert) -> Option<&mut TranslatedString> {
        match self {
            AlertField::HeaderText => alert.header_text.as_mut(),
            AlertField::DescriptionText => alert.description_text.as_mut(),
            AlertField::TtsHeaderText => alert.tts_header_text.as_mut(),
            AlertField::TtsDescriptionText => alert.tts_description_text.as_mut(),
            AlertField::CauseDetail => alert.cause_detail.as_mut(),
            AlertField::EffectDetail => alert.effect_detail.as_mut(),
            AlertField::ImageAlternativeText => alert.image_alternative_text.as_mut(),
        }
    }
}

impl fmt::Display for AlertField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of one translatable string: entity id plus field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    pub entity_id: String,
    pub field: AlertField,
}

impl FieldRef {
    pub fn new(entity_id: impl Into<String>, field: AlertField) -> Self {
        Self {
            entity_id: entity_id.into(),
            field,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alert {}, {}", self.entity_id, self.field)
    }
}

/// The only view of a feed the translation core needs.
pub trait TranslatableFeed {
    /// Every field position holding source-language text, in feed order.
    fn translatable_fields(&self, source_lang: &str) -> Vec<(FieldRef, String)>;

    fn source_text(&self, at: &FieldRef, source_lang: &str) -> Option<&str>;

    /// The localized variant for `lang` at `at`, if present.
    fn variant(&self, at: &FieldRef, lang: &str) -> Option<&str>;

    /// Adds (or replaces) the `lang` variant at `at`. The source-language
    /// text is never touched; returns `false` if nothing was written.
    fn write_variant(&mut self, at: &FieldRef, lang: &str, text: &str, source_lang: &str)
    -> bool;

    fn header_timestamp(&self) -> Option<u64>;
}

fn same_lang(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// The source text is the variant tagged with `source_lang`, falling back to
/// an untagged variant.
fn source_of<'a>(value: &'a TranslatedString, source_lang: &str) -> Option<&'a str> {
    let tagged = value.translation.iter().find(|t| {
        t.language
            .as_deref()
            .is_some_and(|lang| same_lang(lang, source_lang))
    });
    let untagged = || {
        value
            .translation
            .iter()
            .find(|t| t.language.as_deref().is_none_or(str::is_empty))
    };
    tagged
        .or_else(untagged)
        .map(|t| t.text.as_str())
        .filter(|text| !text.trim().is_empty())
}

fn live_alert<'a>(feed: &'a FeedMessage, entity_id: &str) -> Option<&'a Alert> {
    feed.entity
        .iter()
        .find(|e| e.id == entity_id && !is_deleted(e))
        .and_then(|e| e.alert.as_ref())
}

fn is_deleted(entity: &FeedEntity) -> bool {
    entity.is_deleted.unwrap_or(false)
}

impl TranslatableFeed for FeedMessage {
    fn translatable_fields(&self, source_lang: &str) -> Vec<(FieldRef, String)> {
        let mut out = Vec::new();
        for entity in self.entity.iter().filter(|e| !is_deleted(e)) {
            let Some(alert) = &entity.alert else {
                continue;
            };
            for field in AlertField::ALL {
                if let Some(text) = field.get(alert).and_then(|v| source_of(v, source_lang)) {
                    out.push((FieldRef::new(&entity.id, field), text.to_string()));
                }
            }
        }
        out
    }

    fn source_text(&self, at: &FieldRef, source_lang: &str) -> Option<&str> {
        live_alert(self, &at.entity_id)
            .and_then(|alert| at.field.get(alert))
            .and_then(|value| source_of(value, source_lang))
    }

    fn variant(&self, at: &FieldRef, lang: &str) -> Option<&str> {
        live_alert(self, &at.entity_id)
            .and_then(|alert| at.field.get(alert))
            .and_then(|value| {
                value.translation.iter().find(|t| {
                    t.language
                        .as_deref()
                        .is_some_and(|l| same_lang(l, lang))
                })
            })
            .map(|t| t.text.as_str())
    }

    fn write_variant(
        &mut self,
        at: &FieldRef,
        lang: &str,
        text: &str,
        source_lang: &str,
    ) -> bool {
        if same_lang(lang, source_lang) {
            return false;
        }
        let Some(value) = self
            .entity
            .iter_mut()
            .find(|e| e.id == at.entity_id && !is_deleted(e))
            .and_then(|e| e.alert.as_mut())
            .and_then(|alert| at.field.get_mut(alert))
        else {
            return false;
        };

        let existing = value.translation.iter_mut().find(|t| {
            t.language
                .as_deref()
                .is_some_and(|l| same_lang(l, lang))
        });
        match existing {
            Some(t) => t.text = text.to_string(),
            None => value.translation.push(Translation {
                text: text.to_string(),
                language: Some(lang.to_string()),
            }),
        }
        true
    }

    fn header_timestamp(&self) -> Option<u64> {
        self.header.timestamp
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::gtfs_rt::FeedHeader;

    pub(crate) fn text(value: &str, lang: Option<&str>) -> TranslatedString {
        TranslatedString {
            translation: vec![Translation {
                text: value.to_string(),
                language: lang.map(str::to_string),
            }],
        }
    }

    pub(crate) fn alert_entity(id: &str, header: &str, description: Option<&str>) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            alert: Some(Alert {
                header_text: Some(text(header, Some("en"))),
                description_text: description.map(|d| text(d, Some("en"))),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub(crate) fn feed(timestamp: u64, entity: Vec<FeedEntity>) -> FeedMessage {
        FeedMessage {
            header: FeedHeader {
                gtfs_realtime_version: "2.0".to_string(),
                timestamp: Some(timestamp),
                incrementality: None,
                feed_version: None,
            },
            entity,
        }
    }

    #[test]
    fn test_translatable_fields_in_feed_order() {
        let f = feed(
            1,
            vec![
                alert_entity("a1", "Delays", Some("Signal problem")),
                alert_entity("a2", "Shuttle", None),
            ],
        );
        let fields = f.translatable_fields("en");
        assert_eq!(
            fields,
            vec![
                (FieldRef::new("a1", AlertField::HeaderText), "Delays".to_string()),
                (FieldRef::new("a1", AlertField::DescriptionText), "Signal problem".to_string()),
                (FieldRef::new("a2", AlertField::HeaderText), "Shuttle".to_string()),
            ]
        );
    }

    #[test]
    fn test_untagged_text_counts_as_source() {
        let mut entity = alert_entity("a1", "ignored", None);
        entity.alert.as_mut().unwrap().header_text = Some(text("Elevator out", None));
        let f = feed(1, vec![entity]);
        let at = FieldRef::new("a1", AlertField::HeaderText);
        assert_eq!(f.source_text(&at, "en"), Some("Elevator out"));
    }

    #[test]
    fn test_deleted_and_blank_fields_are_skipped() {
        let mut deleted = alert_entity("gone", "Old", None);
        deleted.is_deleted = Some(true);
        let blank = alert_entity("blank", "   ", None);
        let f = feed(1, vec![deleted, blank]);
        assert!(f.translatable_fields("en").is_empty());
    }

    #[test]
    fn test_write_variant_adds_alongside_source() {
        let mut f = feed(1, vec![alert_entity("a1", "Delays", None)]);
        let at = FieldRef::new("a1", AlertField::HeaderText);

        assert!(f.write_variant(&at, "es", "Retrasos", "en"));
        assert!(f.write_variant(&at, "es", "Demoras", "en"));
        assert!(!f.write_variant(&at, "EN", "overwrite", "en"));

        assert_eq!(f.source_text(&at, "en"), Some("Delays"));
        assert_eq!(f.variant(&at, "es"), Some("Demoras"));
        let header = f.entity[0].alert.as_ref().unwrap().header_text.as_ref().unwrap();
        assert_eq!(header.translation.len(), 2);
    }

    #[test]
    fn test_write_variant_to_missing_position() {
        let mut f = feed(1, vec![alert_entity("a1", "Delays", None)]);
        let missing = FieldRef::new("a1", AlertField::CauseDetail);
        assert!(!f.write_variant(&missing, "es", "x", "en"));
        assert!(!f.write_variant(&FieldRef::new("zz", AlertField::HeaderText), "es", "x", "en"));
    }
}
