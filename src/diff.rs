//! Translation reuse against the previously published feed, and the
//! publish decision.

use std::collections::HashMap;

use tracing::debug;

use crate::feed::{FieldRef, TranslatableFeed};
use crate::gtfs_rt::FeedMessage;
use crate::metrics::ProcessingMetrics;

/// A source string and the exact position it must be written back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub at: FieldRef,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct ReusePlan {
    /// Units that need a translation call, in feed order.
    pub pending: Vec<TranslationUnit>,
    /// Units whose translations were carried forward.
    pub reused: usize,
}

/// Carries forward translations for unchanged fields and returns the rest.
///
/// A field is reused when the previous feed has the same position with a
/// byte-identical source text and a variant for every target language.
/// Without a previous feed every unit is pending.
pub fn plan_reuse(
    new: &mut FeedMessage,
    old: Option<&FeedMessage>,
    target_langs: &[String],
    source_lang: &str,
) -> ReusePlan {
    let units: Vec<TranslationUnit> = new
        .translatable_fields(source_lang)
        .into_iter()
        .map(|(at, text)| TranslationUnit { at, text })
        .collect();

    let Some(old) = old else {
        debug!(units = units.len(), "No previous feed; translating everything");
        return ReusePlan {
            pending: units,
            reused: 0,
        };
    };

    let previous: HashMap<FieldRef, String> =
        old.translatable_fields(source_lang).into_iter().collect();

    let mut plan = ReusePlan::default();
    for unit in units {
        let carried = previous
            .get(&unit.at)
            .filter(|old_text| **old_text == unit.text)
            .and_then(|_| {
                target_langs
                    .iter()
                    .map(|lang| old.variant(&unit.at, lang).map(|t| (lang, t.to_string())))
                    .collect::<Option<Vec<_>>>()
            });

        match carried {
            Some(variants) => {
                for (lang, text) in variants {
                    new.write_variant(&unit.at, lang, &text, source_lang);
                }
                plan.reused += 1;
            }
            None => plan.pending.push(unit),
        }
    }

    debug!(
        reused = plan.reused,
        pending = plan.pending.len(),
        "Reuse plan computed"
    );
    plan
}

/// Publishing is skipped only when a previous feed exists, its header
/// timestamp equals the new one, and no unit needed translation.
pub fn should_publish(
    old: Option<&FeedMessage>,
    new: &FeedMessage,
    metrics: &ProcessingMetrics,
) -> bool {
    match old {
        None => true,
        Some(old) if old.header_timestamp() != new.header_timestamp() => true,
        Some(_) => metrics.units_requested > 0,
    }
}
