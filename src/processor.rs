//! Orchestrator: collects translatable units, deduplicates them, fans the
//! work out to a [`Translator`] under a concurrency cap and one deadline,
//! and merges the results back into the feed.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::diff::{TranslationUnit, plan_reuse};
use crate::error::TranslateError;
use crate::feed::{FieldRef, TranslatableFeed};
use crate::gtfs_rt::FeedMessage;
use crate::metrics::ProcessingMetrics;
use crate::translate::{TranslationRequest, TranslationResult, Translator};

#[derive(Debug, Clone)]
pub struct ProcessorOptions {
    pub target_langs: Vec<String>,
    pub source_lang: String,
    /// Maximum `translate_batch` calls in flight at once.
    pub concurrency_limit: usize,
    /// Deadline for the whole translation phase.
    pub timeout: Duration,
    /// Maximum unique strings per `translate_batch` call.
    pub batch_size: usize,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            target_langs: vec!["es-419".to_string()],
            source_lang: "en".to_string(),
            concurrency_limit: 20,
            timeout: Duration::from_secs(120),
            batch_size: 1000,
        }
    }
}

/// Deduplicated request plus, for each unique text, every position that
/// must receive its translation.
#[derive(Debug, Default)]
pub struct TranslationPlan {
    pub request: TranslationRequest,
    pub destinations: Vec<Vec<FieldRef>>,
}

impl TranslationPlan {
    pub fn from_units(units: &[TranslationUnit], target_langs: &[String]) -> Self {
        let mut plan = TranslationPlan {
            request: TranslationRequest {
                texts: Vec::new(),
                target_langs: target_langs.to_vec(),
            },
            destinations: Vec::new(),
        };
        let mut index: HashMap<&str, usize> = HashMap::new();
        for unit in units {
            match index.get(unit.text.as_str()) {
                Some(&i) => plan.destinations[i].push(unit.at.clone()),
                None => {
                    index.insert(&unit.text, plan.request.texts.len());
                    plan.request.texts.push(unit.text.clone());
                    plan.destinations.push(vec![unit.at.clone()]);
                }
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.request.texts.is_empty()
    }
}

/// Translates whatever the previous feed cannot supply and writes the
/// results into `new` as extra language variants.
///
/// Never fails: provider errors and the deadline are logged, counted in the
/// returned metrics, and leave the affected text in the source language.
#[tracing::instrument(skip_all, fields(translator = translator.name()))]
pub async fn process_feed(
    new: &mut FeedMessage,
    old: Option<&FeedMessage>,
    translator: &dyn Translator,
    options: &ProcessorOptions,
) -> ProcessingMetrics {
    let started = Instant::now();
    let mut metrics = ProcessingMetrics::new(translator.name());

    let reuse = plan_reuse(new, old, &options.target_langs, &options.source_lang);
    metrics.units_reused = reuse.reused;
    metrics.units_requested = reuse.pending.len();
    metrics.units_total = reuse.reused + reuse.pending.len();

    let plan = TranslationPlan::from_units(&reuse.pending, &options.target_langs);
    metrics.strings_requested = plan.request.texts.len();

    if !plan.is_empty() {
        translate_and_merge(new, &plan, translator, options, &mut metrics).await;
    }

    metrics.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        units_total = metrics.units_total,
        units_reused = metrics.units_reused,
        strings_requested = metrics.strings_requested,
        strings_translated = metrics.strings_translated,
        errors = metrics.errors,
        timed_out = metrics.timed_out,
        elapsed_ms = metrics.elapsed_ms,
        "Translation phase finished"
    );
    metrics
}

async fn translate_and_merge(
    new: &mut FeedMessage,
    plan: &TranslationPlan,
    translator: &dyn Translator,
    options: &ProcessorOptions,
    metrics: &mut ProcessingMetrics,
) {
    let batch_size = options.batch_size.max(1);
    let langs = &plan.request.target_langs;
    let semaphore = Semaphore::new(options.concurrency_limit.max(1));

    let chunks: Vec<&[String]> = plan.request.texts.chunks(batch_size).collect();
    let calls = chunks.iter().map(|chunk| {
        let semaphore = &semaphore;
        async move {
            let _permit = semaphore.acquire().await.ok();
            translator.translate_batch(chunk, langs).await
        }
    });

    let outcomes = match tokio::time::timeout(options.timeout, join_all(calls)).await {
        Ok(outcomes) => outcomes,
        Err(_) => {
            let err = TranslateError::TimeoutExceeded(options.timeout);
            warn!(error = %err, "Publishing without new translations");
            metrics.timed_out = true;
            metrics.errors += 1;
            metrics.strings_failed = plan.request.texts.len();
            return;
        }
    };

    for (chunk_index, (outcome, chunk)) in outcomes.into_iter().zip(&chunks).enumerate() {
        let offset = chunk_index * batch_size;
        match outcome {
            Ok(result) => merge_chunk(new, plan, offset, chunk.len(), result, options, metrics),
            Err(e) => {
                warn!(error = %e, strings = chunk.len(), "Translation batch failed; leaving source text");
                metrics.errors += 1;
                metrics.strings_failed += chunk.len();
            }
        }
    }
}

fn merge_chunk(
    new: &mut FeedMessage,
    plan: &TranslationPlan,
    offset: usize,
    len: usize,
    result: TranslationResult,
    options: &ProcessorOptions,
    metrics: &mut ProcessingMetrics,
) {
    let mut merged_langs = 0;
    for lang in &plan.request.target_langs {
        let Some(translated) = result.get(lang) else {
            warn!(lang, "Translator returned no results for language");
            metrics.errors += 1;
            continue;
        };
        if translated.len() != len {
            warn!(lang, got = translated.len(), expected = len, "Discarding misaligned translations");
            metrics.errors += 1;
            continue;
        }
        for (i, text) in translated.iter().enumerate() {
            for at in &plan.destinations[offset + i] {
                new.write_variant(at, lang, text, &options.source_lang);
            }
        }
        merged_langs += 1;
    }

    if merged_langs > 0 {
        metrics.strings_translated += len;
        metrics.units_translated += plan.destinations[offset..offset + len]
            .iter()
            .map(Vec::len)
            .sum::<usize>();
    } else {
        metrics.strings_failed += len;
    }
}
