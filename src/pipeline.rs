//! One translation run: fetch the source, reuse what the last published feed
//! already has, translate the rest, and publish to every destination.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::diff::should_publish;
use crate::error::TranslateError;
use crate::feed::{FeedFormat, SourceDocument, parse_feed, serialize_feed};
use crate::gtfs_rt::FeedMessage;
use crate::metrics::ProcessingMetrics;
use crate::processor::{ProcessorOptions, process_feed};
use crate::storage::{FeedLocation, ObjectStore};
use crate::translate::Translator;

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub metrics: ProcessingMetrics,
    /// Destinations written this run, in configuration order. Empty when the
    /// publish was skipped.
    pub published: Vec<String>,
}

/// Rejects a run that has nowhere to publish, would overwrite its own
/// input, or names a destination that cannot be written.
pub fn validate_urls(source_url: &str, dest_urls: &[String]) -> Result<(), TranslateError> {
    if dest_urls.is_empty() {
        return Err(TranslateError::Configuration(
            "DESTINATION_BUCKET_URLS must name at least one destination".to_string(),
        ));
    }
    if dest_urls.iter().any(|d| d == source_url) {
        return Err(TranslateError::Configuration(format!(
            "source URL matches one of the destinations: {source_url}"
        )));
    }
    for url in dest_urls {
        if let FeedLocation::Http(_) = url.parse::<FeedLocation>()? {
            return Err(TranslateError::Configuration(format!(
                "destination {url} is not writable; use s3:// or a local path"
            )));
        }
    }
    Ok(())
}

/// The destination whose previous contents seed translation reuse. JSON is
/// preferred because it carries the richest content.
pub fn reference_destination(dest_urls: &[String]) -> Option<&str> {
    dest_urls
        .iter()
        .find(|d| FeedFormat::from_url(d) == FeedFormat::Json)
        .or_else(|| dest_urls.first())
        .map(String::as_str)
}

/// Fetches the previously published feed. Anything unreadable counts as no
/// previous feed, which only costs a full retranslation.
async fn fetch_previous(store: &dyn ObjectStore, url: &str) -> Option<FeedMessage> {
    let location: FeedLocation = url.parse().ok()?;
    let bytes = match store.get(&location).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            info!(reference = url, "No previously published feed");
            return None;
        }
        Err(e) => {
            warn!(reference = url, error = %e, "Could not fetch previous feed");
            return None;
        }
    };
    match parse_feed(&bytes, FeedFormat::from_url(url)) {
        Ok(feed) => Some(feed),
        Err(e) => {
            warn!(reference = url, error = %e, "Previous feed is unreadable; ignoring it");
            None
        }
    }
}

#[tracing::instrument(skip_all, fields(source = source_url, destinations = dest_urls.len()))]
pub async fn run_translation(
    source_url: &str,
    dest_urls: &[String],
    store: &dyn ObjectStore,
    translator: &dyn Translator,
    options: &ProcessorOptions,
) -> Result<RunOutcome> {
    validate_urls(source_url, dest_urls)?;
    let source: FeedLocation = source_url.parse()?;
    let destinations = dest_urls
        .iter()
        .map(|d| d.parse::<FeedLocation>().map(|loc| (d.as_str(), loc)))
        .collect::<Result<Vec<_>, _>>()?;

    let bytes = store
        .get(&source)
        .await?
        .with_context(|| format!("source feed {source_url} does not exist"))?;
    let source_format = FeedFormat::from_url(source_url);
    let mut feed = parse_feed(&bytes, source_format)
        .with_context(|| format!("parsing source feed {source_url}"))?;
    let source_document = SourceDocument::capture(bytes, source_format)?;
    info!(entities = feed.entity.len(), format = ?source_format, "Source feed parsed");

    let previous = match reference_destination(dest_urls) {
        Some(reference) => {
            info!(reference, "Using reference destination");
            fetch_previous(store, reference).await
        }
        None => None,
    };

    let metrics = process_feed(&mut feed, previous.as_ref(), translator, options).await;

    if !should_publish(previous.as_ref(), &feed, &metrics) {
        info!("No translation changes detected; skipping publish");
        return Ok(RunOutcome {
            metrics,
            published: Vec::new(),
        });
    }

    let mut published = Vec::with_capacity(destinations.len());
    for (url, location) in &destinations {
        let format = FeedFormat::from_url(url);
        let body = serialize_feed(&feed, format, Some(&source_document))?;
        store
            .put(location, body, format.content_type())
            .await
            .with_context(|| format!("publishing to {url}"))?;
        published.push(url.to_string());
    }

    Ok(RunOutcome { metrics, published })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reference_prefers_json() {
        let dests = urls(&["s3://d/a.pb", "s3://d/a.json", "s3://d/b.json"]);
        assert_eq!(reference_destination(&dests), Some("s3://d/a.json"));
        assert_eq!(reference_destination(&urls(&["s3://d/a.pb"])), Some("s3://d/a.pb"));
        assert_eq!(reference_destination(&[]), None);
    }

    #[test]
    fn test_validate_urls() {
        assert!(validate_urls("s3://s/a.pb", &urls(&["s3://d/a.pb"])).is_ok());
        assert!(matches!(
            validate_urls("s3://s/a.pb", &[]),
            Err(TranslateError::Configuration(_))
        ));
        assert!(matches!(
            validate_urls("s3://same/path", &urls(&["s3://d/x.pb", "s3://same/path"])),
            Err(TranslateError::Configuration(_))
        ));
    }

    #[test]
    fn test_http_destination_is_rejected() {
        assert!(matches!(
            validate_urls("s3://s/a.pb", &urls(&["s3://d/a.pb", "https://cdn.example.com/a.json"])),
            Err(TranslateError::Configuration(_))
        ));
        assert!(validate_urls("https://cdn.example.com/a.pb", &urls(&["s3://d/a.pb"])).is_ok());
    }

    #[tokio::test]
    async fn test_unwritable_destination_publishes_nothing() {
        use crate::storage::MemoryStore;
        use crate::translate::MockTranslator;

        let store = MemoryStore::new();
        store.insert(
            "s3://s/a.json",
            r#"{"header": {"gtfs_realtime_version": "2.0", "timestamp": 1}, "entity": []}"#,
        );
        let dests = urls(&["s3://d/a.pb", "https://cdn.example.com/a.json"]);

        let err = run_translation(
            "s3://s/a.json",
            &dests,
            &store,
            &MockTranslator::default(),
            &ProcessorOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<TranslateError>(),
            Some(TranslateError::Configuration(_))
        ));
        assert!(store.puts().is_empty());
    }
}
