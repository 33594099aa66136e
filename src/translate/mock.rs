use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{TranslationResult, Translator};
use crate::error::TranslateError;

/// Behaviour of [`MockTranslator`].
#[derive(Debug, Clone)]
pub enum MockMode {
    /// `"[lang] text"` for every text and language.
    Prefix,
    /// Every call fails with a provider error carrying this message.
    Fail(String),
    /// Sleeps before answering like [`MockMode::Prefix`].
    Delay(Duration),
}

/// Offline translator for dry runs and tests. Makes no network calls.
pub struct MockTranslator {
    mode: MockMode,
    calls: AtomicUsize,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `translate_batch` calls that reached the mock.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prefixed(texts: &[String], target_langs: &[String]) -> TranslationResult {
        target_langs
            .iter()
            .map(|lang| {
                let translated = texts.iter().map(|t| format!("[{lang}] {t}")).collect();
                (lang.clone(), translated)
            })
            .collect()
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new(MockMode::Prefix)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        target_langs: &[String],
    ) -> Result<TranslationResult, TranslateError> {
        if texts.is_empty() {
            return Ok(TranslationResult::new());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            MockMode::Prefix => Ok(Self::prefixed(texts, target_langs)),
            MockMode::Fail(message) => Err(TranslateError::Provider {
                status: 500,
                body: message.clone(),
            }),
            MockMode::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Self::prefixed(texts, target_langs))
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
