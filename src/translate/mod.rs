//! Translation back-ends behind one capability.
//!
//! [`Translator`] is implemented by three Smartling strategies
//! ([`SmartlingRouterTranslator`], [`SmartlingJobBatchesTranslator`],
//! [`SmartlingFileTranslator`]) that share a [`SmartlingApi`] and therefore
//! one [`TokenCache`], plus the offline [`MockTranslator`].

mod file_mt;
mod job;
mod job_batches;
mod mock;
mod router;
mod smartling;
mod token;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use file_mt::SmartlingFileTranslator;
pub use job::{JobState, JobTracker, RemoteStatus};
pub use job_batches::{LOCALES_FIELD, SmartlingJobBatchesTranslator, upload_fields};
pub use mock::{MockMode, MockTranslator};
pub use router::SmartlingRouterTranslator;
pub use smartling::{ApiEndpoint, Credentials, DEFAULT_BASE_URL, SmartlingApi, SmartlingAuth};
pub use token::{Authenticator, IssuedToken, TokenCache};

#[cfg(test)]
pub(crate) use smartling::tests as smartling_fixtures;

use crate::error::TranslateError;

/// Target language -> translations, index-aligned with the request texts.
/// A language is either fully present or absent.
pub type TranslationResult = BTreeMap<String, Vec<String>>;

/// Unique source texts (order significant) and the languages wanted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationRequest {
    pub texts: Vec<String>,
    pub target_langs: Vec<String>,
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `texts` into every language in `target_langs`.
    ///
    /// `result[lang][i]` is the translation of `texts[i]`. Empty `texts`
    /// returns an empty result without touching the network.
    async fn translate_batch(
        &self,
        texts: &[String],
        target_langs: &[String],
    ) -> Result<TranslationResult, TranslateError>;

    /// Short identifier for logs and metrics.
    fn name(&self) -> &'static str;
}
