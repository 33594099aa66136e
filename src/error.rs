//! Error taxonomy for the translation layer.

use std::time::Duration;

use thiserror::Error;

use crate::translate::JobState;

/// Failures raised while talking to a translation provider or orchestrating it.
///
/// Only [`TranslateError::AuthFailure`] is recovered inside the translation
/// layer (one forced token refresh and retry). Everything else reaches the
/// orchestrator, which degrades to publishing untranslated text, except
/// [`TranslateError::Configuration`] which aborts a run before any side effect.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("provider rejected credentials: {0}")]
    AuthFailure(String),

    #[error("provider returned status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("translation job {handle} failed with status {status}")]
    JobFailed { handle: String, status: String },

    #[error("translation phase exceeded {0:?}")]
    TimeoutExceeded(Duration),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed provider response: {0}")]
    Decode(String),

    #[error("job {handle}: illegal transition {from:?} -> {to:?}")]
    InvalidTransition {
        handle: String,
        from: JobState,
        to: JobState,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl TranslateError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, TranslateError::AuthFailure(_))
    }
}

impl From<serde_json::Error> for TranslateError {
    fn from(e: serde_json::Error) -> Self {
        TranslateError::Decode(e.to_string())
    }
}
