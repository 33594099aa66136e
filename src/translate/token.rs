//! Bearer-token cache with single-flight refresh.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::TranslateError;

/// A credential as issued by the provider.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: Duration,
}

/// Performs the provider's authentication call.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<IssuedToken, TranslateError>;
}

#[derive(Debug, Clone)]
struct SessionToken {
    value: String,
    expiry: Instant,
}

impl SessionToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expiry
    }
}

/// Holds one bearer token for the whole process.
///
/// The slot mutex is held across the authentication call, so callers that
/// find the token stale or missing queue behind a single refresh instead of
/// each authenticating. Authentication errors are returned as-is.
pub struct TokenCache<A> {
    auth: A,
    safety_margin: Duration,
    slot: Mutex<Option<SessionToken>>,
}

impl<A: Authenticator> TokenCache<A> {
    /// `safety_margin` is subtracted from the provider TTL when a token is
    /// stored, covering clock skew and requests already in flight.
    pub fn new(auth: A, safety_margin: Duration) -> Self {
        Self {
            auth,
            safety_margin,
            slot: Mutex::new(None),
        }
    }

    pub async fn get_token(&self) -> Result<String, TranslateError> {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        debug!("Authenticating with translation provider");
        let issued = self.auth.authenticate().await?;
        let lifetime = issued.expires_in.saturating_sub(self.safety_margin);
        *slot = Some(SessionToken {
            value: issued.access_token.clone(),
            expiry: Instant::now() + lifetime,
        });
        debug!(ttl_secs = lifetime.as_secs(), "Provider token cached");

        Ok(issued.access_token)
    }

    /// Drops the cached token; the next [`get_token`](Self::get_token)
    /// authenticates again.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    /// Drops the cached token only if it is still `rejected`. A concurrent
    /// caller may already have replaced it with a fresh one.
    pub async fn reject(&self, rejected: &str) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|t| t.value == rejected) {
            *slot = None;
        }
    }
}
