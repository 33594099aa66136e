//! Smartling API plumbing shared by the three translation strategies:
//! request building, response envelopes, status classification,
//! authentication and the retry-once-on-401 policy.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{error, warn};

use super::token::{Authenticator, IssuedToken, TokenCache};
use crate::error::TranslateError;
use crate::fetch::HttpClient;

pub const DEFAULT_BASE_URL: &str = "https://api.smartling.com";

/// `{"response": {"code": "...", "data": {...}}}`
#[derive(Deserialize)]
struct Envelope<T> {
    response: EnvelopeBody<T>,
}

#[derive(Deserialize)]
struct EnvelopeBody<T> {
    data: T,
}

/// Where and how requests are sent. Requests are assembled with a private
/// `reqwest::Client` and executed through the injected [`HttpClient`].
///
/// Clones share one request limiter, so every strategy, language fan-out and
/// poll loop built on the same endpoint counts against the same cap.
#[derive(Clone)]
pub struct ApiEndpoint {
    base_url: String,
    http: Arc<dyn HttpClient>,
    builder: reqwest::Client,
    limiter: Arc<Semaphore>,
}

impl ApiEndpoint {
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            builder: reqwest::Client::new(),
            limiter: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
        }
    }

    /// Caps how many provider requests may be in flight at once.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS)));
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn get(&self, path: &str, token: &str) -> RequestBuilder {
        self.builder.get(self.url(path)).bearer_auth(token)
    }

    pub(crate) fn post(&self, path: &str, token: &str) -> RequestBuilder {
        self.builder.post(self.url(path)).bearer_auth(token)
    }

    /// Executes the request, mapping 401 to [`TranslateError::AuthFailure`]
    /// and any other non-2xx status to [`TranslateError::Provider`].
    pub(crate) async fn send(&self, req: RequestBuilder) -> Result<Response, TranslateError> {
        let req = req.build()?;
        let method = req.method().clone();
        let path = req.url().path().to_string();

        let resp = {
            let _permit = self.limiter.acquire().await.ok();
            self.http.execute(req).await?
        };
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            warn!(%method, %path, "Provider returned 401");
            return Err(TranslateError::AuthFailure(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%method, %path, status = status.as_u16(), %body, "Provider request failed");
            return Err(TranslateError::Provider {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Sends and unwraps the `response.data` envelope.
    pub(crate) async fn send_data<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, TranslateError> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.response.data)
    }

    /// Sends and decodes a bare JSON body (translated file downloads).
    pub(crate) async fn send_plain<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, TranslateError> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: String,
    pub user_secret: String,
}

/// `POST /auth-api/v2/authenticate`
pub struct SmartlingAuth {
    endpoint: ApiEndpoint,
    credentials: Credentials,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthData {
    access_token: String,
    expires_in: u64,
}

impl SmartlingAuth {
    pub fn new(endpoint: ApiEndpoint, credentials: Credentials) -> Self {
        Self {
            endpoint,
            credentials,
        }
    }
}

#[async_trait]
impl Authenticator for SmartlingAuth {
    async fn authenticate(&self) -> Result<IssuedToken, TranslateError> {
        let req = self
            .endpoint
            .builder
            .post(self.endpoint.url("/auth-api/v2/authenticate"))
            .json(&serde_json::json!({
                "userIdentifier": self.credentials.user_id,
                "userSecret": self.credentials.user_secret,
            }));
        let data: AuthData = self.endpoint.send_data(req).await?;
        Ok(IssuedToken {
            access_token: data.access_token,
            expires_in: Duration::from_secs(data.expires_in),
        })
    }
}

/// Endpoint plus the process-wide token cache. Cheap to clone; every
/// strategy built from the same `SmartlingApi` shares one token.
#[derive(Clone)]
pub struct SmartlingApi {
    endpoint: ApiEndpoint,
    tokens: Arc<TokenCache<SmartlingAuth>>,
}

impl SmartlingApi {
    pub fn new(
        base_url: impl Into<String>,
        http: Arc<dyn HttpClient>,
        credentials: Credentials,
        safety_margin: Duration,
        concurrency_limit: usize,
    ) -> Self {
        let endpoint = ApiEndpoint::new(base_url, http).with_concurrency_limit(concurrency_limit);
        let auth = SmartlingAuth::new(endpoint.clone(), credentials);
        Self {
            endpoint,
            tokens: Arc::new(TokenCache::new(auth, safety_margin)),
        }
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    pub fn tokens(&self) -> &TokenCache<SmartlingAuth> {
        &self.tokens
    }

    /// Runs `op` with a cached token. If the provider answers 401, the token
    /// is discarded and `op` runs once more with a fresh one; a second 401
    /// is returned to the caller. Other errors are never retried here.
    pub(crate) async fn with_auth_retry<T, F, Fut>(&self, mut op: F) -> Result<T, TranslateError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, TranslateError>>,
    {
        let token = self.tokens.get_token().await?;
        match op(token.clone()).await {
            Err(e) if e.is_auth_failure() => {
                warn!(error = %e, "Token rejected by provider; re-authenticating and retrying once");
                self.tokens.reject(&token).await;
                let token = self.tokens.get_token().await?;
                op(token).await
            }
            other => other,
        }
    }
}

/// Checks a positional download against the uploaded source array.
pub(crate) fn positional(
    lang: &str,
    translated: Vec<String>,
    expected: usize,
) -> Result<Vec<String>, TranslateError> {
    if translated.len() != expected {
        return Err(TranslateError::Decode(format!(
            "translated file for {lang} has {} entries, expected {expected}",
            translated.len()
        )));
    }
    Ok(translated)
}

/// Sanitizes a source URL into something usable inside a provider file URI.
pub(crate) fn file_uri_for(source: &str) -> String {
    let slug: String = source
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    format!("gtfs-rt-translator/{}/{stamp}.json", slug.trim_matches('-'))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::scripted::ScriptedClient;
    use reqwest::Method;

    pub(crate) const BASE: &str = "http://smartling.test";
    pub(crate) const AUTH_PATH: &str = "/auth-api/v2/authenticate";

    pub(crate) fn auth_ok(token: &str) -> String {
        serde_json::json!({"response": {"data": {"accessToken": token, "expiresIn": 3600}}})
            .to_string()
    }

    pub(crate) fn data(value: serde_json::Value) -> String {
        serde_json::json!({"response": {"code": "SUCCESS", "data": value}}).to_string()
    }

    pub(crate) fn api(client: Arc<ScriptedClient>) -> SmartlingApi {
        limited_api(client, 20)
    }

    pub(crate) fn limited_api(client: Arc<ScriptedClient>, concurrency_limit: usize) -> SmartlingApi {
        SmartlingApi::new(
            BASE,
            client,
            Credentials {
                user_id: "user".to_string(),
                user_secret: "secret".to_string(),
            },
            Duration::from_secs(60),
            concurrency_limit,
        )
    }

    #[tokio::test]
    async fn test_authenticate_sends_credentials() {
        let client = Arc::new(ScriptedClient::new().on(Method::POST, AUTH_PATH, 200, auth_ok("t1")));
        let api = api(client.clone());

        assert_eq!(api.tokens().get_token().await.unwrap(), "t1");
        let sent = client.requests_to(&Method::POST, AUTH_PATH);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].json()["userIdentifier"], "user");
        assert_eq!(sent[0].json()["userSecret"], "secret");
    }

    #[tokio::test]
    async fn test_status_classification() {
        let client = Arc::new(
            ScriptedClient::new()
                .on(Method::GET, "/denied", 401, "{}")
                .on(Method::GET, "/broken", 500, "boom"),
        );
        let endpoint = ApiEndpoint::new(BASE, client);

        let denied = endpoint.send(endpoint.get("/denied", "t")).await.unwrap_err();
        assert!(denied.is_auth_failure());

        let broken = endpoint.send(endpoint.get("/broken", "t")).await.unwrap_err();
        assert!(matches!(broken, TranslateError::Provider { status: 500, ref body } if body == "boom"));
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_second_auth_failure() {
        let client = Arc::new(ScriptedClient::new().on(Method::POST, AUTH_PATH, 200, auth_ok("t")));
        let api = api(client.clone());
        let mut attempts = 0;

        let result: Result<(), _> = api
            .with_auth_retry(|_token| {
                attempts += 1;
                async { Err(TranslateError::AuthFailure("nope".to_string())) }
            })
            .await;

        assert!(result.unwrap_err().is_auth_failure());
        assert_eq!(attempts, 2);
        assert_eq!(client.calls(&Method::POST, AUTH_PATH), 2);
    }

    #[tokio::test]
    async fn test_retry_skips_non_auth_errors() {
        let client = Arc::new(ScriptedClient::new().on(Method::POST, AUTH_PATH, 200, auth_ok("t")));
        let api = api(client.clone());
        let mut attempts = 0;

        let result: Result<(), _> = api
            .with_auth_retry(|_token| {
                attempts += 1;
                async {
                    Err(TranslateError::Provider {
                        status: 400,
                        body: "bad".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(TranslateError::Provider { status: 400, .. })));
        assert_eq!(attempts, 1);
        assert_eq!(client.calls(&Method::POST, AUTH_PATH), 1);
    }

    #[test]
    fn test_positional_rejects_short_download() {
        assert!(positional("es", vec!["Hola".to_string()], 2).is_err());
        assert_eq!(positional("es", vec!["Hola".to_string()], 1).unwrap(), vec!["Hola"]);
    }

    #[test]
    fn test_file_uri_is_sanitized() {
        let uri = file_uri_for("s3://bucket/alerts.json");
        assert!(uri.starts_with("gtfs-rt-translator/s3---bucket-alerts-json/"));
        assert!(uri.ends_with(".json"));
    }
}
