//! Runtime settings, read from the environment (and `.env` via dotenvy in
//! the binary).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::error::TranslateError;
use crate::fetch::HttpClient;
use crate::infra::keys::KeyStore;
use crate::processor::ProcessorOptions;
use crate::translate::{
    Credentials, DEFAULT_BASE_URL, MockTranslator, SmartlingApi, SmartlingFileTranslator,
    SmartlingJobBatchesTranslator, SmartlingRouterTranslator, Translator,
};

/// Prefix marking a setting whose value lives in SSM Parameter Store.
pub const SSM_PREFIX: &str = "ssm:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslatorKind {
    Router,
    JobBatches,
    File,
    Mock,
}

impl FromStr for TranslatorKind {
    type Err = TranslateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "router" | "mt-router" => Ok(TranslatorKind::Router),
            "job-batches" | "job_batches" => Ok(TranslatorKind::JobBatches),
            "file" | "file-mt" => Ok(TranslatorKind::File),
            "mock" => Ok(TranslatorKind::Mock),
            other => Err(TranslateError::Configuration(format!(
                "TRANSLATOR must be one of router, job-batches, file, mock; got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmartlingSettings {
    pub user_id: String,
    pub user_secret: String,
    pub account_uid: Option<String>,
    pub project_id: Option<String>,
    pub job_name_template: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub source_url: Option<String>,
    pub destination_urls: Vec<String>,
    pub target_languages: Vec<String>,
    pub source_language: String,
    pub translator: TranslatorKind,
    pub smartling: SmartlingSettings,
    pub concurrency_limit: usize,
    pub translation_timeout: Duration,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub token_safety_margin: Duration,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Settings {
    pub fn from_env() -> Result<Self, TranslateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TranslateError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        fn number<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, TranslateError> {
            match raw {
                None => Ok(default),
                Some(raw) => raw.parse().map_err(|_| {
                    TranslateError::Configuration(format!("{key} must be a non-negative number, got '{raw}'"))
                }),
            }
        }

        let project_id = get("SMARTLING_PROJECT_ID");
        let translator = match get("TRANSLATOR") {
            Some(kind) => kind.parse()?,
            None if project_id.is_some() => TranslatorKind::JobBatches,
            None => TranslatorKind::Router,
        };

        let settings = Settings {
            source_url: get("SOURCE_URL"),
            destination_urls: get("DESTINATION_BUCKET_URLS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            target_languages: split_list(&get("TARGET_LANGUAGES").unwrap_or_else(|| "es-419".to_string())),
            source_language: get("SOURCE_LANGUAGE").unwrap_or_else(|| "en".to_string()),
            translator,
            smartling: SmartlingSettings {
                user_id: get("SMARTLING_USER_ID").unwrap_or_default(),
                user_secret: get("SMARTLING_USER_SECRET").unwrap_or_default(),
                account_uid: get("SMARTLING_ACCOUNT_UID"),
                project_id,
                job_name_template: get("SMARTLING_JOB_NAME_TEMPLATE")
                    .unwrap_or_else(|| "GTFS Alerts Translation".to_string()),
                base_url: get("SMARTLING_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            },
            concurrency_limit: number(get("CONCURRENCY_LIMIT"), "CONCURRENCY_LIMIT", 20)?,
            translation_timeout: Duration::from_secs(number(
                get("TRANSLATION_TIMEOUT"),
                "TRANSLATION_TIMEOUT",
                120,
            )?),
            poll_interval: Duration::from_millis(number(get("POLL_INTERVAL_MS"), "POLL_INTERVAL_MS", 5000)?),
            batch_size: number(get("BATCH_SIZE"), "BATCH_SIZE", 1000)?,
            token_safety_margin: Duration::from_secs(number(
                get("TOKEN_SAFETY_MARGIN"),
                "TOKEN_SAFETY_MARGIN",
                60,
            )?),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), TranslateError> {
        let fail = |msg: &str| Err(TranslateError::Configuration(msg.to_string()));

        if self.target_languages.is_empty() {
            return fail("TARGET_LANGUAGES must name at least one locale");
        }
        if self
            .target_languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(&self.source_language))
        {
            return fail("TARGET_LANGUAGES must not include SOURCE_LANGUAGE");
        }
        if self.concurrency_limit == 0 || self.batch_size == 0 {
            return fail("CONCURRENCY_LIMIT and BATCH_SIZE must be at least 1");
        }

        if self.translator == TranslatorKind::Mock {
            return Ok(());
        }
        if self.smartling.user_id.is_empty() || self.smartling.user_secret.is_empty() {
            return fail("SMARTLING_USER_ID and SMARTLING_USER_SECRET are required");
        }
        match self.translator {
            TranslatorKind::JobBatches if self.smartling.project_id.is_none() => {
                fail("SMARTLING_PROJECT_ID is required for the job-batches translator")
            }
            TranslatorKind::Router | TranslatorKind::File if self.smartling.account_uid.is_none() => {
                fail("SMARTLING_ACCOUNT_UID is required for the router and file translators")
            }
            _ => Ok(()),
        }
    }

    pub fn processor_options(&self) -> ProcessorOptions {
        ProcessorOptions {
            target_langs: self.target_languages.clone(),
            source_lang: self.source_language.clone(),
            concurrency_limit: self.concurrency_limit,
            timeout: self.translation_timeout,
            batch_size: self.batch_size,
        }
    }

    /// Replaces `ssm:/path` credential values with their plaintext.
    pub async fn resolve_secrets(&mut self, store: &dyn KeyStore) -> Result<()> {
        for (name, value) in [
            ("SMARTLING_USER_ID", &mut self.smartling.user_id),
            ("SMARTLING_USER_SECRET", &mut self.smartling.user_secret),
        ] {
            if let Some(reference) = value.strip_prefix(SSM_PREFIX) {
                let resolved = store
                    .get(reference)
                    .await
                    .with_context(|| format!("resolving {name}"))?;
                info!(setting = name, "Resolved secret from parameter store");
                *value = resolved;
            }
        }
        Ok(())
    }

    /// Builds the configured translation strategy. `source_url` names the
    /// provider-side file for the job-batches workflow.
    pub fn build_translator(
        &self,
        http: Arc<dyn HttpClient>,
        source_url: &str,
    ) -> Result<Box<dyn Translator>, TranslateError> {
        let missing = |what: &str| TranslateError::Configuration(format!("{what} is not configured"));
        let api = || {
            SmartlingApi::new(
                self.smartling.base_url.clone(),
                http.clone(),
                Credentials {
                    user_id: self.smartling.user_id.clone(),
                    user_secret: self.smartling.user_secret.clone(),
                },
                self.token_safety_margin,
                self.concurrency_limit,
            )
        };

        let translator: Box<dyn Translator> = match self.translator {
            TranslatorKind::Mock => Box::new(MockTranslator::default()),
            TranslatorKind::Router => Box::new(SmartlingRouterTranslator::new(
                api(),
                self.smartling.account_uid.clone().ok_or_else(|| missing("SMARTLING_ACCOUNT_UID"))?,
                self.source_language.clone(),
            )),
            TranslatorKind::File => Box::new(SmartlingFileTranslator::new(
                api(),
                self.smartling.account_uid.clone().ok_or_else(|| missing("SMARTLING_ACCOUNT_UID"))?,
                self.source_language.clone(),
                self.poll_interval,
            )),
            TranslatorKind::JobBatches => Box::new(SmartlingJobBatchesTranslator::new(
                api(),
                self.smartling.project_id.clone().ok_or_else(|| missing("SMARTLING_PROJECT_ID"))?,
                source_url,
                self.smartling.job_name_template.clone(),
                self.poll_interval,
            )),
        };
        info!(translator = translator.name(), "Translator selected");
        Ok(translator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, TranslateError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    const CREDS: [(&str, &str); 3] = [
        ("SMARTLING_USER_ID", "user"),
        ("SMARTLING_USER_SECRET", "secret"),
        ("SMARTLING_ACCOUNT_UID", "acc"),
    ];

    #[test]
    fn test_defaults() {
        let s = settings(&CREDS).unwrap();
        assert_eq!(s.translator, TranslatorKind::Router);
        assert_eq!(s.target_languages, vec!["es-419"]);
        assert_eq!(s.concurrency_limit, 20);
        assert_eq!(s.poll_interval, Duration::from_millis(5000));
        assert_eq!(s.smartling.base_url, DEFAULT_BASE_URL);
        assert!(s.destination_urls.is_empty());
    }

    #[test]
    fn test_project_id_selects_job_batches() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("SMARTLING_PROJECT_ID", "proj"));
        assert_eq!(settings(&pairs).unwrap().translator, TranslatorKind::JobBatches);

        pairs.push(("TRANSLATOR", "file"));
        assert_eq!(settings(&pairs).unwrap().translator, TranslatorKind::File);
    }

    #[test]
    fn test_lists_are_trimmed() {
        let mut pairs = CREDS.to_vec();
        pairs.push(("TARGET_LANGUAGES", " es-419, pt-BR ,,"));
        pairs.push(("DESTINATION_BUCKET_URLS", "s3://d/a.pb, s3://d/a.json"));
        let s = settings(&pairs).unwrap();
        assert_eq!(s.target_languages, vec!["es-419", "pt-BR"]);
        assert_eq!(s.destination_urls, vec!["s3://d/a.pb", "s3://d/a.json"]);
    }

    #[test]
    fn test_configuration_errors() {
        assert!(matches!(settings(&[]), Err(TranslateError::Configuration(_))));
        assert!(settings(&[("TRANSLATOR", "job-batches"), CREDS[0], CREDS[1]]).is_err());
        assert!(settings(&[("TRANSLATOR", "teleport")]).is_err());

        let mut pairs = CREDS.to_vec();
        pairs.push(("CONCURRENCY_LIMIT", "many"));
        assert!(settings(&pairs).is_err());

        let mut pairs = CREDS.to_vec();
        pairs.push(("TARGET_LANGUAGES", "en,es"));
        assert!(settings(&pairs).is_err());
    }

    #[test]
    fn test_mock_needs_no_credentials() {
        let s = settings(&[("TRANSLATOR", "mock")]).unwrap();
        let http: Arc<dyn HttpClient> = Arc::new(crate::fetch::BasicClient::new());
        assert_eq!(s.build_translator(http, "s3://b/k.pb").unwrap().name(), "mock");
    }

    struct FixedStore;

    #[async_trait]
    impl KeyStore for FixedStore {
        async fn get(&self, reference: &str) -> Result<String> {
            Ok(format!("resolved:{reference}"))
        }
    }

    #[tokio::test]
    async fn test_resolve_secrets_only_touches_references() {
        let mut s = settings(&[
            ("SMARTLING_USER_ID", "plain-user"),
            ("SMARTLING_USER_SECRET", "ssm:/gtfs/smartling/secret"),
            ("SMARTLING_ACCOUNT_UID", "acc"),
        ])
        .unwrap();

        s.resolve_secrets(&FixedStore).await.unwrap();

        assert_eq!(s.smartling.user_id, "plain-user");
        assert_eq!(s.smartling.user_secret, "resolved:/gtfs/smartling/secret");
    }

    #[tokio::test]
    async fn test_concurrency_limit_caps_provider_requests() {
        use crate::feed::fixtures::{alert_entity, feed};
        use crate::feed::{AlertField, FieldRef, TranslatableFeed};
        use crate::fetch::scripted::ScriptedClient;
        use crate::processor::process_feed;
        use crate::translate::smartling_fixtures::{AUTH_PATH, BASE, auth_ok, data};
        use reqwest::Method;

        let route = "/mt-router-api/v2/accounts/acc/smartling-mt";
        let client = Arc::new(
            ScriptedClient::new()
                .with_latency(Duration::from_millis(20))
                .on(Method::POST, AUTH_PATH, 200, auth_ok("t"))
                .on(
                    Method::POST,
                    route,
                    200,
                    data(serde_json::json!({"items": [{"key": "0", "translationText": "x"}]})),
                ),
        );
        let mut pairs = CREDS.to_vec();
        pairs.extend([
            ("CONCURRENCY_LIMIT", "1"),
            ("TARGET_LANGUAGES", "es,fr,pt,de"),
            ("SMARTLING_BASE_URL", BASE),
        ]);
        let s = settings(&pairs).unwrap();
        let translator = s.build_translator(client.clone(), "s3://b/alerts.pb").unwrap();

        let mut alerts = feed(1, vec![alert_entity("a1", "Delays", None)]);
        let metrics = process_feed(&mut alerts, None, translator.as_ref(), &s.processor_options()).await;

        assert_eq!(metrics.strings_translated, 1);
        assert_eq!(client.calls(&Method::POST, route), 4);
        assert_eq!(client.peak_in_flight(), 1);
        let at = FieldRef::new("a1", AlertField::HeaderText);
        assert_eq!(alerts.variant(&at, "de"), Some("x"));
    }
}
