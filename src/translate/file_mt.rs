//! File Translations strategy: upload a file, start an MT job on it, poll,
//! then download one translated file per locale.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::job::{JobState, JobTracker};
use super::smartling::{SmartlingApi, positional};
use super::{TranslationResult, Translator};
use crate::error::TranslateError;

pub struct SmartlingFileTranslator {
    api: SmartlingApi,
    account_uid: String,
    source_lang: String,
    poll_interval: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MtData {
    mt_uid: String,
}

#[derive(Deserialize)]
struct StatusData {
    status: String,
}

impl SmartlingFileTranslator {
    pub fn new(
        api: SmartlingApi,
        account_uid: impl Into<String>,
        source_lang: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            account_uid: account_uid.into(),
            source_lang: source_lang.into(),
            poll_interval,
        }
    }

    fn path(&self, rest: &str) -> String {
        format!("/file-translations-api/v2/accounts/{}/files{rest}", self.account_uid)
    }

    async fn run_workflow(
        &self,
        token: String,
        texts: &[String],
        target_langs: &[String],
    ) -> Result<TranslationResult, TranslateError> {
        let endpoint = self.api.endpoint();
        let mut tracker = JobTracker::new("file (uploading)");

        tracker.advance(JobState::Uploading)?;
        let file = Part::bytes(serde_json::to_vec(texts)?)
            .file_name("alerts.json")
            .mime_str("application/json")?;
        let form = Form::new()
            .part("file", file)
            .text("request", json!({"fileType": "JSON"}).to_string());
        let uploaded: FileData = endpoint
            .send_data(endpoint.post(&self.path(""), &token).multipart(form))
            .await?;

        let mt: MtData = endpoint
            .send_data(
                endpoint
                    .post(&self.path(&format!("/{}/mt", uploaded.file_uid)), &token)
                    .json(&json!({
                        "sourceLocaleId": self.source_lang,
                        "targetLocaleIds": target_langs,
                    })),
            )
            .await?;
        tracker.set_handle(format!("file {} / mt {}", uploaded.file_uid, mt.mt_uid));
        tracker.advance(JobState::Processing)?;

        let mt_path = self.path(&format!("/{}/mt/{}", uploaded.file_uid, mt.mt_uid));
        let status_path = format!("{mt_path}/status");
        let (status_path, poll_token) = (status_path.as_str(), token.as_str());
        tracker
            .poll_until_terminal(self.poll_interval, || async move {
                let data: StatusData = endpoint.send_data(endpoint.get(status_path, poll_token)).await?;
                Ok(data.status)
            })
            .await?;
        tracker.ensure_completed()?;

        let downloads = try_join_all(target_langs.iter().map(|lang| {
            let (token, mt_path) = (token.as_str(), mt_path.as_str());
            async move {
                let path = format!("{mt_path}/locales/{lang}/file");
                let translated: Vec<String> = endpoint.send_plain(endpoint.get(&path, token)).await?;
                Ok::<_, TranslateError>((lang.clone(), positional(lang, translated, texts.len())?))
            }
        }))
        .await?;

        info!(
            handle = tracker.handle(),
            strings = texts.len(),
            locales = target_langs.len(),
            "MT file translations downloaded"
        );
        Ok(downloads.into_iter().collect())
    }
}

#[async_trait]
impl Translator for SmartlingFileTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        target_langs: &[String],
    ) -> Result<TranslationResult, TranslateError> {
        if texts.is_empty() {
            return Ok(TranslationResult::new());
        }
        self.api
            .with_auth_retry(|token| self.run_workflow(token, texts, target_langs))
            .await
    }

    fn name(&self) -> &'static str {
        "smartling-file-mt"
    }
}
