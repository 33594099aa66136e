//! Job Batches strategy: job -> batch -> file upload -> poll -> per-locale
//! download.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::job::{JobState, JobTracker};
use super::smartling::{SmartlingApi, file_uri_for, positional};
use super::{TranslationResult, Translator};
use crate::error::TranslateError;

/// Multipart field carrying the locales to authorize. It must be sent once
/// with a comma-joined value; repeating the field makes the provider keep
/// only one locale.
pub const LOCALES_FIELD: &str = "localeIdsToAuthorize[]";

pub struct SmartlingJobBatchesTranslator {
    api: SmartlingApi,
    project_id: String,
    source_url: String,
    job_name_template: String,
    poll_interval: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobData {
    translation_job_uid: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchData {
    batch_uid: String,
}

#[derive(Deserialize)]
struct StatusData {
    status: String,
}

/// Text fields of the batch upload form, in send order.
pub fn upload_fields(file_uri: &str, target_langs: &[String]) -> Vec<(&'static str, String)> {
    vec![
        ("fileUri", file_uri.to_string()),
        ("fileType", "json".to_string()),
        (LOCALES_FIELD, target_langs.join(",")),
    ]
}

impl SmartlingJobBatchesTranslator {
    pub fn new(
        api: SmartlingApi,
        project_id: impl Into<String>,
        source_url: impl Into<String>,
        job_name_template: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            api,
            project_id: project_id.into(),
            source_url: source_url.into(),
            job_name_template: job_name_template.into(),
            poll_interval,
        }
    }

    fn path(&self, rest: &str) -> String {
        format!("/job-batches-api/v2/projects/{}{rest}", self.project_id)
    }

    async fn run_workflow(
        &self,
        token: String,
        texts: &[String],
        target_langs: &[String],
    ) -> Result<TranslationResult, TranslateError> {
        let endpoint = self.api.endpoint();
        let file_uri = file_uri_for(&self.source_url);
        let job_name = format!(
            "{} {}",
            self.job_name_template,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC")
        );

        let job: JobData = endpoint
            .send_data(endpoint.post(&self.path("/jobs"), &token).json(&json!({
                "jobName": job_name,
                "targetLocaleIds": target_langs,
            })))
            .await?;
        let batch: BatchData = endpoint
            .send_data(endpoint.post(&self.path("/batches"), &token).json(&json!({
                "authorize": true,
                "translationJobUid": job.translation_job_uid,
                "fileUris": [file_uri],
            })))
            .await?;

        let mut tracker = JobTracker::new(format!(
            "job {} / batch {}",
            job.translation_job_uid, batch.batch_uid
        ));
        debug!(handle = tracker.handle(), %file_uri, "Translation batch created");

        tracker.advance(JobState::Uploading)?;
        self.upload_file_to_batch(&token, &batch.batch_uid, &file_uri, texts, target_langs)
            .await?;
        tracker.advance(JobState::Processing)?;

        let status_path = self.path(&format!("/batches/{}", batch.batch_uid));
        let (status_path, poll_token) = (status_path.as_str(), token.as_str());
        tracker
            .poll_until_terminal(self.poll_interval, || async move {
                let data: StatusData = endpoint.send_data(endpoint.get(status_path, poll_token)).await?;
                Ok(data.status)
            })
            .await?;
        tracker.ensure_completed()?;

        let downloads = try_join_all(target_langs.iter().map(|lang| {
            let (token, file_uri) = (token.as_str(), file_uri.as_str());
            async move {
                let path = format!(
                    "/files-api/v2/projects/{}/locales/{lang}/file",
                    self.project_id
                );
                let translated: Vec<String> = endpoint
                    .send_plain(endpoint.get(&path, token).query(&[("fileUri", file_uri)]))
                    .await?;
                Ok::<_, TranslateError>((lang.clone(), positional(lang, translated, texts.len())?))
            }
        }))
        .await?;

        info!(
            handle = tracker.handle(),
            strings = texts.len(),
            locales = target_langs.len(),
            "Batch translations downloaded"
        );
        Ok(downloads.into_iter().collect())
    }

    async fn upload_file_to_batch(
        &self,
        token: &str,
        batch_uid: &str,
        file_uri: &str,
        texts: &[String],
        target_langs: &[String],
    ) -> Result<(), TranslateError> {
        let file = Part::bytes(serde_json::to_vec(texts)?)
            .file_name("alerts.json")
            .mime_str("application/json")?;
        let form = upload_fields(file_uri, target_langs)
            .into_iter()
            .fold(Form::new().part("file", file), |form, (name, value)| {
                form.text(name, value)
            });

        let endpoint = self.api.endpoint();
        let path = self.path(&format!("/batches/{batch_uid}/file"));
        endpoint.send(endpoint.post(&path, token).multipart(form)).await?;
        Ok(())
    }
}

#[async_trait]
impl Translator for SmartlingJobBatchesTranslator {
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
        "smartling-job-batches"
    }
}
