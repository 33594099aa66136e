//! Synchronous MT Router strategy: one request per target language.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::smartling::SmartlingApi;
use super::{TranslationResult, Translator};
use crate::error::TranslateError;

pub struct SmartlingRouterTranslator {
    api: SmartlingApi,
    account_uid: String,
    source_lang: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteRequest<'a> {
    source_locale_id: &'a str,
    target_locale_id: &'a str,
    items: Vec<RouteItem<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteItem<'a> {
    key: String,
    source_text: &'a str,
}

#[derive(Deserialize)]
struct RouteData {
    items: Vec<RoutedItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutedItem {
    key: String,
    translation_text: String,
}

impl SmartlingRouterTranslator {
    pub fn new(api: SmartlingApi, account_uid: impl Into<String>, source_lang: impl Into<String>) -> Self {
        Self {
            api,
            account_uid: account_uid.into(),
            source_lang: source_lang.into(),
        }
    }

    async fn translate_all(
        &self,
        token: String,
        texts: &[String],
        target_langs: &[String],
    ) -> Result<TranslationResult, TranslateError> {
        let per_lang = try_join_all(target_langs.iter().map(|lang| {
            let token = token.as_str();
            async move {
                let translated = self.translate_one(token, texts, lang).await?;
                Ok::<_, TranslateError>((lang.clone(), translated))
            }
        }))
        .await?;
        Ok(per_lang.into_iter().collect())
    }

    async fn translate_one(
        &self,
        token: &str,
        texts: &[String],
        lang: &str,
    ) -> Result<Vec<String>, TranslateError> {
        let body = RouteRequest {
            source_locale_id: &self.source_lang,
            target_locale_id: lang,
            items: texts
                .iter()
                .enumerate()
                .map(|(i, text)| RouteItem {
                    key: i.to_string(),
                    source_text: text,
                })
                .collect(),
        };
        let path = format!(
            "/mt-router-api/v2/accounts/{}/smartling-mt",
            self.account_uid
        );
        let endpoint = self.api.endpoint();
        let data: RouteData = endpoint
            .send_data(endpoint.post(&path, token).json(&body))
            .await?;
        debug!(lang, items = data.items.len(), "MT router response received");
        in_request_order(data.items, texts.len())
    }
}

/// The router may answer in any order; keys are the stringified request
/// indices. Every index must come back exactly once.
fn in_request_order(items: Vec<RoutedItem>, expected: usize) -> Result<Vec<String>, TranslateError> {
    let mut keyed = items
        .into_iter()
        .map(|item| {
            item.key
                .parse::<usize>()
                .map(|i| (i, item.translation_text))
                .map_err(|_| TranslateError::Decode(format!("non-numeric item key '{}'", item.key)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    keyed.sort_by_key(|(i, _)| *i);

    let in_sequence = keyed.iter().enumerate().all(|(pos, (i, _))| pos == *i);
    if keyed.len() != expected || !in_sequence {
        return Err(TranslateError::Decode(format!(
            "router returned {} items for {expected} texts",
            keyed.len()
        )));
    }
    Ok(keyed.into_iter().map(|(_, text)| text).collect())
}

#[async_trait]
impl Translator for SmartlingRouterTranslator {
    async fn translate_batch(
        &self,
        texts: &[String],
        target_langs: &[String],
    ) -> Result<TranslationResult, TranslateError> {
        if texts.is_empty() {
            return Ok(TranslationResult::new());
        }
        self.api
            .with_auth_retry(|token| self.translate_all(token, texts, target_langs))
            .await
    }

    fn name(&self) -> &'static str {
        "smartling-mt-router"
    }
}
