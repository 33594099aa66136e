use anyhow::{Context, Result};
use tracing::debug;

use super::KeyStore;

/// Resolves Smartling credentials from AWS SSM Parameter Store.
///
/// Parameters are read with decryption enabled so `SecureString` values
/// resolve as long as the role has `ssm:GetParameter` and the matching KMS
/// grant.
pub struct SsmKeyStore {
    client: aws_sdk_ssm::Client,
}

impl SsmKeyStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
        }
    }
}

#[async_trait::async_trait]
impl KeyStore for SsmKeyStore {
    /// `reference` is a parameter path such as `/gtfs-translator/smartling/user_secret`.
    async fn get(&self, reference: &str) -> Result<String> {
        debug!(parameter = reference, "Fetching SSM parameter");
        let output = self
            .client
            .get_parameter()
            .name(reference)
            .with_decryption(true)
            .send()
            .await
            .with_context(|| format!("SSM GetParameter failed for '{reference}'"))?;

        output
            .parameter
            .and_then(|p| p.value)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| anyhow::anyhow!("SSM parameter '{reference}' has no value"))
    }
}
