//! Provider credential resolution.
//!
//! Settings may carry `ssm:/path` references instead of plaintext secrets.
//! [`KeyStore`] resolves a reference into its plaintext value and
//! [`SsmKeyStore`] implements it using AWS SSM Parameter Store.

mod ssm;

pub use ssm::SsmKeyStore;

use anyhow::Result;

/// Resolves a vault reference (e.g. an SSM parameter path) into a plaintext secret.
#[async_trait::async_trait]
pub trait KeyStore: Send + Sync {
    async fn get(&self, reference: &str) -> Result<String>;
}
