use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes a fully built request. Implementations decide transport only;
/// status handling belongs to the caller.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
