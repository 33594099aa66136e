//! HTTP plumbing shared by the feed store and the translation providers.
//!
//! Everything that talks HTTP goes through [`HttpClient`], so provider
//! workflows can be driven by a scripted client in tests.

mod basic;
mod client;
#[cfg(test)]
pub(crate) mod scripted;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;

/// Downloads `url`. A 404 is `None`; any other non-2xx status is an error.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Option<Vec<u8>>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let resp = resp.error_for_status()?;
    Ok(Some(resp.bytes().await?.to_vec()))
}
