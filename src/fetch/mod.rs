//! HTTP transport seam shared by both feed clients.
//!
//! Everything network-facing goes through the [`HttpClient`] trait so tests
//! can substitute fakes without a socket in sight.

mod basic;
mod client;
mod url_param;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use url_param::UrlParam;

use crate::error::FeedError;

/// Issues a GET and hands back the raw response without interpreting the
/// status. Callers that give 404 special meaning (the JSON feed) use this.
#[tracing::instrument(skip(client))]
pub async fn execute_get<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<reqwest::Response, FeedError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| FeedError::Malformed(format!("invalid request url {url}: {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);
    Ok(client.execute(req).await?)
}

/// Issues a GET and returns the body bytes, treating any non-success status as
/// a hard error. The binary feed client uses this.
#[tracing::instrument(skip(client))]
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>, FeedError> {
    let resp = execute_get(client, url).await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FeedError::Status {
            status: status.as_u16(),
        });
    }
    Ok(resp.bytes().await?.to_vec())
}
