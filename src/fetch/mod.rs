//! HTTP retrieval of raw CSV text.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, bail};
use tracing::debug;

/// GETs `url` and returns the body as text. Any non-2xx status is an error.
pub async fn fetch_text<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<String> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {url} returned status {status}");
    }

    let text = resp.text().await?;
    debug!(url, bytes = text.len(), "Fetched source text");
    Ok(text)
}
