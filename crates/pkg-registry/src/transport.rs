use std::time::Duration;

use anyhow::{Context, Result};
use pkg_core::PkgError;
use reqwest::blocking::Client;

/// Text fetches against the manifest catalog.
///
/// `Ok(None)` means the host answered with a non-success status.
pub trait ManifestTransport: Send + Sync {
    fn get_text(&self, url: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pkg/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl ManifestTransport for HttpTransport {
    fn get_text(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| PkgError::ManifestUnreachable {
                url: url.to_string(),
                reason: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url, %status, "manifest host returned non-success status");
            return Ok(None);
        }

        let body = response
            .text()
            .with_context(|| format!("failed reading response body from {url}"))?;
        Ok(Some(body))
    }
}
