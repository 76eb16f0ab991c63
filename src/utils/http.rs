use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared outbound client. Per-call timeouts are set on each request.
pub fn build_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}
