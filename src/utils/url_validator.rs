// SPDX-License-Identifier: GPL-3.0-only
use anyhow::{Context, Result};
use url::Url;

/// Maximum allowed URL length
const MAX_URL_LENGTH: usize = 2048;

/// Parse a configured endpoint, accepting only absolute http(s) URLs with a host
pub fn validate_http_url(url_str: &str) -> Result<Url> {
    if url_str.len() > MAX_URL_LENGTH {
        return Err(anyhow::anyhow!("URL exceeds maximum length of {} characters", MAX_URL_LENGTH));
    }

    let url = Url::parse(url_str)
        .with_context(|| format!("Invalid URL format: {}", url_str))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(anyhow::anyhow!(
                "Invalid URL scheme: {} (only http and https are allowed)",
                scheme
            ));
        }
    }

    if url.host_str().is_none() {
        return Err(anyhow::anyhow!("URL must have a host"));
    }

    Ok(url)
}
