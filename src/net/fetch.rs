use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Result of fetching a URL
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub html: String,
    pub url: String,
    pub status: u16,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Client error: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Failed to read body: {0}")]
    Body(#[source] reqwest::Error),
}

/// Add `https://` to bare hosts.
pub fn normalize_url(url_str: &str) -> String {
    if !url_str.starts_with("http://") && !url_str.starts_with("https://") {
        format!("https://{}", url_str)
    } else {
        url_str.to_string()
    }
}

/// Fetch a URL and return the HTML content (blocking).
pub fn fetch_url(url_str: &str) -> Result<FetchResult, FetchError> {
    let parsed = Url::parse(&normalize_url(url_str))?;

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!(
            "Mozilla/5.0 (compatible; dc-fact-checker/",
            env!("CARGO_PKG_VERSION"),
            ")"
        ))
        .timeout(Duration::from_secs(15))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(FetchError::Client)?;

    let response = client
        .get(parsed.as_str())
        .header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .map_err(FetchError::Request)?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .to_string();

    let final_url = response.url().to_string();
    log::debug!("GET {} -> {} ({})", parsed, status, content_type);

    let html = response.text().map_err(FetchError::Body)?;

    Ok(FetchResult {
        html,
        url: final_url,
        status,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hosts_get_https() {
        assert_eq!(normalize_url("example.com/a"), "https://example.com/a");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn unparseable_url_is_rejected_before_any_request() {
        assert!(matches!(
            fetch_url("http://exa mple.com"),
            Err(FetchError::InvalidUrl(_))
        ));
    }
}
