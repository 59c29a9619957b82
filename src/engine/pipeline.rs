use std::path::Path;

use thiserror::Error;

use crate::dom::parser::parse_html;
use crate::dom::Document;
use crate::net::fetch::fetch_url;

/// Error during page loading
#[derive(Debug, Error)]
#[error("[{phase}] {message}")]
pub struct PageError {
    pub message: String,
    pub phase: &'static str,
}

/// A page ready for the content script.
#[derive(Debug)]
pub struct PageResult {
    pub dom: Document,
    pub fetch_status: u16,
}

/// Load pages from the network or disk into the DOM model:
/// Read/Fetch → Parse.
#[derive(Debug, Default)]
pub struct PageLoader;

impl PageLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a local file path, or fetch anything else as a URL.
    pub fn load(&self, source: &str) -> Result<PageResult, PageError> {
        let path = Path::new(source);
        if path.is_file() {
            return self.load_file(path);
        }
        self.load_page(source)
    }

    pub fn load_file(&self, path: &Path) -> Result<PageResult, PageError> {
        let html = std::fs::read_to_string(path).map_err(|e| PageError {
            message: format!("{}: {}", path.display(), e),
            phase: "read",
        })?;
        let url = format!("file://{}", path.display());
        Ok(self.process_html(&html, &url, 200))
    }

    pub fn load_page(&self, url: &str) -> Result<PageResult, PageError> {
        let fetch_result = fetch_url(url).map_err(|e| PageError {
            message: e.to_string(),
            phase: "fetch",
        })?;
        if fetch_result.status >= 400 {
            log::warn!("{} answered HTTP {}", fetch_result.url, fetch_result.status);
        }
        Ok(self.process_html(&fetch_result.html, &fetch_result.url, fetch_result.status))
    }

    /// Process raw HTML through the pipeline (for testing)
    pub fn process_html(&self, html: &str, url: &str, status: u16) -> PageResult {
        let dom = parse_html(html, url);
        log::debug!("Parsed {} ({} bytes)", url, html.len());
        PageResult {
            dom,
            fetch_status: status,
        }
    }
}
