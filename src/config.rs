//! Extension configuration.
//!
//! Every knob has a default matching the shipped extension, so an empty or
//! missing config file behaves exactly like no config at all.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Content-script tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Claims shorter than this many characters are never highlighted.
    pub min_claim_chars: usize,
    /// Surrounding text longer than this is cut and suffixed with `...`.
    pub context_max_chars: usize,
    /// A content container must render more text than this to be chosen.
    pub substantial_content_chars: usize,
    /// Primary-content selectors, tried in order.
    pub content_selectors: Vec<String>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            min_claim_chars: 5,
            context_max_chars: 300,
            substantial_content_chars: 200,
            content_selectors: [
                "article",
                "main",
                "[role=\"main\"]",
                "#content",
                ".content",
                "#main",
                ".main",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Background worker tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub menu_id: String,
    pub menu_title: String,
    /// Wait between opening the panel and handing it the selection.
    pub panel_ready_delay_ms: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            menu_id: "verify-with-datacommons".into(),
            menu_title: "Verify with Data Commons".into(),
            panel_ready_delay_ms: 500,
        }
    }
}

impl BackgroundConfig {
    pub fn panel_ready_delay(&self) -> Duration {
        Duration::from_millis(self.panel_ready_delay_ms)
    }
}

/// Side panel relay tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Page text handed to the widget is cut to this many characters.
    pub max_page_text_chars: usize,
    pub history_limit: usize,
    /// Whether the user granted access to `file://` pages.
    pub allow_file_urls: bool,
    /// Where verification history is persisted; in-memory when unset.
    pub history_path: Option<PathBuf>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            max_page_text_chars: 15_000,
            history_limit: 10,
            allow_file_urls: false,
            history_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub content: ContentConfig,
    pub background: BackgroundConfig,
    pub panel: PanelConfig,
}

impl Config {
    /// Load a TOML config file. Missing sections and keys fall back to
    /// their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn with_panel_ready_delay(mut self, delay: Duration) -> Self {
        self.background.panel_ready_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_min_claim_chars(mut self, chars: usize) -> Self {
        self.content.min_claim_chars = chars;
        self
    }

    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.panel.history_path = Some(path.into());
        self
    }

    pub fn with_file_urls(mut self, allowed: bool) -> Self {
        self.panel.allow_file_urls = allowed;
        self
    }
}
