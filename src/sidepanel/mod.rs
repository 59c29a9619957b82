//! Side panel relay.
//!
//! Sits between the verification widget (external; it only sees
//! [`WidgetEvent`]s) and the rest of the extension: relays selections and
//! clicked claims to the widget, pulls page text from the active tab, and
//! forwards highlight and verdict requests back to it.

pub mod history;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::PanelConfig;
use crate::messaging::{Envelope, ExtensionBus, Message, Response, TabInfo};

use self::history::{HistoryError, HistoryStore};

/// Pages the extension may not script.
const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "edge://",
    "about:",
    "view-source:",
    "https://chrome.google.com/webstore",
    "https://chromewebstore.google.com",
];

/// What the panel tells the embedded widget.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    VerifyText {
        text: String,
        context: Option<String>,
    },
    RestoreResult {
        claim: String,
        result: Value,
    },
    PageText {
        text: String,
    },
    VerifyError {
        error: String,
    },
}

/// What the widget asks of the panel.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetRequest {
    ScanPage,
    HighlightClaims { claims: Vec<String> },
    UpdateClaimStatus { claim: String, verdict: String },
    VerificationComplete { claim: String, result: Value },
    /// Forget every stored verification.
    ClearHistory,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanRefusal {
    #[error("Cannot scan this page type (system page). Please try a normal website.")]
    Restricted,
    #[error(
        "To scan local files, you must enable \"Allow access to file URLs\" in the extension settings."
    )]
    FileAccessDenied,
}

/// Whether a tab's page may be scanned at all.
pub fn check_scannable(url: &str, allow_file_urls: bool) -> Result<(), ScanRefusal> {
    if url.is_empty() || RESTRICTED_PREFIXES.iter().any(|p| url.starts_with(p)) {
        return Err(ScanRefusal::Restricted);
    }
    if url.starts_with("file://") && !allow_file_urls {
        return Err(ScanRefusal::FileAccessDenied);
    }
    Ok(())
}

const SCAN_FAILED: &str = "Failed to scan page. Please ensure the extension is reloaded and you are on a valid web page.";

pub struct SidePanel {
    bus: ExtensionBus,
    config: PanelConfig,
    history: HistoryStore,
    widget: mpsc::UnboundedSender<WidgetEvent>,
    active_tab: Option<TabInfo>,
}

impl SidePanel {
    pub fn new(
        bus: ExtensionBus,
        config: PanelConfig,
        history: HistoryStore,
        widget: mpsc::UnboundedSender<WidgetEvent>,
    ) -> Self {
        Self {
            bus,
            config,
            history,
            widget,
            active_tab: None,
        }
    }

    /// Build a panel whose history lives where `config` says: the
    /// configured file when set, memory otherwise.
    pub fn open(
        bus: ExtensionBus,
        config: PanelConfig,
        widget: mpsc::UnboundedSender<WidgetEvent>,
    ) -> Result<Self, HistoryError> {
        let history = match &config.history_path {
            Some(path) => HistoryStore::open(path, config.history_limit)?,
            None => HistoryStore::in_memory(config.history_limit),
        };
        Ok(Self::new(bus, config, history, widget))
    }

    /// Track the focused tab of the panel's window.
    pub fn set_active_tab(&mut self, tab: Option<TabInfo>) {
        self.active_tab = tab;
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    fn emit(&self, event: WidgetEvent) {
        if self.widget.send(event).is_err() {
            log::warn!("Widget is gone; dropping event");
        }
    }

    /// Messages arriving on the runtime channel.
    pub fn handle_runtime_message(&self, message: &Message) {
        match message {
            Message::VerifyText { text } => self.emit(WidgetEvent::VerifyText {
                text: text.clone(),
                context: None,
            }),
            Message::VerifyClaimFromPage { claim, context } => match self.history.find(claim) {
                Some(cached) => {
                    log::debug!("Restoring cached result for {:?}", claim);
                    self.emit(WidgetEvent::RestoreResult {
                        claim: cached.claim.clone(),
                        result: cached.result.clone(),
                    })
                }
                None => self.emit(WidgetEvent::VerifyText {
                    text: claim.clone(),
                    context: Some(context.clone()),
                }),
            },
            other => log::debug!("Side panel ignoring {}", other.kind()),
        }
    }

    /// Pull the active tab's text for the widget.
    pub async fn scan_page(&self, tab: Option<&TabInfo>) {
        let Some(tab) = tab else {
            return;
        };
        if let Err(refusal) = check_scannable(&tab.url, self.config.allow_file_urls) {
            self.emit(WidgetEvent::VerifyError {
                error: refusal.to_string(),
            });
            return;
        }

        match self.bus.send_tab_message(tab.id, Message::ExtractText).await {
            Ok(Response::Text { text }) if !text.is_empty() => {
                let text = page_text_prefix(&text, self.config.max_page_text_chars);
                self.emit(WidgetEvent::PageText { text });
            }
            Ok(_) => {
                log::error!("Failed to scan page: no text returned from content script");
                self.emit(WidgetEvent::VerifyError {
                    error: SCAN_FAILED.into(),
                });
            }
            Err(e) => {
                log::error!("Failed to scan page: {}", e);
                self.emit(WidgetEvent::VerifyError {
                    error: SCAN_FAILED.into(),
                });
            }
        }
    }

    pub fn highlight_claims(&self, tab: Option<&TabInfo>, claims: Vec<String>) {
        self.forward(tab, Message::HighlightClaims { claims });
    }

    pub fn update_claim_status(&self, tab: Option<&TabInfo>, claim: &str, verdict: &str) {
        log::info!("Forwarding UPDATE_CLAIM_STATUS: {} {}", claim, verdict);
        self.forward(
            tab,
            Message::UpdateClaimStatus {
                claim: claim.to_string(),
                verdict: verdict.to_string(),
            },
        );
    }

    fn forward(&self, tab: Option<&TabInfo>, message: Message) {
        let Some(tab) = tab else {
            return;
        };
        let kind = message.kind();
        if let Err(e) = self.bus.notify_tab(tab.id, message) {
            log::error!("Failed to forward {} to tab {}: {}", kind, tab.id, e);
        }
    }

    /// The widget finished verifying a claim.
    pub fn verification_complete(&mut self, claim: &str, result: Value) {
        if let Err(e) = self.history.record(claim, result) {
            log::error!("Failed to save history: {}", e);
        }
    }

    pub fn clear_history(&mut self) {
        match self.history.clear() {
            Ok(()) => log::info!("Verification history cleared"),
            Err(e) => log::error!("Failed to clear history: {}", e),
        }
    }

    pub async fn handle_widget_request(&mut self, request: WidgetRequest) {
        let tab = self.active_tab.clone();
        match request {
            WidgetRequest::ScanPage => self.scan_page(tab.as_ref()).await,
            WidgetRequest::HighlightClaims { claims } => self.highlight_claims(tab.as_ref(), claims),
            WidgetRequest::UpdateClaimStatus { claim, verdict } => {
                self.update_claim_status(tab.as_ref(), &claim, &verdict)
            }
            WidgetRequest::VerificationComplete { claim, result } => {
                self.verification_complete(&claim, result)
            }
            WidgetRequest::ClearHistory => self.clear_history(),
        }
    }

    /// Serve runtime messages and widget requests until either side goes
    /// away.
    pub async fn run(
        mut self,
        mut runtime: mpsc::UnboundedReceiver<Envelope>,
        mut requests: mpsc::UnboundedReceiver<WidgetRequest>,
    ) -> Self {
        loop {
            tokio::select! {
                envelope = runtime.recv() => match envelope {
                    Some(envelope) => self.handle_runtime_message(&envelope.message),
                    None => break,
                },
                request = requests.recv() => match request {
                    Some(request) => self.handle_widget_request(request).await,
                    None => break,
                },
            }
        }
        self
    }
}

/// Page text is cut without a marker; the widget only needs a prefix.
fn page_text_prefix(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn panel(bus: &ExtensionBus) -> (SidePanel, mpsc::UnboundedReceiver<WidgetEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SidePanel::new(
                bus.clone(),
                PanelConfig::default(),
                HistoryStore::in_memory(10),
                tx,
            ),
            rx,
        )
    }

    fn tab(url: &str) -> TabInfo {
        TabInfo {
            id: 5,
            window_id: 1,
            url: url.into(),
        }
    }

    fn answer_extract(bus: &ExtensionBus, tab: u32, text: String) {
        let mut rx = bus.listen_tab(tab);
        tokio::spawn(async move {
            while let Some(mut env) = rx.recv().await {
                env.respond(Response::Text { text: text.clone() });
            }
        });
    }

    #[test]
    fn restricted_pages_are_refused() {
        for url in [
            "chrome://settings",
            "about:blank",
            "view-source:https://a.b",
            "https://chromewebstore.google.com/detail/x",
            "",
        ] {
            assert_eq!(check_scannable(url, true), Err(ScanRefusal::Restricted), "{}", url);
        }
        assert_eq!(
            check_scannable("file:///tmp/a.html", false),
            Err(ScanRefusal::FileAccessDenied)
        );
        assert_eq!(check_scannable("file:///tmp/a.html", true), Ok(()));
        assert_eq!(check_scannable("https://example.com", false), Ok(()));
    }

    #[test]
    fn clicked_claim_uses_history_when_cached() {
        let bus = ExtensionBus::new();
        let (mut panel, mut widget) = panel(&bus);
        panel.verification_complete("sky is blue", json!({"verdict": "SUPPORTED"}));

        panel.handle_runtime_message(&Message::VerifyClaimFromPage {
            claim: "sky is blue".into(),
            context: "Page: T".into(),
        });
        assert_eq!(
            widget.try_recv().unwrap(),
            WidgetEvent::RestoreResult {
                claim: "sky is blue".into(),
                result: json!({"verdict": "SUPPORTED"})
            }
        );

        panel.handle_runtime_message(&Message::VerifyClaimFromPage {
            claim: "grass is green".into(),
            context: "Page: T".into(),
        });
        assert_eq!(
            widget.try_recv().unwrap(),
            WidgetEvent::VerifyText {
                text: "grass is green".into(),
                context: Some("Page: T".into())
            }
        );
    }

    #[test]
    fn history_file_comes_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default()
            .with_history_path(dir.path().join("history.json"))
            .panel;
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut first = SidePanel::open(ExtensionBus::new(), config.clone(), tx.clone()).unwrap();
        first.verification_complete("sky is blue", json!({"verdict": "SUPPORTED"}));

        let second = SidePanel::open(ExtensionBus::new(), config, tx).unwrap();
        assert_eq!(
            second.history().find("sky is blue").unwrap().verdict(),
            Some("SUPPORTED")
        );
    }

    #[tokio::test]
    async fn clearing_history_empties_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        let config = Config::default().with_history_path(path.clone()).panel;
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut panel = SidePanel::open(ExtensionBus::new(), config.clone(), tx.clone()).unwrap();
        panel.verification_complete("sky is blue", json!({"verdict": "SUPPORTED"}));
        panel.handle_widget_request(WidgetRequest::ClearHistory).await;
        assert!(panel.history().items().is_empty());

        let saved: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(saved.is_empty());
        let reopened = SidePanel::open(ExtensionBus::new(), config, tx).unwrap();
        assert!(reopened.history().find("sky is blue").is_none());
    }

    #[tokio::test]
    async fn file_pages_scan_once_access_is_granted() {
        let bus = ExtensionBus::new();
        let (tx, mut widget) = mpsc::unbounded_channel();
        let config = Config::default().with_file_urls(true).panel;
        let panel = SidePanel::open(bus.clone(), config, tx).unwrap();
        answer_extract(&bus, 5, "local page".into());

        panel.scan_page(Some(&tab("file:///tmp/page.html"))).await;
        assert_eq!(
            widget.try_recv().unwrap(),
            WidgetEvent::PageText {
                text: "local page".into()
            }
        );
    }

    #[tokio::test]
    async fn scan_truncates_page_text() {
        let bus = ExtensionBus::new();
        let (panel, mut widget) = panel(&bus);
        answer_extract(&bus, 5, "x".repeat(20_000));

        panel.scan_page(Some(&tab("https://example.com"))).await;
        match widget.try_recv().unwrap() {
            WidgetEvent::PageText { text } => assert_eq!(text.chars().count(), 15_000),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn scan_failures_reach_the_widget() {
        let bus = ExtensionBus::new();
        let (panel, mut widget) = panel(&bus);

        panel.scan_page(Some(&tab("https://example.com"))).await;
        assert_eq!(
            widget.try_recv().unwrap(),
            WidgetEvent::VerifyError {
                error: SCAN_FAILED.into()
            }
        );

        answer_extract(&bus, 5, String::new());
        panel.scan_page(Some(&tab("https://example.com"))).await;
        assert!(matches!(
            widget.try_recv().unwrap(),
            WidgetEvent::VerifyError { .. }
        ));

        panel.scan_page(Some(&tab("chrome://newtab"))).await;
        assert_eq!(
            widget.try_recv().unwrap(),
            WidgetEvent::VerifyError {
                error: ScanRefusal::Restricted.to_string()
            }
        );
    }

    #[tokio::test]
    async fn forwards_highlight_requests_to_the_tab() {
        let bus = ExtensionBus::new();
        let (panel, _widget) = panel(&bus);
        let mut tab_rx = bus.listen_tab(5);

        panel.highlight_claims(Some(&tab("https://example.com")), vec!["sky is blue".into()]);
        panel.update_claim_status(Some(&tab("https://example.com")), "sky is blue", "DISPUTED");

        let first = tab_rx.recv().await.unwrap();
        assert_eq!(
            first.message,
            Message::HighlightClaims {
                claims: vec!["sky is blue".into()]
            }
        );
        let second = tab_rx.recv().await.unwrap();
        assert_eq!(second.message.kind(), "UPDATE_CLAIM_STATUS");
    }
}
