//! The content script: owner and sole mutator of the page DOM.
//!
//! Answers the side panel's requests (`EXTRACT_TEXT`, `HIGHLIGHT_CLAIMS`,
//! `CLEAR_HIGHLIGHTS`, `UPDATE_CLAIM_STATUS`) and turns clicks on
//! highlights into `VERIFY_CLAIM_FROM_PAGE` notifications.

pub mod context;
pub mod extract;
pub mod highlight;
pub mod verdict;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ContentConfig;
use crate::dom::selector::Selector;
use crate::dom::{Document, NodeId};
use crate::messaging::{Envelope, ExtensionBus, Message, Response, TabId};

/// Class carried by every highlight span.
pub const HIGHLIGHT_CLASS: &str = "dc-highlight";
/// Class carried by verdict badges inside a highlight.
pub const BADGE_CLASS: &str = "dc-verdict-badge";
/// Attribute holding a highlight's literal claim text.
pub const CLAIM_ATTR: &str = "data-claim";

/// A click as seen by the page after the content script handled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub target: NodeId,
    pub propagation_stopped: bool,
    pub default_prevented: bool,
    /// Notification sent to the side panel, if the click hit a highlight.
    pub dispatched: Option<Message>,
}

pub struct ContentScript {
    doc: Document,
    bus: ExtensionBus,
    config: ContentConfig,
}

impl ContentScript {
    pub fn new(doc: Document, bus: ExtensionBus, config: ContentConfig) -> Self {
        Self { doc, bus, config }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Handle one message. `None` means the message is not for the content
    /// script and no reply is due.
    pub fn handle_message(&mut self, message: &Message) -> Option<Response> {
        match message {
            Message::ExtractText => {
                let text = extract::extract_content(&self.doc, &self.config);
                log::info!("Extracted text length: {}", text.chars().count());
                Some(Response::Text { text })
            }
            Message::HighlightClaims { claims } => {
                highlight::highlight_claims(&mut self.doc, claims, self.config.min_claim_chars);
                Some(Response::ok())
            }
            Message::ClearHighlights => {
                highlight::clear_highlights(&mut self.doc);
                Some(Response::ok())
            }
            Message::UpdateClaimStatus { claim, verdict } => {
                verdict::apply_verdict(&mut self.doc, claim, verdict);
                Some(Response::ok())
            }
            Message::VerifyText { .. } | Message::VerifyClaimFromPage { .. } => None,
        }
    }

    /// Deliver a click on `target`. Clicks inside a highlight are consumed
    /// and reported to the side panel; anything else passes through.
    pub fn click(&mut self, target: NodeId) -> ClickEvent {
        let mut event = ClickEvent {
            target,
            propagation_stopped: false,
            default_prevented: false,
            dispatched: None,
        };
        let Some(span) = self.doc.closest(target, &Selector::class(HIGHLIGHT_CLASS)) else {
            return event;
        };
        event.propagation_stopped = true;
        event.default_prevented = true;

        let claim = self.doc.attr(span, CLAIM_ATTR).unwrap_or_default().to_string();
        let context =
            context::synthesize_context(&self.doc, span, &claim, self.config.context_max_chars);
        let message = Message::VerifyClaimFromPage { claim, context };

        if let Err(e) = self.bus.send_runtime_message(message.clone()) {
            log::warn!("Could not send claim to side panel: {}", e);
        }
        event.dispatched = Some(message);
        event
    }

    fn handle_envelope(&mut self, mut envelope: Envelope) {
        log::debug!("Content script received {}", envelope.message.kind());
        if let Some(response) = self.handle_message(&envelope.message) {
            envelope.respond(response);
        }
    }

    /// Attach to `tab` on the bus and serve messages and clicks until the
    /// returned handle is shut down.
    pub fn spawn(self, tab: TabId) -> ContentScriptHandle {
        let envelopes = self.bus.listen_tab(tab);
        let (click_tx, clicks) = mpsc::unbounded_channel();
        let bus = self.bus.clone();
        let task = tokio::spawn(self.run(envelopes, clicks));
        log::info!("Content script attached to tab {}", tab);
        ContentScriptHandle {
            tab,
            bus,
            clicks: click_tx,
            task,
        }
    }

    /// One event at a time, so DOM mutations never interleave. Queued
    /// messages are drained before a shutdown takes effect.
    async fn run(
        mut self,
        mut envelopes: mpsc::UnboundedReceiver<Envelope>,
        mut clicks: mpsc::UnboundedReceiver<NodeId>,
    ) -> Self {
        loop {
            tokio::select! {
                biased;

                envelope = envelopes.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope),
                    None => break,
                },
                click = clicks.recv() => match click {
                    Some(target) => {
                        self.click(target);
                    }
                    None => break,
                },
            }
        }
        self
    }
}

/// Running content script.
pub struct ContentScriptHandle {
    tab: TabId,
    bus: ExtensionBus,
    clicks: mpsc::UnboundedSender<NodeId>,
    task: JoinHandle<ContentScript>,
}

impl ContentScriptHandle {
    pub fn tab(&self) -> TabId {
        self.tab
    }

    /// Queue a user click on `target`.
    pub fn click(&self, target: NodeId) {
        if self.clicks.send(target).is_err() {
            log::warn!("Content script for tab {} is gone", self.tab);
        }
    }

    /// Detach from the bus and hand back the script with its DOM.
    pub async fn shutdown(self) -> Option<ContentScript> {
        self.bus.remove_tab(self.tab);
        drop(self.clicks);
        match self.task.await {
            Ok(script) => Some(script),
            Err(e) => {
                log::error!("Content script task for tab {} failed: {}", self.tab, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dom::parser::parse_html;
    use highlight::highlights_for;

    const PAGE: &str = "<html><head><title>Test Page</title></head>\
                        <body><h1>Test Page</h1><p>The sky is blue today.</p></body></html>";

    fn script(bus: &ExtensionBus) -> ContentScript {
        ContentScript::new(parse_html(PAGE, "https://example.com"), bus.clone(), ContentConfig::default())
    }

    #[test]
    fn extract_replies_with_text() {
        let mut cs = script(&ExtensionBus::new());
        let reply = cs.handle_message(&Message::ExtractText);
        assert_eq!(
            reply,
            Some(Response::Text {
                text: "Test Page\n\nThe sky is blue today.".into()
            })
        );
    }

    #[test]
    fn clicking_a_highlight_notifies_the_panel() {
        let bus = ExtensionBus::new();
        let mut panel = bus.listen_runtime();
        let mut cs = script(&bus);
        cs.handle_message(&Message::HighlightClaims {
            claims: vec!["sky is blue".into()],
        });
        let span = highlights_for(cs.document(), "sky is blue").next().unwrap();
        let inner = cs.document().children(span)[0];

        let event = cs.click(inner);
        assert!(event.propagation_stopped && event.default_prevented);

        let env = panel.try_recv().unwrap();
        match env.message {
            Message::VerifyClaimFromPage { claim, context } => {
                assert_eq!(claim, "sky is blue");
                assert!(context.contains("Page: Test Page"), "{}", context);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn click_without_panel_still_completes() {
        let mut cs = script(&ExtensionBus::new());
        cs.handle_message(&Message::HighlightClaims {
            claims: vec!["sky is blue".into()],
        });
        let span = highlights_for(cs.document(), "sky is blue").next().unwrap();
        let event = cs.click(span);
        assert!(matches!(
            event.dispatched,
            Some(Message::VerifyClaimFromPage { .. })
        ));
    }

    #[test]
    fn click_outside_highlight_passes_through() {
        let bus = ExtensionBus::new();
        let mut panel = bus.listen_runtime();
        let mut cs = script(&bus);
        let body = cs.document().body().unwrap();
        let event = cs.click(body);
        assert!(!event.propagation_stopped);
        assert!(event.dispatched.is_none());
        assert!(panel.try_recv().is_err());
    }

    #[test]
    fn click_on_a_node_from_another_page_passes_through() {
        let other = parse_html(&format!("<body>{}</body>", "<p>x</p>".repeat(20)), "");
        let foreign = *other.descendants(other.root()).last().unwrap();
        let bus = ExtensionBus::new();
        let mut panel = bus.listen_runtime();
        let mut cs = script(&bus);
        let event = cs.click(foreign);
        assert!(!event.propagation_stopped);
        assert!(event.dispatched.is_none());
        assert!(panel.try_recv().is_err());
    }

    #[test]
    fn panel_bound_messages_get_no_reply() {
        let mut cs = script(&ExtensionBus::new());
        assert_eq!(
            cs.handle_message(&Message::VerifyText { text: "x".into() }),
            None
        );
    }

    #[tokio::test]
    async fn queued_clicks_reach_the_panel() {
        let bus = ExtensionBus::new();
        let mut panel = bus.listen_runtime();
        let mut cs = script(&bus);
        cs.handle_message(&Message::HighlightClaims {
            claims: vec!["sky is blue".into()],
        });
        let span = highlights_for(cs.document(), "sky is blue").next().unwrap();

        let handle = cs.spawn(2);
        assert_eq!(handle.tab(), 2);
        handle.click(span);
        let env = panel.recv().await.unwrap();
        assert_eq!(env.message.kind(), "VERIFY_CLAIM_FROM_PAGE");

        let doc = handle.shutdown().await.unwrap().into_document();
        assert_eq!(highlights_for(&doc, "sky is blue").count(), 1);
    }

    #[test]
    fn configured_minimum_claim_length_applies() {
        let config = Config::default().with_min_claim_chars(20).content;
        let mut cs = ContentScript::new(parse_html(PAGE, ""), ExtensionBus::new(), config);
        cs.handle_message(&Message::HighlightClaims {
            claims: vec!["sky is blue".into()],
        });
        assert_eq!(highlights_for(cs.document(), "sky is blue").count(), 0);
    }

    #[tokio::test]
    async fn spawned_script_serves_tab_requests() {
        let bus = ExtensionBus::new();
        let handle = script(&bus).spawn(4);

        let reply = bus
            .send_tab_message(
                4,
                Message::HighlightClaims {
                    claims: vec!["sky is blue".into()],
                },
            )
            .await;
        assert_eq!(reply, Ok(Response::ok()));
        let reply = bus
            .send_tab_message(
                4,
                Message::UpdateClaimStatus {
                    claim: "sky is blue".into(),
                    verdict: "SUPPORTED".into(),
                },
            )
            .await;
        assert_eq!(reply, Ok(Response::ok()));

        let cs = handle.shutdown().await.unwrap();
        let doc = cs.document();
        let span = highlights_for(doc, "sky is blue").next().unwrap();
        assert_eq!(doc.style(span).get("background-color"), Some("#e6f4ea"));
        assert!(bus.notify_tab(4, Message::ClearHighlights).is_err());
    }
}
