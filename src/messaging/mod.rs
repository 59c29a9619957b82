//! Typed messages exchanged between the background worker, the content
//! script and the side panel.
//!
//! The JSON shape is the wire contract: `{"type": "HIGHLIGHT_CLAIMS",
//! "claims": [...]}` and so on. Replies are bare objects, `{"text": ...}` or
//! `{"success": true}`.

pub mod bus;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

pub use bus::{BusError, ExtensionBus};

pub type TabId = u32;
pub type WindowId = u32;

/// A browser tab as the extension APIs describe it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub window_id: WindowId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// background → panel: verify the user's selection.
    VerifyText { text: String },
    /// panel → content: reply with the page's main text.
    ExtractText,
    /// panel → content: highlight these claims.
    HighlightClaims { claims: Vec<String> },
    /// panel → content: remove every highlight.
    ClearHighlights,
    /// panel → content: paint a verdict on a claim's highlights. The verdict
    /// stays a string so unknown values reach the renderer, which ignores
    /// them.
    UpdateClaimStatus { claim: String, verdict: String },
    /// content → panel: the user clicked a highlighted claim.
    VerifyClaimFromPage { claim: String, context: String },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::VerifyText { .. } => "VERIFY_TEXT",
            Message::ExtractText => "EXTRACT_TEXT",
            Message::HighlightClaims { .. } => "HIGHLIGHT_CLAIMS",
            Message::ClearHighlights => "CLEAR_HIGHLIGHTS",
            Message::UpdateClaimStatus { .. } => "UPDATE_CLAIM_STATUS",
            Message::VerifyClaimFromPage { .. } => "VERIFY_CLAIM_FROM_PAGE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Text { text: String },
    Success { success: bool },
}

impl Response {
    pub fn ok() -> Self {
        Response::Success { success: true }
    }
}

/// A message in flight plus, for one-shot sends, the channel its reply
/// travels back on.
#[derive(Debug)]
pub struct Envelope {
    pub message: Message,
    reply: Option<oneshot::Sender<Response>>,
}

impl Envelope {
    pub fn notification(message: Message) -> Self {
        Self {
            message,
            reply: None,
        }
    }

    pub fn request(message: Message) -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message,
                reply: Some(tx),
            },
            rx,
        )
    }

    pub fn expects_response(&self) -> bool {
        self.reply.is_some()
    }

    /// Answer the sender. A sender that stopped waiting is not an error.
    pub fn respond(&mut self, response: Response) {
        if let Some(reply) = self.reply.take() {
            if reply.send(response).is_err() {
                log::debug!("{} reply dropped: sender went away", self.message.kind());
            }
        }
    }
}
