//! In-process stand-in for the extension runtime's message passing.
//!
//! One runtime listener (the side panel, when open) and one listener per tab
//! (that tab's content script). Sends to a missing or vanished listener fail
//! with [`BusError::NoReceiver`], the same way the browser rejects with
//! "Receiving end does not exist".

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

use super::{Envelope, Message, Response, TabId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("could not establish connection to {0}: receiving end does not exist")]
    NoReceiver(String),
    #[error("{0} closed the message channel before a response was received")]
    PortClosed(String),
    #[error("delivery task did not complete: {0}")]
    Aborted(String),
}

#[derive(Default)]
struct Listeners {
    runtime: Option<mpsc::UnboundedSender<Envelope>>,
    tabs: HashMap<TabId, mpsc::UnboundedSender<Envelope>>,
}

/// Cloneable handle; every clone addresses the same listeners.
#[derive(Clone, Default)]
pub struct ExtensionBus {
    inner: Arc<Mutex<Listeners>>,
}

impl ExtensionBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the runtime listener, replacing any previous one.
    pub fn listen_runtime(&self) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners().runtime = Some(tx);
        rx
    }

    pub fn has_runtime_listener(&self) -> bool {
        self.listeners()
            .runtime
            .as_ref()
            .map_or(false, |tx| !tx.is_closed())
    }

    /// Register a tab's content script, replacing any previous one.
    pub fn listen_tab(&self, tab: TabId) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners().tabs.insert(tab, tx);
        rx
    }

    pub fn remove_tab(&self, tab: TabId) {
        self.listeners().tabs.remove(&tab);
    }

    /// Fire-and-forget to the runtime listener.
    pub fn send_runtime_message(&self, message: Message) -> Result<(), BusError> {
        let kind = message.kind();
        let mut listeners = self.listeners();
        let delivered = match &listeners.runtime {
            Some(tx) => tx.send(Envelope::notification(message)).is_ok(),
            None => false,
        };
        if delivered {
            log::debug!("{} delivered to runtime listener", kind);
            Ok(())
        } else {
            listeners.runtime = None;
            Err(BusError::NoReceiver("runtime listener".into()))
        }
    }

    fn tab_sender(&self, tab: TabId) -> Result<mpsc::UnboundedSender<Envelope>, BusError> {
        let mut listeners = self.listeners();
        match listeners.tabs.get(&tab) {
            Some(tx) if !tx.is_closed() => Ok(tx.clone()),
            Some(_) => {
                listeners.tabs.remove(&tab);
                Err(BusError::NoReceiver(format!("tab {}", tab)))
            }
            None => Err(BusError::NoReceiver(format!("tab {}", tab))),
        }
    }

    /// One-shot request to a tab's content script; resolves with its reply.
    pub async fn send_tab_message(
        &self,
        tab: TabId,
        message: Message,
    ) -> Result<Response, BusError> {
        let tx = self.tab_sender(tab)?;
        let (envelope, reply) = Envelope::request(message);
        tx.send(envelope)
            .map_err(|_| BusError::NoReceiver(format!("tab {}", tab)))?;
        reply
            .await
            .map_err(|_| BusError::PortClosed(format!("tab {}", tab)))
    }

    /// Fire-and-forget to a tab's content script.
    pub fn notify_tab(&self, tab: TabId, message: Message) -> Result<(), BusError> {
        self.tab_sender(tab)?
            .send(Envelope::notification(message))
            .map_err(|_| BusError::NoReceiver(format!("tab {}", tab)))
    }
}
