//! Background worker: context menu, toolbar action and the hand-off of a
//! selection to a freshly opened side panel.
//!
//! The panel gets a fixed head start (`panel_ready_delay_ms`) to register its
//! listener before `VERIFY_TEXT` is sent. There is no readiness handshake: a
//! panel that is not listening by then misses the message, and the miss is
//! only logged.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::BackgroundConfig;
use crate::messaging::{BusError, ExtensionBus, Message, TabInfo, WindowId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not open side panel for window {window}: {reason}")]
pub struct PanelError {
    pub window: WindowId,
    pub reason: String,
}

/// Whatever can put the side panel on screen.
pub trait PanelHost: Send + Sync {
    fn open(&self, window: WindowId) -> Result<(), PanelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuContext {
    Selection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenuItem {
    pub id: String,
    pub title: String,
    pub contexts: Vec<MenuContext>,
}

/// What the browser reports when a context-menu item is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuClick {
    pub menu_item_id: String,
    pub selection_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Idle,
    PanelOpen,
}

/// A scheduled `VERIFY_TEXT` delivery. It can be awaited, not cancelled.
pub struct PendingDelivery {
    task: JoinHandle<Result<(), BusError>>,
}

impl PendingDelivery {
    pub async fn wait(self) -> Result<(), BusError> {
        self.task
            .await
            .map_err(|e| BusError::Aborted(e.to_string()))?
    }
}

pub struct BackgroundWorker {
    bus: ExtensionBus,
    panels: Arc<dyn PanelHost>,
    config: BackgroundConfig,
    menus: Vec<ContextMenuItem>,
    windows: HashMap<WindowId, WindowState>,
}

impl BackgroundWorker {
    pub fn new(bus: ExtensionBus, panels: Arc<dyn PanelHost>, config: BackgroundConfig) -> Self {
        Self {
            bus,
            panels,
            config,
            menus: Vec::new(),
            windows: HashMap::new(),
        }
    }

    /// Register the selection menu entry. Reinstalling leaves exactly one.
    pub fn on_installed(&mut self) {
        self.menus.clear();
        self.menus.push(ContextMenuItem {
            id: self.config.menu_id.clone(),
            title: self.config.menu_title.clone(),
            contexts: vec![MenuContext::Selection],
        });
        log::info!("Registered context menu {:?}", self.config.menu_id);
    }

    pub fn menus(&self) -> &[ContextMenuItem] {
        &self.menus
    }

    pub fn window_state(&self, window: WindowId) -> WindowState {
        self.windows
            .get(&window)
            .copied()
            .unwrap_or(WindowState::Idle)
    }

    fn open_panel(&mut self, window: WindowId) -> Result<(), PanelError> {
        self.panels.open(window)?;
        self.windows.insert(window, WindowState::PanelOpen);
        Ok(())
    }

    /// Menu chosen over a selection: open the panel, then after the ready
    /// delay send it the selected text. Must run inside a Tokio runtime.
    pub fn on_context_menu_clicked(
        &mut self,
        click: &MenuClick,
        tab: &TabInfo,
    ) -> Option<PendingDelivery> {
        if click.menu_item_id != self.config.menu_id {
            return None;
        }
        let text = click
            .selection_text
            .as_deref()
            .filter(|t| !t.is_empty())?
            .to_string();

        if let Err(e) = self.open_panel(tab.window_id) {
            log::error!("{}", e);
            return None;
        }

        let bus = self.bus.clone();
        let delay = self.config.panel_ready_delay();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let sent = bus.send_runtime_message(Message::VerifyText { text });
            if let Err(e) = &sent {
                log::warn!("Side panel not ready for selection: {}", e);
            }
            sent
        });
        Some(PendingDelivery { task })
    }

    /// Toolbar icon: open the panel, send nothing.
    pub fn on_action_clicked(&mut self, tab: &TabInfo) {
        if let Err(e) = self.open_panel(tab.window_id) {
            log::error!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::config::Config;
    use crate::messaging::Envelope;
    use tokio::sync::mpsc;

    /// Opens a panel that starts listening after `startup`.
    struct FakePanels {
        bus: ExtensionBus,
        startup: Duration,
        opened: Mutex<Vec<WindowId>>,
        inbox: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    }

    impl FakePanels {
        fn new(bus: &ExtensionBus, startup: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<Envelope>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let panels = Arc::new(Self {
                bus: bus.clone(),
                startup,
                opened: Mutex::new(Vec::new()),
                inbox: Mutex::new(Some(tx)),
            });
            (panels, rx)
        }
    }

    impl PanelHost for FakePanels {
        fn open(&self, window: WindowId) -> Result<(), PanelError> {
            self.opened.lock().unwrap().push(window);
            let bus = self.bus.clone();
            let startup = self.startup;
            let Some(inbox) = self.inbox.lock().unwrap().take() else {
                return Ok(());
            };
            tokio::spawn(async move {
                tokio::time::sleep(startup).await;
                let mut rx = bus.listen_runtime();
                while let Some(env) = rx.recv().await {
                    if inbox.send(env).is_err() {
                        break;
                    }
                }
            });
            Ok(())
        }
    }

    struct BrokenPanels;

    impl PanelHost for BrokenPanels {
        fn open(&self, window: WindowId) -> Result<(), PanelError> {
            Err(PanelError {
                window,
                reason: "no user gesture".into(),
            })
        }
    }

    fn tab() -> TabInfo {
        TabInfo {
            id: 1,
            window_id: 9,
            url: "https://example.com".into(),
        }
    }

    fn selection(text: &str) -> MenuClick {
        MenuClick {
            menu_item_id: BackgroundConfig::default().menu_id,
            selection_text: Some(text.into()),
        }
    }

    #[test]
    fn install_registers_one_selection_menu() {
        let bus = ExtensionBus::new();
        let mut worker = BackgroundWorker::new(bus, Arc::new(BrokenPanels), BackgroundConfig::default());
        worker.on_installed();
        worker.on_installed();
        assert_eq!(worker.menus().len(), 1);
        assert_eq!(worker.menus()[0].contexts, vec![MenuContext::Selection]);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_reaches_panel_that_starts_in_time() {
        let bus = ExtensionBus::new();
        let (panels, mut inbox) = FakePanels::new(&bus, Duration::from_millis(100));
        let mut worker = BackgroundWorker::new(bus, panels.clone(), BackgroundConfig::default());
        worker.on_installed();

        let pending = worker
            .on_context_menu_clicked(&selection("GDP grew 3%"), &tab())
            .unwrap();
        assert_eq!(worker.window_state(9), WindowState::PanelOpen);
        assert_eq!(*panels.opened.lock().unwrap(), vec![9]);

        assert_eq!(pending.wait().await, Ok(()));
        let env = inbox.recv().await.unwrap();
        assert_eq!(
            env.message,
            Message::VerifyText {
                text: "GDP grew 3%".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_panel_misses_the_selection() {
        let bus = ExtensionBus::new();
        let (panels, mut inbox) = FakePanels::new(&bus, Duration::from_millis(900));
        let mut worker = BackgroundWorker::new(bus, panels, BackgroundConfig::default());

        let pending = worker
            .on_context_menu_clicked(&selection("GDP grew 3%"), &tab())
            .unwrap();
        assert!(matches!(pending.wait().await, Err(BusError::NoReceiver(_))));

        // No retry once the panel does come up.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn longer_delay_gives_slow_panel_time() {
        let bus = ExtensionBus::new();
        let (panels, mut inbox) = FakePanels::new(&bus, Duration::from_millis(900));
        let config = Config::default()
            .with_panel_ready_delay(Duration::from_secs(1))
            .background;
        let mut worker = BackgroundWorker::new(bus, panels, config);

        let pending = worker
            .on_context_menu_clicked(&selection("GDP grew 3%"), &tab())
            .unwrap();
        assert_eq!(pending.wait().await, Ok(()));
        assert!(inbox.recv().await.is_some());
    }

    #[tokio::test]
    async fn empty_selection_or_other_menu_does_nothing() {
        let bus = ExtensionBus::new();
        let (panels, _inbox) = FakePanels::new(&bus, Duration::ZERO);
        let mut worker = BackgroundWorker::new(bus, panels.clone(), BackgroundConfig::default());

        assert!(worker.on_context_menu_clicked(&selection(""), &tab()).is_none());
        let other = MenuClick {
            menu_item_id: "something-else".into(),
            selection_text: Some("text".into()),
        };
        assert!(worker.on_context_menu_clicked(&other, &tab()).is_none());
        assert!(panels.opened.lock().unwrap().is_empty());
        assert_eq!(worker.window_state(9), WindowState::Idle);
    }

    #[tokio::test]
    async fn action_click_opens_panel_without_message() {
        let bus = ExtensionBus::new();
        let (panels, mut inbox) = FakePanels::new(&bus, Duration::ZERO);
        let mut worker = BackgroundWorker::new(bus, panels.clone(), BackgroundConfig::default());
        worker.on_action_clicked(&tab());
        assert_eq!(*panels.opened.lock().unwrap(), vec![9]);
        tokio::task::yield_now().await;
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_open_schedules_nothing() {
        let bus = ExtensionBus::new();
        let mut worker = BackgroundWorker::new(bus, Arc::new(BrokenPanels), BackgroundConfig::default());
        assert!(worker
            .on_context_menu_clicked(&selection("text"), &tab())
            .is_none());
        assert_eq!(worker.window_state(9), WindowState::Idle);
    }
}
