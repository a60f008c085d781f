/// UI event hub: flash messages and cross-component notifications
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Notice,
    Alert,
}

/// Transient user-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub message: String,
    pub level: FlashLevel,
    /// Target container; `None` is the page-wide flash area
    pub container: Option<String>,
}

/// Events for components outside the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Flash(FlashMessage),
    /// Hide whatever flash the container currently shows
    HideFlash { container: Option<String> },
    /// Autocomplete must forget cached command suggestions
    ClearCommandsCache,
    /// Consumed by the time tracking sidebar; carries the raw save response
    TimeTrackingUpdated { response: serde_json::Value },
    AwardAdded { name: String },
    ScrollToAwards,
}

#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<UiEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("UI event dropped, no subscribers");
        }
    }

    pub fn flash(&self, message: impl Into<String>, level: FlashLevel, container: Option<String>) {
        self.emit(UiEvent::Flash(FlashMessage {
            message: message.into(),
            level,
            container,
        }));
    }
}
