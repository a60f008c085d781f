/// Shared helpers
pub mod event_emitter;

pub use event_emitter::{EventHub, FlashLevel, FlashMessage, UiEvent};
