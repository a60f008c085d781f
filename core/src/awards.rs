/// Award bar widget that reacts to `/award` quick actions
use crate::error::Result;
use crate::utils::{EventHub, UiEvent};
use async_trait::async_trait;

#[async_trait]
pub trait AwardsBar: Send + Sync {
    async fn add_award_to_emoji_bar(&self, award: &str) -> Result<()>;
    async fn scroll_to_awards(&self) -> Result<()>;
}

/// Award bar that forwards updates to the UI event hub
#[derive(Clone)]
pub struct EventAwardsBar {
    events: EventHub,
}

impl EventAwardsBar {
    pub fn new(events: EventHub) -> Self {
        Self { events }
    }
}

#[async_trait]
impl AwardsBar for EventAwardsBar {
    async fn add_award_to_emoji_bar(&self, award: &str) -> Result<()> {
        self.events.emit(UiEvent::AwardAdded {
            name: award.to_string(),
        });
        Ok(())
    }

    async fn scroll_to_awards(&self) -> Result<()> {
        self.events.emit(UiEvent::ScrollToAwards);
        Ok(())
    }
}
