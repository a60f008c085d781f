/// Notes actions: service call, response handling, store commits and UI side effects
use crate::awards::{AwardsBar, EventAwardsBar};
use crate::error::{NotesError, Result};
use crate::models::{
    Author, Discussion, IssueData, Note, NoteFormData, NoteId, NotePayload, NoteResponse,
    NoteUpdate, NotesData, PlaceholderKind, PollResponse,
};
use crate::poll::{PollConfig, PollController, PollTarget};
use crate::quick_actions::{self, QuickActions};
use crate::service::NotesService;
use crate::store::{Mutation, NotesStore};
use crate::utils::{EventHub, FlashLevel, UiEvent};
use crate::visibility::VisibilitySource;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const POLL_ERROR_MESSAGE: &str = "Something went wrong while fetching latest comments.";
pub const AWARD_ERROR_MESSAGE: &str =
    "Something went wrong while adding your award. Please try again.";
pub const COMMANDS_APPLIED_MESSAGE: &str = "Commands applied";

/// Reduce a poll response into the store.
///
/// Known note ids are updated, replies to known discussions are appended and
/// everything else becomes a new top-level note. Routing and commits happen
/// under one write lock so a concurrent save cannot slip in between.
pub async fn apply_poll_response(store: &NotesStore, response: PollResponse) {
    store
        .commit_with(|state| state.apply_poll_response(response))
        .await;
}

/// The request the poll loop repeats
#[derive(Clone)]
pub struct NotesPollTarget {
    service: Arc<dyn NotesService>,
    store: NotesStore,
    events: EventHub,
}

impl NotesPollTarget {
    pub fn new(service: Arc<dyn NotesService>, store: NotesStore, events: EventHub) -> Self {
        Self {
            service,
            store,
            events,
        }
    }
}

#[async_trait]
impl PollTarget for NotesPollTarget {
    async fn request(&self) -> Result<Option<i64>> {
        let request = self.store.poll_request().await;
        let polled = self.service.poll(&request).await?;
        debug!(
            "Poll returned {} notes, cursor {}",
            polled.response.notes.len(),
            polled.response.last_fetched_at
        );
        apply_poll_response(&self.store, polled.response).await;
        Ok(polled.poll_interval)
    }

    async fn request_failed(&self, _error: &NotesError) {
        self.events.flash(POLL_ERROR_MESSAGE, FlashLevel::Alert, None);
    }
}

/// Named operations over the notes store
#[derive(Clone)]
pub struct NotesActions {
    service: Arc<dyn NotesService>,
    store: NotesStore,
    events: EventHub,
    awards_bar: Arc<dyn AwardsBar>,
    quick_actions: Arc<QuickActions>,
    poller: Arc<PollController>,
}

impl NotesActions {
    pub fn new(service: Arc<dyn NotesService>, store: NotesStore, events: EventHub) -> Self {
        Self {
            awards_bar: Arc::new(EventAwardsBar::new(events.clone())),
            quick_actions: Arc::new(QuickActions::default()),
            poller: Arc::new(PollController::new(PollConfig::default())),
            service,
            store,
            events,
        }
    }

    pub fn with_awards_bar(mut self, awards_bar: Arc<dyn AwardsBar>) -> Self {
        self.awards_bar = awards_bar;
        self
    }

    pub fn with_quick_actions(mut self, quick_actions: QuickActions) -> Self {
        self.quick_actions = Arc::new(quick_actions);
        self
    }

    pub fn with_poller(mut self, poller: Arc<PollController>) -> Self {
        self.poller = poller;
        self
    }

    pub fn store(&self) -> &NotesStore {
        &self.store
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn poller(&self) -> &Arc<PollController> {
        &self.poller
    }

    pub async fn set_notes_data(&self, data: NotesData) {
        self.store.commit(Mutation::SetNotesData(data)).await;
    }

    pub async fn set_issue_data(&self, data: IssueData) {
        self.store.commit(Mutation::SetIssueData(data)).await;
    }

    pub async fn set_user_data(&self, user: Author) {
        self.store.commit(Mutation::SetUserData(user)).await;
    }

    pub async fn set_last_fetched_at(&self, ts: i64) {
        self.store.commit(Mutation::SetLastFetchedAt(ts)).await;
    }

    pub async fn set_initial_notes(&self, discussions: Vec<Discussion>) {
        self.store.commit(Mutation::SetInitialNotes(discussions)).await;
    }

    pub async fn set_target_note_hash(&self, hash: impl Into<String>) {
        self.store
            .commit(Mutation::SetTargetNoteHash(hash.into()))
            .await;
    }

    pub async fn toggle_discussion(&self, discussion_id: impl Into<String>) {
        self.store
            .commit(Mutation::ToggleDiscussion {
                discussion_id: discussion_id.into(),
            })
            .await;
    }

    pub async fn remove_placeholder_notes(&self) {
        self.store.commit(Mutation::RemovePlaceholderNotes).await;
    }

    pub async fn fetch_notes(&self, path: &str) -> Result<()> {
        let discussions = self.service.fetch_notes(path).await?;
        info!("Fetched {} discussions", discussions.len());
        self.store
            .commit(Mutation::SetInitialNotes(discussions))
            .await;
        Ok(())
    }

    pub async fn delete_note(&self, note: &Note) -> Result<()> {
        let path = note
            .path
            .as_deref()
            .ok_or_else(|| NotesError::InvalidNote(format!("note {} has no path", note.id)))?;
        self.service.delete_note(path).await?;
        self.store.commit(Mutation::DeleteNote(note.clone())).await;
        Ok(())
    }

    pub async fn update_note(&self, endpoint: &str, note: &NoteUpdate) -> Result<Note> {
        let updated = self.service.update_note(endpoint, note).await?;
        self.store
            .commit(Mutation::UpdateNote(updated.clone()))
            .await;
        Ok(updated)
    }

    pub async fn reply_to_discussion(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse> {
        let response = self.service.reply_to_discussion(endpoint, data).await?;
        if let Some(note) = &response.note {
            self.store
                .commit(Mutation::AddNewReplyToDiscussion(note.clone()))
                .await;
        }
        Ok(response)
    }

    /// Validation errors come back inside the response and are left to the caller
    pub async fn create_new_note(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse> {
        let response = self.service.create_new_note(endpoint, data).await?;
        if !response.has_errors() {
            if let Some(note) = &response.note {
                self.store.commit(Mutation::AddNewNote(note.clone())).await;
            }
        }
        Ok(response)
    }

    /// Submit a note from the form: placeholders first, then the request,
    /// then the quick action side effects
    pub async fn save_note(&self, form: &NoteFormData) -> Result<NoteResponse> {
        let body = &form.data.note.note;
        let container = form.flash_container.clone();
        let has_quick_actions = quick_actions::has_quick_actions(body);
        let reply_id = form.data.in_reply_to_discussion_id.clone();

        self.store.commit(Mutation::RemovePlaceholderNotes).await;
        self.events.emit(UiEvent::HideFlash {
            container: container.clone(),
        });

        let placeholder_text = if has_quick_actions {
            quick_actions::strip_quick_actions(body)
        } else {
            body.clone()
        };
        if !placeholder_text.is_empty() {
            self.store
                .commit(Mutation::ShowPlaceholderNote {
                    body: placeholder_text,
                    reply_id: reply_id.clone(),
                    kind: PlaceholderKind::Text,
                })
                .await;
        }
        if has_quick_actions {
            self.store
                .commit(Mutation::ShowPlaceholderNote {
                    body: self.quick_actions.placeholder_text(body),
                    reply_id: reply_id.clone(),
                    kind: PlaceholderKind::System,
                })
                .await;
        }

        let result = match &reply_id {
            Some(_) => self.reply_to_discussion(&form.endpoint, &form.data).await,
            None => self.create_new_note(&form.endpoint, &form.data).await,
        };
        let response = match result {
            Ok(r) => r,
            Err(e) => {
                self.store.commit(Mutation::RemovePlaceholderNotes).await;
                return Err(e);
            }
        };

        if has_quick_actions && response.has_errors() {
            self.refresh_now().await;
            self.events.emit(UiEvent::ClearCommandsCache);
            self.events
                .flash(COMMANDS_APPLIED_MESSAGE, FlashLevel::Notice, container.clone());
        }

        if let Some(changes) = &response.commands_changes {
            if let Some(award) = &changes.emoji_award {
                self.add_award_to_bar(award, container.clone()).await;
            }
            if changes.touches_time_tracking() {
                self.events.emit(UiEvent::TimeTrackingUpdated {
                    response: response.raw.clone(),
                });
            }
        }

        if let Some(message) = response.commands_only() {
            self.events.flash(message, FlashLevel::Notice, container);
        }
        self.store.commit(Mutation::RemovePlaceholderNotes).await;

        Ok(response)
    }

    async fn add_award_to_bar(&self, award: &str, container: Option<String>) {
        let result = async {
            self.awards_bar.add_award_to_emoji_bar(award).await?;
            self.awards_bar.scroll_to_awards().await
        }
        .await;
        if let Err(e) = result {
            warn!("Award bar update failed: {}", e);
            self.events.flash(AWARD_ERROR_MESSAGE, FlashLevel::Alert, container);
        }
    }

    /// Immediate poll through the running loop, or a one-shot fetch without one
    async fn refresh_now(&self) {
        if !self.poller.make_request().await {
            self.fetch_data().await;
        }
    }

    /// Start polling for changes
    pub async fn poll(&self, visibility: &dyn VisibilitySource) -> Result<()> {
        let target = NotesPollTarget::new(
            self.service.clone(),
            self.store.clone(),
            self.events.clone(),
        );
        self.poller.start(Arc::new(target), visibility).await
    }

    pub async fn stop_polling(&self) {
        if !self.poller.stop().await {
            debug!("Stop requested but polling is not running");
        }
    }

    pub async fn restart_polling(&self) {
        if !self.poller.restart().await {
            debug!("Restart requested but polling is not running");
        }
    }

    /// One poll outside the loop; failures become a flash message
    pub async fn fetch_data(&self) {
        let request = self.store.poll_request().await;
        match self.service.poll(&request).await {
            Ok(polled) => apply_poll_response(&self.store, polled.response).await,
            Err(e) => {
                warn!("Fetching latest notes failed: {}", e);
                self.events.flash(POLL_ERROR_MESSAGE, FlashLevel::Alert, None);
            }
        }
    }

    pub async fn toggle_award(&self, award_name: &str, note_id: NoteId) {
        self.store
            .commit(Mutation::ToggleAward {
                award_name: award_name.to_string(),
                note_id,
            })
            .await;
    }

    /// Toggle on the server, then locally. A failed request changes nothing.
    pub async fn toggle_award_request(&self, endpoint: &str, award_name: &str, note_id: NoteId) -> Result<()> {
        self.service.toggle_award(endpoint, award_name).await?;
        self.toggle_award(award_name, note_id).await;
        Ok(())
    }
}
