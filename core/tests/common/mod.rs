// Scripted in-memory notes service shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use threadline_core::awards::AwardsBar;
use threadline_core::models::{
    Discussion, Note, NotePayload, NoteResponse, NoteUpdate, PollRequest, PollResponse,
    PolledNotes,
};
use threadline_core::service::NotesService;
use threadline_core::utils::{EventHub, UiEvent};
use threadline_core::{NotesActions, NotesError, NotesStore, Result};
use tokio::sync::{broadcast, Notify};

#[derive(Default)]
pub struct FakeService {
    pub discussions: Mutex<Vec<Discussion>>,
    pub poll_script: Mutex<VecDeque<std::result::Result<PolledNotes, String>>>,
    pub poll_requests: Mutex<Vec<PollRequest>>,
    pub poll_interval: Mutex<Option<i64>>,
    pub fail_polls: AtomicBool,
    pub save_script: Mutex<VecDeque<std::result::Result<Value, String>>>,
    pub saved: Mutex<Vec<(String, NotePayload)>>,
    pub deleted: Mutex<Vec<String>>,
    pub awards: Mutex<Vec<(String, String)>>,
    pub fail_awards: AtomicBool,
    pub hold_saves: AtomicBool,
    /// Hold the next poll until `poll_release` is notified
    pub hold_polls: AtomicBool,
    pub poll_entered: Notify,
    pub poll_release: Notify,
    pub save_entered: Notify,
    pub save_release: Notify,
    cursor: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn poll_count(&self) -> usize {
        self.poll_requests.lock().unwrap().len()
    }

    pub fn script_poll(&self, notes: Vec<Note>, last_fetched_at: i64) {
        self.poll_script.lock().unwrap().push_back(Ok(PolledNotes {
            response: PollResponse { notes, last_fetched_at },
            poll_interval: None,
        }));
    }

    pub fn script_save(&self, body: Value) {
        self.save_script.lock().unwrap().push_back(Ok(body));
    }

    pub fn script_save_failure(&self, message: &str) {
        self.save_script.lock().unwrap().push_back(Err(message.to_string()));
    }

    async fn save(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse> {
        self.saved
            .lock()
            .unwrap()
            .push((endpoint.to_string(), data.clone()));
        if self.hold_saves.load(Ordering::SeqCst) {
            self.save_entered.notify_one();
            self.save_release.notified().await;
        }
        let scripted = self.save_script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(body)) => Ok(serde_json::from_value(body)?),
            Some(Err(message)) => Err(NotesError::Http(message)),
            None => Err(NotesError::Http("no scripted save response".to_string())),
        }
    }
}

#[async_trait]
impl NotesService for FakeService {
    async fn fetch_notes(&self, _path: &str) -> Result<Vec<Discussion>> {
        Ok(self.discussions.lock().unwrap().clone())
    }

    async fn delete_note(&self, path: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn update_note(&self, _endpoint: &str, note: &NoteUpdate) -> Result<Note> {
        let id = note.target_id.unwrap_or(1);
        Ok(Note::new(id, note.note.note.clone()))
    }

    async fn reply_to_discussion(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse> {
        self.save(endpoint, data).await
    }

    async fn create_new_note(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse> {
        self.save(endpoint, data).await
    }

    async fn toggle_award(&self, endpoint: &str, name: &str) -> Result<Value> {
        if self.fail_awards.load(Ordering::SeqCst) {
            return Err(NotesError::Status { status: 500, body: "boom".to_string() });
        }
        self.awards
            .lock()
            .unwrap()
            .push((endpoint.to_string(), name.to_string()));
        Ok(Value::Null)
    }

    async fn poll(&self, request: &PollRequest) -> Result<PolledNotes> {
        self.poll_requests.lock().unwrap().push(request.clone());
        if self.hold_polls.swap(false, Ordering::SeqCst) {
            self.poll_entered.notify_one();
            self.poll_release.notified().await;
        }
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(NotesError::Http("connection refused".to_string()));
        }
        let scripted = self.poll_script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(polled)) => Ok(polled),
            Some(Err(message)) => Err(NotesError::Http(message)),
            None => {
                let cursor = self.cursor.fetch_add(1, Ordering::SeqCst) as i64 + 1000;
                Ok(PolledNotes {
                    response: PollResponse { notes: Vec::new(), last_fetched_at: cursor },
                    poll_interval: *self.poll_interval.lock().unwrap(),
                })
            }
        }
    }
}

/// Award bar that records calls and can be told to fail
#[derive(Default)]
pub struct RecordingAwardsBar {
    pub added: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl AwardsBar for RecordingAwardsBar {
    async fn add_award_to_emoji_bar(&self, award: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotesError::Http("awards handler failed to load".to_string()));
        }
        self.added.lock().unwrap().push(award.to_string());
        Ok(())
    }

    async fn scroll_to_awards(&self) -> Result<()> {
        Ok(())
    }
}

pub fn actions_with(service: Arc<FakeService>) -> NotesActions {
    NotesActions::new(service, NotesStore::new(), EventHub::new())
}

/// Events received so far, without waiting
pub fn drain(rx: &mut broadcast::Receiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
