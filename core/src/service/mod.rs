/// Notes service: the REST backend as seen by the action layer
pub mod http;

use crate::error::Result;
use crate::models::{Discussion, Note, NotePayload, NoteResponse, NoteUpdate, PollRequest, PolledNotes};
use async_trait::async_trait;

pub use http::HttpNotesService;

#[async_trait]
pub trait NotesService: Send + Sync {
    /// All discussions at `path`
    async fn fetch_notes(&self, path: &str) -> Result<Vec<Discussion>>;

    async fn delete_note(&self, path: &str) -> Result<()>;

    async fn update_note(&self, endpoint: &str, note: &NoteUpdate) -> Result<Note>;

    async fn reply_to_discussion(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse>;

    async fn create_new_note(&self, endpoint: &str, data: &NotePayload) -> Result<NoteResponse>;

    /// Toggle award `name`; the body of the answer is passed through untouched
    async fn toggle_award(&self, endpoint: &str, name: &str) -> Result<serde_json::Value>;

    /// Changes since `request.last_fetched_at`
    async fn poll(&self, request: &PollRequest) -> Result<PolledNotes>;
}
