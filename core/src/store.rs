/// Shared notes state, mutated only through named mutations
use crate::models::{
    Author, AwardEmoji, Discussion, DiscussionId, IssueData, Note, NoteId, NotesData,
    PlaceholderKind, PollRequest, PollResponse,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

/// Every change the store accepts
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    SetNotesData(NotesData),
    SetIssueData(IssueData),
    SetUserData(Author),
    SetLastFetchedAt(i64),
    SetInitialNotes(Vec<Discussion>),
    SetTargetNoteHash(String),
    ToggleDiscussion {
        discussion_id: DiscussionId,
    },
    ShowPlaceholderNote {
        body: String,
        reply_id: Option<DiscussionId>,
        kind: PlaceholderKind,
    },
    RemovePlaceholderNotes,
    AddNewNote(Note),
    AddNewReplyToDiscussion(Note),
    UpdateNote(Note),
    DeleteNote(Note),
    ToggleAward {
        award_name: String,
        note_id: NoteId,
    },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::SetNotesData(_) => "SET_NOTES_DATA",
            Mutation::SetIssueData(_) => "SET_ISSUE_DATA",
            Mutation::SetUserData(_) => "SET_USER_DATA",
            Mutation::SetLastFetchedAt(_) => "SET_LAST_FETCHED_AT",
            Mutation::SetInitialNotes(_) => "SET_INITIAL_NOTES",
            Mutation::SetTargetNoteHash(_) => "SET_TARGET_NOTE_HASH",
            Mutation::ToggleDiscussion { .. } => "TOGGLE_DISCUSSION",
            Mutation::ShowPlaceholderNote { .. } => "SHOW_PLACEHOLDER_NOTE",
            Mutation::RemovePlaceholderNotes => "REMOVE_PLACEHOLDER_NOTES",
            Mutation::AddNewNote(_) => "ADD_NEW_NOTE",
            Mutation::AddNewReplyToDiscussion(_) => "ADD_NEW_REPLY_TO_DISCUSSION",
            Mutation::UpdateNote(_) => "UPDATE_NOTE",
            Mutation::DeleteNote(_) => "DELETE_NOTE",
            Mutation::ToggleAward { .. } => "TOGGLE_AWARD",
        }
    }
}

/// Notes state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotesState {
    /// Discussions in display order
    pub notes: Vec<Discussion>,
    pub notes_data: NotesData,
    pub issue_data: Option<IssueData>,
    pub user_data: Option<Author>,
    pub target_note_hash: Option<String>,
    pub last_fetched_at: Option<i64>,
}

impl NotesState {
    /// All confirmed notes keyed by id
    pub fn notes_by_id(&self) -> HashMap<NoteId, &Note> {
        self.notes
            .iter()
            .flat_map(|d| d.notes.iter())
            .filter(|n| !n.is_placeholder())
            .map(|n| (n.id, n))
            .collect()
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes
            .iter()
            .flat_map(|d| d.notes.iter())
            .find(|n| n.id == id && !n.is_placeholder())
    }

    pub fn discussion(&self, id: &str) -> Option<&Discussion> {
        self.notes.iter().find(|d| d.id == id)
    }

    fn discussion_mut(&mut self, id: &str) -> Option<&mut Discussion> {
        self.notes.iter_mut().find(|d| d.id == id)
    }

    fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes
            .iter_mut()
            .flat_map(|d| d.notes.iter_mut())
            .find(|n| n.id == id && !n.is_placeholder())
    }

    /// Placeholders currently shown, top-level and nested
    pub fn placeholders(&self) -> Vec<&Note> {
        self.notes
            .iter()
            .flat_map(|d| d.notes.iter())
            .filter(|n| n.is_placeholder())
            .collect()
    }

    pub fn poll_request(&self) -> PollRequest {
        PollRequest {
            endpoint: self.notes_data.notes_path.clone(),
            last_fetched_at: self.last_fetched_at.or(self.notes_data.last_fetched_at),
        }
    }

    /// Apply one mutation
    pub fn apply(&mut self, mutation: Mutation) {
        match mutation {
            Mutation::SetNotesData(data) => self.notes_data = data,
            Mutation::SetIssueData(data) => self.issue_data = Some(data),
            Mutation::SetUserData(user) => self.user_data = Some(user),
            Mutation::SetLastFetchedAt(ts) => self.last_fetched_at = Some(ts),
            Mutation::SetTargetNoteHash(hash) => self.target_note_hash = Some(hash),
            Mutation::SetInitialNotes(discussions) => self.set_initial_notes(discussions),
            Mutation::ToggleDiscussion { discussion_id } => {
                match self.discussion_mut(&discussion_id) {
                    Some(d) => d.expanded = !d.expanded,
                    None => warn!("Toggle of unknown discussion {}", discussion_id),
                }
            }
            Mutation::ShowPlaceholderNote { body, reply_id, kind } => {
                self.show_placeholder(body, reply_id, kind)
            }
            Mutation::RemovePlaceholderNotes => {
                self.notes.retain(|d| !d.is_placeholder());
                for d in &mut self.notes {
                    d.notes.retain(|n| !n.is_placeholder());
                }
            }
            Mutation::AddNewNote(note) => self.add_new_note(note),
            Mutation::AddNewReplyToDiscussion(note) => {
                let key = note.discussion_key();
                match self.discussion_mut(&key) {
                    Some(d) => match d.notes.iter_mut().find(|n| n.id == note.id && !n.is_placeholder()) {
                        // Already delivered by a poll
                        Some(existing) => *existing = note,
                        None => d.notes.push(note),
                    },
                    None => warn!("Reply {} targets unknown discussion {}", note.id, key),
                }
            }
            Mutation::UpdateNote(note) => self.update_note(note),
            Mutation::DeleteNote(note) => self.delete_note(&note),
            Mutation::ToggleAward { award_name, note_id } => self.toggle_award(&award_name, note_id),
        }
    }

    /// Mutation that merges one polled note: known ids are updated, replies
    /// to known discussions are appended and anything else becomes a new note
    pub fn route_polled_note(&self, note: Note) -> Mutation {
        if self.notes_by_id().contains_key(&note.id) {
            Mutation::UpdateNote(note)
        } else if note.is_discussion_note() && self.discussion(&note.discussion_key()).is_some() {
            Mutation::AddNewReplyToDiscussion(note)
        } else {
            Mutation::AddNewNote(note)
        }
    }

    /// Reduce a poll response. The cursor advances even when no notes came back.
    pub fn apply_poll_response(&mut self, response: PollResponse) {
        for note in response.notes {
            let mutation = self.route_polled_note(note);
            debug!("poll -> {}", mutation.name());
            self.apply(mutation);
        }
        self.apply(Mutation::SetLastFetchedAt(response.last_fetched_at));
    }

    fn set_initial_notes(&mut self, discussions: Vec<Discussion>) {
        let mut notes = Vec::with_capacity(discussions.len());
        for discussion in discussions {
            if discussion.individual_note && discussion.notes.len() > 1 {
                // One discussion per note
                for note in &discussion.notes {
                    let mut single = discussion.clone();
                    single.notes = vec![note.clone()];
                    notes.push(single);
                }
            } else {
                notes.push(discussion);
            }
        }
        self.notes = notes;
    }

    fn show_placeholder(&mut self, body: String, reply_id: Option<DiscussionId>, kind: PlaceholderKind) {
        let note = Note::placeholder(body, kind);
        if let Some(reply_id) = reply_id {
            if let Some(d) = self.discussion_mut(&reply_id) {
                d.notes.push(note);
                return;
            }
            debug!("Placeholder reply target {} not found, showing at top level", reply_id);
        }
        self.notes.push(Discussion {
            id: String::new(),
            individual_note: true,
            expanded: true,
            notes: vec![note],
            reply_id: None,
            resolvable: false,
            placeholder: Some(kind),
        });
    }

    fn add_new_note(&mut self, note: Note) {
        let key = note.discussion_key();
        if self.discussion(&key).is_some() {
            debug!("Discussion {} already present, note {} not added", key, note.id);
            return;
        }
        self.notes.push(Discussion::from_note(note));
    }

    fn update_note(&mut self, note: Note) {
        let key = note.discussion_key();
        if let Some(d) = self.discussion_mut(&key) {
            if d.individual_note {
                if d.notes.is_empty() {
                    d.notes.push(note);
                } else {
                    d.notes[0] = note;
                }
                return;
            }
            if let Some(existing) = d.notes.iter_mut().find(|n| n.id == note.id) {
                *existing = note;
                return;
            }
        }
        match self.note_mut(note.id) {
            Some(existing) => *existing = note,
            None => warn!("Update of unknown note {}", note.id),
        }
    }

    fn delete_note(&mut self, note: &Note) {
        let key = note.discussion_key();
        let index = match self.notes.iter().position(|d| d.id == key) {
            Some(i) => i,
            None => match self
                .notes
                .iter()
                .position(|d| d.notes.iter().any(|n| n.id == note.id && !n.is_placeholder()))
            {
                Some(i) => i,
                None => {
                    warn!("Delete of unknown note {}", note.id);
                    return;
                }
            },
        };

        let discussion = &mut self.notes[index];
        if discussion.individual_note {
            self.notes.remove(index);
            return;
        }
        discussion.notes.retain(|n| n.id != note.id || n.is_placeholder());
        if discussion.notes.is_empty() {
            self.notes.remove(index);
        }
    }

    fn toggle_award(&mut self, award_name: &str, note_id: NoteId) {
        let user = match self.user_data.clone() {
            Some(u) => u,
            None => {
                warn!("Cannot toggle award without user data");
                return;
            }
        };
        let note = match self.note_mut(note_id) {
            Some(n) => n,
            None => {
                warn!("Award toggle on unknown note {}", note_id);
                return;
            }
        };

        if let Some(pos) = note
            .award_emoji
            .iter()
            .position(|a| a.name == award_name && a.user.id == user.id)
        {
            note.award_emoji.remove(pos);
        } else {
            note.award_emoji.push(AwardEmoji {
                name: award_name.to_string(),
                user: Author {
                    avatar_url: None,
                    ..user
                },
            });
        }
    }
}

/// Handle to the shared state. Clones share the same state.
#[derive(Clone)]
pub struct NotesStore {
    state: Arc<RwLock<NotesState>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for NotesStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotesStore {
    pub fn new() -> Self {
        Self::with_state(NotesState::default())
    }

    pub fn with_state(state: NotesState) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(state)),
            version: Arc::new(version),
        }
    }

    /// Commit a mutation and notify subscribers
    pub async fn commit(&self, mutation: Mutation) {
        debug!("commit {}", mutation.name());
        self.state.write().await.apply(mutation);
        self.version.send_modify(|v| *v += 1);
    }

    /// Run `f` against the state under a single write lock, then notify subscribers
    pub async fn commit_with<R>(&self, f: impl FnOnce(&mut NotesState) -> R) -> R {
        let result = f(&mut *self.state.write().await);
        self.version.send_modify(|v| *v += 1);
        result
    }

    /// Read from the current state
    pub async fn read<R>(&self, f: impl FnOnce(&NotesState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    pub async fn snapshot(&self) -> NotesState {
        self.state.read().await.clone()
    }

    /// Receiver that changes after every commit
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub async fn note(&self, id: NoteId) -> Option<Note> {
        self.read(|s| s.note(id).cloned()).await
    }

    pub async fn contains_note(&self, id: NoteId) -> bool {
        self.read(|s| s.notes_by_id().contains_key(&id)).await
    }

    pub async fn poll_request(&self) -> PollRequest {
        self.read(|s| s.poll_request()).await
    }
}
