/// Shared types for notes, discussions and service payloads
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type NoteId = u64;
pub type DiscussionId = String;

/// Id carried by client-only placeholder notes
pub const PLACEHOLDER_NOTE_ID: NoteId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardEmoji {
    pub name: String,
    pub user: Author,
}

/// Note `type` discriminator. Plain notes carry `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteType {
    DiscussionNote,
    DiffNote,
    LegacyDiffNote,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Stand-in for the visible note body
    Text,
    /// Stand-in for the system note produced by quick actions
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    #[serde(rename = "note", alias = "body", default)]
    pub body: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub note_type: Option<NoteType>,
    #[serde(default)]
    pub discussion_id: Option<DiscussionId>,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub resolvable: bool,
    #[serde(default)]
    pub award_emoji: Vec<AwardEmoji>,
    /// Endpoint for update/delete
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub toggle_award_path: Option<String>,
    #[serde(skip)]
    pub placeholder: Option<PlaceholderKind>,
}

impl Note {
    pub fn new(id: NoteId, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
            author: None,
            created_at: None,
            updated_at: None,
            note_type: None,
            discussion_id: None,
            system: false,
            resolvable: false,
            award_emoji: Vec::new(),
            path: None,
            toggle_award_path: None,
            placeholder: None,
        }
    }

    pub fn placeholder(body: impl Into<String>, kind: PlaceholderKind) -> Self {
        Self {
            system: kind == PlaceholderKind::System,
            placeholder: Some(kind),
            ..Self::new(PLACEHOLDER_NOTE_ID, body)
        }
    }

    pub fn in_discussion(mut self, discussion_id: impl Into<DiscussionId>) -> Self {
        self.discussion_id = Some(discussion_id.into());
        self
    }

    pub fn with_type(mut self, note_type: NoteType) -> Self {
        self.note_type = Some(note_type);
        self
    }

    pub fn is_discussion_note(&self) -> bool {
        self.note_type == Some(NoteType::DiscussionNote)
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    /// Discussion id, falling back to the note id for standalone notes
    pub fn discussion_key(&self) -> DiscussionId {
        self.discussion_id
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

fn default_expanded() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    #[serde(default)]
    pub individual_note: bool,
    #[serde(default = "default_expanded")]
    pub expanded: bool,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub reply_id: Option<DiscussionId>,
    #[serde(default)]
    pub resolvable: bool,
    #[serde(skip)]
    pub placeholder: Option<PlaceholderKind>,
}

impl Discussion {
    /// Discussion wrapping a single note
    pub fn from_note(note: Note) -> Self {
        let id = note.discussion_key();
        let is_discussion = note.is_discussion_note();
        Self {
            reply_id: Some(id.clone()),
            id,
            individual_note: !is_discussion,
            expanded: true,
            resolvable: is_discussion && note.resolvable,
            placeholder: None,
            notes: vec![note],
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }
}

/// Endpoints and cursor handed over by the page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesData {
    #[serde(default)]
    pub notes_path: String,
    #[serde(default)]
    pub new_comment_path: String,
    #[serde(default)]
    pub discussions_path: String,
    #[serde(default)]
    pub last_fetched_at: Option<i64>,
}

/// The noteable (issue, merge request) the notes belong to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueData {
    pub id: u64,
    #[serde(default)]
    pub create_note_path: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request data for one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub endpoint: String,
    pub last_fetched_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(alias = "lastFetchedAt")]
    pub last_fetched_at: i64,
}

/// A poll response together with the server's requested polling interval
#[derive(Debug, Clone, PartialEq)]
pub struct PolledNotes {
    pub response: PollResponse,
    /// `Poll-Interval` header in milliseconds, if present
    pub poll_interval: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteParams {
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noteable_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noteable_id: Option<u64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<NoteType>,
}

/// Body of a create or reply request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_discussion_id: Option<DiscussionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    pub note: NoteParams,
}

impl NotePayload {
    pub fn comment(body: impl Into<String>) -> Self {
        Self {
            note: NoteParams {
                note: body.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn reply(discussion_id: impl Into<DiscussionId>, body: impl Into<String>) -> Self {
        Self {
            in_reply_to_discussion_id: Some(discussion_id.into()),
            ..Self::comment(body)
        }
    }
}

/// Composite input of the save-note action
#[derive(Debug, Clone, PartialEq)]
pub struct NoteFormData {
    pub endpoint: String,
    pub data: NotePayload,
    /// Flash container messages for this form are shown in
    pub flash_container: Option<String>,
}

/// Body of an update request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<u64>,
    pub note: NoteParams,
}

impl NoteUpdate {
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            target_type: None,
            target_id: None,
            note: NoteParams {
                note: body.into(),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandsChanges {
    #[serde(default)]
    pub emoji_award: Option<String>,
    #[serde(default)]
    pub spend_time: Option<Value>,
    #[serde(default)]
    pub time_estimate: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl CommandsChanges {
    pub fn touches_time_tracking(&self) -> bool {
        self.spend_time.is_some() || self.time_estimate.is_some()
    }
}

/// Parsed body of a create or reply response.
///
/// The server answers either with the saved note, or with `errors` (and
/// possibly `commands_changes`) when the body was rejected or consisted only
/// of quick actions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct NoteResponse {
    pub note: Option<Note>,
    pub errors: Option<Map<String, Value>>,
    pub commands_changes: Option<CommandsChanges>,
    pub raw: Value,
}

impl TryFrom<Value> for NoteResponse {
    type Error = serde_json::Error;

    fn try_from(raw: Value) -> std::result::Result<Self, Self::Error> {
        let errors = match raw.get("errors") {
            Some(Value::Object(map)) => Some(map.clone()),
            _ => None,
        };
        let commands_changes = match raw.get("commands_changes") {
            Some(v) if !v.is_null() => Some(serde_json::from_value(v.clone())?),
            _ => None,
        };
        let note = if raw.get("id").map_or(false, |id| !id.is_null()) {
            Some(serde_json::from_value(raw.clone())?)
        } else {
            None
        };
        Ok(Self {
            note,
            errors,
            commands_changes,
            raw,
        })
    }
}

impl NoteResponse {
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().map_or(false, |e| !e.is_empty())
    }

    /// Message the server attached for bodies made only of quick actions
    pub fn commands_only(&self) -> Option<String> {
        match self.errors.as_ref()?.get("commands_only")? {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => {
                let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(", "))
                }
            }
            _ => None,
        }
    }
}
