/// Error types for the notes client
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Server responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Poll error: {0}")]
    Poll(String),

    #[error("Invalid note: {0}")]
    InvalidNote(String),
}

pub type Result<T> = std::result::Result<T, NotesError>;
