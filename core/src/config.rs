/// Configuration management
use crate::error::{NotesError, Result};
use crate::models::Author;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 15_000;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the notes backend, e.g. `http://127.0.0.1:3000`
    pub base_url: String,

    /// Path polled for note changes
    pub notes_path: String,

    /// Path new top-level notes are posted to (defaults to `notes_path`)
    pub create_path: Option<String>,

    /// Delay between polls when the server sends no `Poll-Interval` header
    pub poll_interval: Duration,

    /// Start with the page reported as hidden
    pub start_hidden: bool,

    /// Current user, needed for award toggling
    pub user: Option<Author>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            notes_path: "/notes".to_string(),
            create_path: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            start_hidden: false,
            user: None,
        }
    }
}

/// Boolean environment value: `1/true/yes/on` or `0/false/no/off`
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        if args.len() < 3 {
            return Err(NotesError::Config(format!(
                "Usage: {} <base_url> <notes_path> [--create-path <path>] [--interval-ms <ms>] [--hidden] [--user-id <id> --username <name>]",
                args.first().map(|s| s.as_str()).unwrap_or("threadline")
            )));
        }

        let mut base_url = args[1].clone();
        let notes_path = args[2].clone();

        let mut create_path: Option<String> = None;
        let mut interval_ms: Option<u64> = None;
        let mut start_hidden = false;
        let mut user_id: Option<u64> = None;
        let mut username: Option<String> = None;

        let mut i = 3;
        while i < args.len() {
            match args[i].as_str() {
                "--create-path" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        NotesError::Config("--create-path requires a path argument".to_string())
                    })?;
                    create_path = Some(path.clone());
                    i += 2;
                }
                "--interval-ms" => {
                    let ms = args.get(i + 1).ok_or_else(|| {
                        NotesError::Config("--interval-ms requires a number".to_string())
                    })?;
                    interval_ms = Some(ms.parse::<u64>().map_err(|_| {
                        NotesError::Config("--interval-ms must be a positive number".to_string())
                    })?);
                    i += 2;
                }
                "--hidden" => {
                    start_hidden = true;
                    i += 1;
                }
                "--user-id" => {
                    let id = args.get(i + 1).ok_or_else(|| {
                        NotesError::Config("--user-id requires a number".to_string())
                    })?;
                    user_id = Some(id.parse::<u64>().map_err(|_| {
                        NotesError::Config("--user-id must be a number".to_string())
                    })?);
                    i += 2;
                }
                "--username" => {
                    let name = args.get(i + 1).ok_or_else(|| {
                        NotesError::Config("--username requires a name".to_string())
                    })?;
                    username = Some(name.clone());
                    i += 2;
                }
                other => {
                    return Err(NotesError::Config(format!("Unknown argument: {}", other)));
                }
            }
        }

        // Env overrides
        if let Ok(url) = std::env::var("THREADLINE_BASE_URL") {
            base_url = url;
        }
        if let Some(ms) = std::env::var("THREADLINE_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            interval_ms = Some(ms);
        }
        if let Ok(value) = std::env::var("THREADLINE_START_HIDDEN") {
            start_hidden = parse_flag(&value).ok_or_else(|| {
                NotesError::Config(format!("THREADLINE_START_HIDDEN must be a boolean, got '{}'", value))
            })?;
        }

        // The client speaks plain HTTP only
        if !base_url.starts_with("http://") {
            return Err(NotesError::Config(format!(
                "base URL must start with http://, got {}",
                base_url
            )));
        }

        if interval_ms == Some(0) {
            return Err(NotesError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }

        let user = match (user_id, username) {
            (Some(id), Some(username)) => Some(Author {
                id,
                name: username.clone(),
                username,
                avatar_url: None,
            }),
            (None, None) => None,
            _ => {
                return Err(NotesError::Config(
                    "--user-id and --username must be given together".to_string(),
                ))
            }
        };

        Ok(Self {
            base_url,
            notes_path,
            create_path,
            poll_interval: Duration::from_millis(interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS)),
            start_hidden,
            user,
        })
    }

    /// Endpoint used for new top-level notes
    pub fn create_endpoint(&self) -> &str {
        self.create_path.as_deref().unwrap_or(&self.notes_path)
    }
}
