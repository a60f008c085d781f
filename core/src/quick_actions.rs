/// Quick actions: `/command` lines embedded in a note body
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn command_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^/\w+.*$").expect("valid quick action pattern"))
}

/// Whether any line of the body is a quick action
pub fn has_quick_actions(body: &str) -> bool {
    command_line().is_match(body)
}

/// Body with every quick action line removed
pub fn strip_quick_actions(body: &str) -> String {
    command_line().replace_all(body, "").trim().to_string()
}

/// A command the server understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickActionCommand {
    pub name: String,
    pub description: String,
}

/// Known commands, used to describe what a submitted note is doing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickActions {
    commands: Vec<QuickActionCommand>,
}

impl QuickActions {
    pub fn new(commands: Vec<QuickActionCommand>) -> Self {
        Self { commands }
    }

    pub fn commands(&self) -> &[QuickActionCommand] {
        &self.commands
    }

    /// Text of the system placeholder shown while commands are applied
    pub fn placeholder_text(&self, body: &str) -> String {
        let executed: Vec<&QuickActionCommand> = self
            .commands
            .iter()
            .filter(|c| body.contains(&format!("/{}", c.name)))
            .collect();

        match executed.as_slice() {
            [] => "Applying command".to_string(),
            [command] => format!(
                "Applying command to {}",
                command.description.to_lowercase()
            ),
            _ => "Applying multiple commands".to_string(),
        }
    }
}
