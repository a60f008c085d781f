use crate::actions::NotesActions;
use crate::config::Config;
use crate::models::{NoteFormData, NoteId, NotePayload, NoteUpdate, NotesData};
use crate::poll::{PollConfig, PollController};
use crate::service::HttpNotesService;
use crate::store::{NotesState, NotesStore};
use crate::utils::{EventHub, FlashLevel, UiEvent};
use crate::visibility::{PageVisibility, Visibility};
use colored::*;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

/// One line typed into the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Comment(String),
    Reply { discussion_id: String, body: String },
    Edit { note_id: NoteId, body: String },
    Delete(NoteId),
    Award { note_id: NoteId, name: String },
    Hide,
    Show,
    Refresh,
    List,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let note_id = |s: &str| {
        s.parse::<NoteId>()
            .map_err(|_| format!("'{}' is not a note id", s))
    };

    match word {
        "comment" if !rest.is_empty() => Ok(ConsoleCommand::Comment(rest.replace("\\n", "\n"))),
        "reply" => match rest.split_once(' ') {
            Some((id, body)) if !body.trim().is_empty() => Ok(ConsoleCommand::Reply {
                discussion_id: id.to_string(),
                body: body.trim().replace("\\n", "\n"),
            }),
            _ => Err("Usage: reply <discussion_id> <text>".to_string()),
        },
        "edit" => match rest.split_once(' ') {
            Some((id, body)) if !body.trim().is_empty() => Ok(ConsoleCommand::Edit {
                note_id: note_id(id)?,
                body: body.trim().to_string(),
            }),
            _ => Err("Usage: edit <note_id> <text>".to_string()),
        },
        "delete" if !rest.is_empty() => Ok(ConsoleCommand::Delete(note_id(rest)?)),
        "award" => match rest.split_once(' ') {
            Some((id, name)) if !name.trim().is_empty() => Ok(ConsoleCommand::Award {
                note_id: note_id(id)?,
                name: name.trim().to_string(),
            }),
            _ => Err("Usage: award <note_id> <name>".to_string()),
        },
        "hide" => Ok(ConsoleCommand::Hide),
        "show" => Ok(ConsoleCommand::Show),
        "refresh" => Ok(ConsoleCommand::Refresh),
        "list" => Ok(ConsoleCommand::List),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "comment" | "delete" => Err(format!("Usage: {} <argument>", word)),
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn print_usage() {
    println!("{}", "⚡ Threadline".bright_cyan().bold());
    println!();
    println!("{}", "Commands:".bright_white().bold());
    println!("  {} <text>                 Post a new comment", "comment".cyan());
    println!("  {} <discussion_id> <text> Reply to a discussion", "reply".cyan());
    println!("  {} <note_id> <text>        Edit a note", "edit".cyan());
    println!("  {} <note_id>             Delete a note", "delete".cyan());
    println!("  {} <note_id> <name>       Toggle an award", "award".cyan());
    println!("  {} / {}                   Simulate page visibility", "hide".cyan(), "show".cyan());
    println!("  {}                      Fetch latest notes now", "refresh".cyan());
    println!("  {}                         Print all discussions", "list".cyan());
    println!("  {}                         Exit", "quit".cyan());
}

fn print_notes(state: &NotesState) {
    if state.notes.is_empty() {
        println!("{}", "No notes yet".yellow());
        return;
    }
    println!("{}", format!("Discussions ({})", state.notes.len()).bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    for discussion in &state.notes {
        let marker = if discussion.individual_note { "•" } else { "#" };
        println!("{} {}", marker.bright_cyan(), discussion.id.dimmed());
        for note in &discussion.notes {
            let author = note
                .author
                .as_ref()
                .map(|a| a.username.as_str())
                .unwrap_or("?");
            let awards: Vec<&str> = note.award_emoji.iter().map(|a| a.name.as_str()).collect();
            let line = if note.is_placeholder() {
                format!("    … {}", note.body).dimmed().to_string()
            } else if note.system {
                format!("    [{}] {}", note.id, note.body).italic().to_string()
            } else {
                format!("    [{}] {}: {}", note.id.to_string().cyan(), author.green(), note.body)
            };
            if awards.is_empty() {
                println!("{}", line);
            } else {
                println!("{} {}", line, format!("({})", awards.join(", ")).yellow());
            }
        }
    }
}

fn print_event(event: &UiEvent) {
    match event {
        UiEvent::Flash(flash) => match flash.level {
            FlashLevel::Notice => println!("{} {}", "✓".green().bold(), flash.message.green()),
            FlashLevel::Alert => eprintln!("{} {}", "✗".red().bold(), flash.message.red()),
        },
        UiEvent::TimeTrackingUpdated { .. } => {
            println!("{} {}", "⏱".bright_white(), "Time tracking updated".bright_white())
        }
        UiEvent::AwardAdded { name } => println!("{} Award added: {}", "★".yellow(), name.yellow()),
        UiEvent::HideFlash { .. } | UiEvent::ClearCommandsCache | UiEvent::ScrollToAwards => {}
    }
}

/// Print notes that show up in the store after the initial listing
async fn watch_new_notes(store: NotesStore) {
    let mut changes = store.subscribe();
    let mut seen: HashSet<NoteId> = store
        .read(|s| s.notes_by_id().into_keys().collect())
        .await;
    while changes.changed().await.is_ok() {
        let fresh: Vec<(NoteId, String, String)> = store
            .read(|s| {
                s.notes_by_id()
                    .into_values()
                    .filter(|n| !n.is_placeholder() && !seen.contains(&n.id))
                    .map(|n| {
                        let author = n.author.as_ref().map(|a| a.username.clone()).unwrap_or_default();
                        (n.id, author, n.body.clone())
                    })
                    .collect()
            })
            .await;
        for (id, author, body) in fresh {
            seen.insert(id);
            println!("{} [{}] {}: {}", "+".bright_green(), id.to_string().cyan(), author.green(), body);
        }
    }
}

/// Run the interactive console against `config`
pub async fn run(config: Config) -> anyhow::Result<()> {
    let service = Arc::new(HttpNotesService::new(config.base_url.clone()));
    let store = NotesStore::new();
    let events = EventHub::new();
    let poller = Arc::new(PollController::new(PollConfig {
        interval: config.poll_interval,
    }));
    let actions = NotesActions::new(service, store.clone(), events.clone()).with_poller(poller);

    actions
        .set_notes_data(NotesData {
            notes_path: config.notes_path.clone(),
            new_comment_path: config.create_endpoint().to_string(),
            ..Default::default()
        })
        .await;
    if let Some(user) = config.user.clone() {
        actions.set_user_data(user).await;
    }

    if let Err(e) = actions.fetch_notes(&config.notes_path).await {
        eprintln!("{} Initial fetch failed: {}", "✗".red().bold(), e.to_string().red());
    }

    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => warn!("Console lagged {} events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::spawn(watch_new_notes(store.clone()));

    let visibility = PageVisibility::new(if config.start_hidden {
        Visibility::Hidden
    } else {
        Visibility::Visible
    });
    actions.poll(&visibility).await?;

    print_usage();
    print_notes(&store.snapshot().await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(c) => c,
            Err(msg) => {
                eprintln!("{}", msg.yellow());
                continue;
            }
        };

        let outcome = match command {
            ConsoleCommand::Comment(body) => actions
                .save_note(&NoteFormData {
                    endpoint: config.create_endpoint().to_string(),
                    data: NotePayload::comment(body),
                    flash_container: None,
                })
                .await
                .map(|resp| report_errors(&resp)),
            ConsoleCommand::Reply { discussion_id, body } => actions
                .save_note(&NoteFormData {
                    endpoint: config.create_endpoint().to_string(),
                    data: NotePayload::reply(discussion_id, body),
                    flash_container: None,
                })
                .await
                .map(|resp| report_errors(&resp)),
            ConsoleCommand::Edit { note_id, body } => match store.note(note_id).await {
                Some(note) => {
                    let endpoint = note
                        .path
                        .clone()
                        .unwrap_or_else(|| format!("{}/{}", config.notes_path, note_id));
                    actions
                        .update_note(&endpoint, &NoteUpdate::body(body))
                        .await
                        .map(|_| ())
                }
                None => {
                    eprintln!("{}", format!("No note {}", note_id).yellow());
                    Ok(())
                }
            },
            ConsoleCommand::Delete(note_id) => match store.note(note_id).await {
                Some(note) => actions.delete_note(&note).await,
                None => {
                    eprintln!("{}", format!("No note {}", note_id).yellow());
                    Ok(())
                }
            },
            ConsoleCommand::Award { note_id, name } => match store.note(note_id).await {
                Some(note) => {
                    let endpoint = note.toggle_award_path.clone().unwrap_or_else(|| {
                        format!("{}/{}/toggle_award_emoji", config.notes_path, note_id)
                    });
                    actions.toggle_award_request(&endpoint, &name, note_id).await
                }
                None => {
                    eprintln!("{}", format!("No note {}", note_id).yellow());
                    Ok(())
                }
            },
            ConsoleCommand::Hide => {
                visibility.hide();
                Ok(())
            }
            ConsoleCommand::Show => {
                visibility.show();
                Ok(())
            }
            ConsoleCommand::Refresh => {
                actions.fetch_data().await;
                Ok(())
            }
            ConsoleCommand::List => {
                print_notes(&store.snapshot().await);
                Ok(())
            }
            ConsoleCommand::Quit => break,
        };

        if let Err(e) = outcome {
            eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
        }
    }

    actions.poller().shutdown().await;
    Ok(())
}

fn report_errors(response: &crate::models::NoteResponse) {
    if let Some(errors) = &response.errors {
        for (field, value) in errors {
            if field == "commands_only" {
                continue;
            }
            eprintln!("{} {}: {}", "✗".red().bold(), field.red(), value);
        }
    }
}
