/// Threadline - notes action layer and poll scheduler
///
/// Dispatches note operations to a REST backend, commits the results into a
/// shared store through named mutations, and keeps the store fresh with a
/// visibility-aware poll loop.

pub mod actions;
pub mod awards;
pub mod cli_app;
pub mod config;
pub mod error;
pub mod models;
pub mod poll;
pub mod quick_actions;
pub mod service;
pub mod store;
pub mod utils;
pub mod visibility;

pub use actions::NotesActions;
pub use config::Config;
pub use error::{NotesError, Result};
pub use poll::{PollConfig, PollController, PollState};
pub use store::{Mutation, NotesState, NotesStore};
pub use visibility::{PageVisibility, Visibility, VisibilitySource, VisibilityState};
