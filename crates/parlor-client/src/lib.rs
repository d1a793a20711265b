//! # parlor-client
//!
//! The message view of a chat client: a time-ordered list of messages fed by
//! a pluggable backend, with optimistic sends, cozy grouping, backlog
//! paging, typing and member state. All view state lives on one UI thread;
//! see [`scheduler`] for how backend threads reach it.

pub mod attachments;
pub mod backlog;
mod bridge;
pub mod config;
pub mod cozy;
pub mod error;
pub mod events;
pub mod image;
pub mod input;
pub mod list;
pub mod logging;
pub mod members;
pub mod mention;
pub mod mock;
pub mod render;
pub mod row;
pub mod scheduler;
pub mod scroll;
pub mod typing;
pub mod uri;
pub mod view;
pub mod widget;

pub use config::ViewConfig;
pub use error::{ClientError, ConfigError, InputError};
pub use events::{NoHooks, ViewEvent, ViewHooks};
pub use list::{MessageList, SelectionChange};
pub use row::{MessageRow, PresendPhase, RowState, Variant};
pub use scheduler::{UiHandle, UiLoop};
pub use view::MessageView;
pub use widget::{ListWidget, NullWidget};
