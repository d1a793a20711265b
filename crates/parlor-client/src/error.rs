use std::path::PathBuf;

use parlor_shared::{BackendError, UriError};
use parlor_store::StoreError;
use thiserror::Error;

/// Top-level error for the message view.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Link error: {0}")]
    Uri(#[from] UriError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems loading or validating [`ViewConfig`](crate::config::ViewConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A single field failed validation; shown next to that field.
    #[error("Invalid value for {field}: {reason}")]
    Field { field: &'static str, reason: String },

    #[error("No configuration directory on this platform")]
    NoConfigDir,
}

/// Rejected user input in the composer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("Message is empty")]
    Empty,

    #[error("Not in a channel")]
    NotJoined,

    #[error("Local user is unknown")]
    NoSelf,

    #[error("This channel does not accept messages")]
    SendUnsupported,

    #[error("This channel does not accept attachments")]
    AttachmentsUnsupported,

    #[error("This message cannot be edited")]
    NotEditable,

    #[error("Invalid attachment {path}: {reason}")]
    InvalidAttachment { path: PathBuf, reason: String },
}
