use thiserror::Error;

/// Errors returned by backend implementations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// A network or service failure that may succeed on retry.
    #[error("Backend request failed: {0}")]
    Transient(String),

    /// The backend does not know the referenced message or member.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation is not allowed for this user (e.g. editing someone
    /// else's message).
    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors parsing synthetic and embedded URIs.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UriError {
    #[error("Not a mention URI: {0}")]
    NotMention(String),

    #[error("Invalid mention index: {0}")]
    InvalidIndex(String),

    #[error("Invalid image size hint: {0}")]
    InvalidSizeHint(String),

    #[error("Malformed URI: {0}")]
    Malformed(String),
}
