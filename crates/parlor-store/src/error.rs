use parlor_shared::{MessageId, Nonce};
use thiserror::Error;

/// Errors produced by the message store.
///
/// All of these indicate a caller bug: the list container looks records up
/// before inserting, so a well-behaved caller never sees them.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// A record with this id is already indexed.
    #[error("Duplicate message id: {0}")]
    DuplicateKey(MessageId),

    /// An unconfirmed record with this nonce is already indexed.
    #[error("Duplicate nonce: {0}")]
    DuplicateNonce(Nonce),

    /// The record has neither an id nor a nonce.
    #[error("Record has neither id nor nonce")]
    MissingKey,

    /// A positional replace targeted an index past the end.
    #[error("No record at index {0}")]
    NoSuchRecord(usize),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
