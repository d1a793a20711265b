//! Payloads exchanged between backends and the message view.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rich::RichText;
use crate::types::{AuthorId, MemberSectionId, MessageId, Nonce};

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

/// Snapshot of a message author. Shared as `Arc<Author>` and replaced as a
/// whole when the backend reports a change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    pub id: AuthorId,
    pub name: RichText,
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn new(id: impl Into<AuthorId>, name: impl Into<RichText>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = Some(url.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A file attached to a message that the backend already holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageAttachment {
    pub name: String,
    pub url: String,
    /// Size in bytes, `-1` when unknown.
    pub size: i64,
}

/// A message as emitted by `MessagesContainer::create_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCreate {
    pub id: MessageId,
    /// Echo of the nonce the message was sent with, empty for messages that
    /// did not originate from this client.
    pub nonce: Nonce,
    pub time: DateTime<Utc>,
    pub author: Author,
    pub content: RichText,
    pub attachments: Vec<MessageAttachment>,
    pub reply_to: Option<MessageId>,
}

impl MessageCreate {
    pub fn new(
        id: impl Into<MessageId>,
        time: DateTime<Utc>,
        author: Author,
        content: impl Into<RichText>,
    ) -> Self {
        Self {
            id: id.into(),
            nonce: Nonce::empty(),
            time,
            author,
            content: content.into(),
            attachments: Vec::new(),
            reply_to: None,
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<Nonce>) -> Self {
        self.nonce = nonce.into();
        self
    }
}

/// A partial change to an existing message. `None` fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageUpdate {
    pub id: MessageId,
    pub author: Option<Author>,
    pub content: Option<RichText>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDelete {
    pub id: MessageId,
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

type OpenFn = dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync;

/// A file to upload alongside a message.
///
/// `open` must be idempotent: every call returns a fresh reader positioned at
/// the start, so a backend can re-stream the file after a failed attempt.
#[derive(Clone)]
pub struct SendableAttachment {
    pub name: String,
    /// Size in bytes, `-1` when unknown.
    pub size: i64,
    open: Arc<OpenFn>,
}

impl SendableAttachment {
    pub fn new<F>(name: impl Into<String>, size: i64, open: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            size,
            open: Arc::new(open),
        }
    }

    /// In-memory attachment, mostly useful for tests and mock backends.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as i64;
        let bytes = Arc::new(bytes);
        Self::new(name, size, move || {
            let data = bytes.as_ref().clone();
            Ok(Box::new(io::Cursor::new(data)) as Box<dyn Read + Send>)
        })
    }

    pub fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        (self.open)()
    }
}

impl fmt::Debug for SendableAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendableAttachment")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Everything a `Sender` needs to deliver a message.
#[derive(Debug, Clone)]
pub struct SendableMessage {
    pub content: String,
    pub nonce: Nonce,
    pub reply_to: Option<MessageId>,
    pub attachments: Vec<SendableAttachment>,
}

// ---------------------------------------------------------------------------
// Typing
// ---------------------------------------------------------------------------

/// A user reported as composing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typer {
    pub author: Author,
    pub started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MemberStatus {
    Online,
    Busy,
    Idle,
    Away,
    Invisible,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSection {
    pub id: MemberSectionId,
    pub name: RichText,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: AuthorId,
    pub name: RichText,
    pub status: MemberStatus,
    pub secondary: RichText,
}
