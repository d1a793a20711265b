//! The backend contract consumed by the message view.
//!
//! Backend calls may block; the view only invokes them from worker threads.
//! Sinks (`*Container` traits) are implemented by the view and may be called
//! from any thread. Optional capabilities are exposed as getters that return
//! `None` when a backend does not support them.

use std::sync::Arc;
use std::time::Duration;

use crate::error::BackendError;
use crate::message::{
    Member, MemberSection, MessageCreate, MessageDelete, MessageUpdate, SendableMessage, Typer,
};
use crate::rich::RichText;
use crate::subscription::Subscription;
use crate::types::{AuthorId, MemberSectionId, MessageId};

pub type BackendResult<T> = std::result::Result<T, BackendError>;

// ---------------------------------------------------------------------------
// Sinks implemented by the view
// ---------------------------------------------------------------------------

pub trait MessagesContainer: Send + Sync {
    fn create_message(&self, msg: MessageCreate);
    fn update_message(&self, msg: MessageUpdate);
    fn delete_message(&self, msg: MessageDelete);
}

pub trait TypingContainer: Send + Sync {
    fn add_typer(&self, typer: Typer);
    fn remove_typer(&self, author: AuthorId);
}

pub trait MemberListContainer: Send + Sync {
    fn set_sections(&self, sections: Vec<MemberSection>);
    fn set_member(&self, section: MemberSectionId, member: Member);
    fn remove_member(&self, section: MemberSectionId, member: AuthorId);
}

pub trait LabelContainer: Send + Sync {
    fn set_label(&self, label: RichText);
}

// ---------------------------------------------------------------------------
// Backend capabilities
// ---------------------------------------------------------------------------

/// A channel that can be joined to receive messages.
pub trait Messenger: Send + Sync {
    /// Start streaming messages into `container`. Cancelling the returned
    /// subscription leaves the channel.
    fn join_server(&self, container: Arc<dyn MessagesContainer>) -> BackendResult<Subscription>;

    fn as_backlogger(&self) -> Option<Arc<dyn Backlogger>> {
        None
    }

    fn as_typing_indicator(&self) -> Option<Arc<dyn TypingIndicator>> {
        None
    }

    fn as_member_lister(&self) -> Option<Arc<dyn MemberLister>> {
        None
    }

    fn as_sender(&self) -> Option<Arc<dyn Sender>> {
        None
    }

    fn as_editor(&self) -> Option<Arc<dyn Editor>> {
        None
    }

    fn as_nicknamer(&self) -> Option<Arc<dyn Nicknamer>> {
        None
    }
}

pub trait Sender: Send + Sync {
    fn send_message(&self, msg: SendableMessage) -> BackendResult<()>;

    /// Whether `SendableMessage::attachments` is honoured.
    fn can_attach(&self) -> bool {
        false
    }
}

pub trait Editor: Send + Sync {
    fn message_editable(&self, id: &MessageId) -> bool;
    fn raw_content(&self, id: &MessageId) -> BackendResult<String>;
    fn edit(&self, id: &MessageId, content: String) -> BackendResult<()>;
}

pub trait TypingIndicator: Send + Sync {
    /// Announce that the local user is typing.
    fn typing(&self) -> BackendResult<()>;

    /// How long a typer stays active without a new announcement.
    fn timeout(&self) -> Duration;

    fn subscribe(&self, container: Arc<dyn TypingContainer>) -> BackendResult<Subscription>;
}

pub trait Backlogger: Send + Sync {
    /// Emit messages older than `before` into `container`.
    fn backlog(&self, before: &MessageId, container: Arc<dyn MessagesContainer>)
        -> BackendResult<()>;
}

pub trait MemberLister: Send + Sync {
    fn list_members(&self, container: Arc<dyn MemberListContainer>)
        -> BackendResult<Subscription>;
}

pub trait Nicknamer: Send + Sync {
    fn nickname(&self, container: Arc<dyn LabelContainer>) -> BackendResult<Subscription>;
}
