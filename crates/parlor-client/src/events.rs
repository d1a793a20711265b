//! Notifications from the message view to the surrounding shell.
//!
//! The view never touches dialogs, popovers or banners itself; it emits a
//! [`ViewEvent`] and the host decides how to show it.

use bytes::Bytes;
use parlor_shared::{MessageId, RichText};

use crate::uri::ImageSize;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// The typing label changed; `empty` hides the indicator.
    TypingChanged { label: String, empty: bool },
    /// Show a popover with a mention's info.
    ShowMention { info: RichText },
    /// Open an image preview popover; bytes follow in `ImageLoaded`.
    ImagePreview { url: String, size: ImageSize },
    ImageLoaded { url: String, bytes: Bytes },
    /// Ask the user before opening `url` externally.
    ConfirmOpen { url: String },
    /// Open `url` externally without asking.
    OpenExternal { url: String },
    /// The local user's nickname in this channel.
    NicknameChanged { label: RichText },
    /// The member list changed after events were applied.
    MembersChanged,
    /// The raw content of a message being edited is ready for the composer.
    EditLoaded { id: MessageId, content: String },
    /// The message being replied to changed.
    ReplyChanged { id: Option<MessageId> },
    /// A failure worth showing in a banner.
    Error { message: String },
}

/// Receives view events on the UI thread.
pub trait ViewHooks {
    fn emit(&self, event: ViewEvent);
}

/// Hooks that drop every event.
#[derive(Debug, Default)]
pub struct NoHooks;

impl ViewHooks for NoHooks {
    fn emit(&self, _: ViewEvent) {}
}

pub fn emit_event(hooks: &dyn ViewHooks, event: ViewEvent) {
    tracing::trace!(?event, "View event");
    hooks.emit(event);
}
