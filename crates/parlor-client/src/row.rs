//! Message rows: the state behind one entry of the message list.
//!
//! A row is either a message received from the backend or a presend, a
//! message this client sent that may still be waiting for its echo. Rows are
//! plain data; the list container mirrors them into the widget.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parlor_shared::{
    Author, AuthorId, MessageAttachment, MessageCreate, MessageId, Nonce, RichText,
    SendableMessage,
};
use parlor_store::Record;

use crate::attachments::Progress;
use crate::render::{RenderOutput, Renderer};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MessageState {
    /// Empty until the backend confirms the message.
    pub id: MessageId,
    /// Empty for messages that did not originate here.
    pub nonce: Nonce,
    pub time: DateTime<Utc>,
    pub author: Arc<Author>,
    pub content: RichText,
    pub edited: bool,
    pub attachments: Vec<MessageAttachment>,
    pub reply_to: Option<MessageId>,
}

impl From<MessageCreate> for MessageState {
    fn from(msg: MessageCreate) -> Self {
        Self {
            id: msg.id,
            nonce: msg.nonce,
            time: msg.time,
            author: Arc::new(msg.author),
            content: msg.content,
            edited: false,
            attachments: msg.attachments,
            reply_to: msg.reply_to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresendPhase {
    Loading,
    Done,
    Error(String),
}

/// Upload progress of one attachment of a presend.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub progress: Progress,
}

#[derive(Debug, Clone)]
pub struct PresendState {
    pub message: MessageState,
    pub phase: PresendPhase,
    /// Kept so a failed send can be retried as is.
    pub sendable: SendableMessage,
    pub uploads: Vec<Upload>,
}

impl PresendState {
    pub fn new(
        author: Arc<Author>,
        time: DateTime<Utc>,
        sendable: SendableMessage,
        uploads: Vec<Upload>,
    ) -> Self {
        let attachments = sendable
            .attachments
            .iter()
            .map(|a| MessageAttachment {
                name: a.name.clone(),
                url: String::new(),
                size: a.size,
            })
            .collect();

        Self {
            message: MessageState {
                id: MessageId::empty(),
                nonce: sendable.nonce.clone(),
                time,
                author,
                content: RichText::plain(sendable.content.clone()),
                edited: false,
                attachments,
                reply_to: sendable.reply_to.clone(),
            },
            phase: PresendPhase::Loading,
            sendable,
            uploads,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RowState {
    Received(MessageState),
    Presend(PresendState),
}

impl RowState {
    pub fn message(&self) -> &MessageState {
        match self {
            Self::Received(message) => message,
            Self::Presend(presend) => &presend.message,
        }
    }

    fn message_mut(&mut self) -> &mut MessageState {
        match self {
            Self::Received(message) => message,
            Self::Presend(presend) => &mut presend.message,
        }
    }

    pub fn phase(&self) -> Option<&PresendPhase> {
        match self {
            Self::Received(_) => None,
            Self::Presend(presend) => Some(&presend.phase),
        }
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Avatar and author header shown.
    Full,
    /// Continuation of the previous message by the same author.
    Collapsed,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    state: RowState,
    variant: Variant,
    render: RenderOutput,
    highlighted: bool,
    mentions_self: bool,
}

impl MessageRow {
    pub fn new(
        state: RowState,
        variant: Variant,
        renderer: &Renderer,
        self_id: Option<&AuthorId>,
    ) -> Self {
        let render = renderer.render(&state.message().content);
        let mut row = Self {
            state,
            variant,
            render,
            highlighted: false,
            mentions_self: false,
        };
        row.mark_self(self_id);
        row
    }

    pub fn unwrap(&self) -> &MessageState {
        self.state.message()
    }

    pub fn state(&self) -> &RowState {
        &self.state
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn render(&self) -> &RenderOutput {
        &self.render
    }

    pub fn phase(&self) -> Option<&PresendPhase> {
        self.state.phase()
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub fn mentions_self(&self) -> bool {
        self.mentions_self
    }

    /// Whether the row reacts to clicks and selection. Presends still in
    /// flight do not.
    pub fn focusable(&self) -> bool {
        !matches!(self.phase(), Some(PresendPhase::Loading))
    }

    /// A failed presend; its content is drawn in the error style.
    pub fn is_errored(&self) -> bool {
        matches!(self.phase(), Some(PresendPhase::Error(_)))
    }

    /// Error text shown on a failed presend.
    pub fn tooltip(&self) -> Option<&str> {
        match self.phase() {
            Some(PresendPhase::Error(e)) => Some(e),
            _ => None,
        }
    }

    pub fn update_author(&mut self, author: Arc<Author>) {
        self.state.message_mut().author = author;
    }

    pub fn update_content(
        &mut self,
        content: RichText,
        edited: bool,
        renderer: &Renderer,
        self_id: Option<&AuthorId>,
    ) {
        self.render = renderer.render(&content);
        let message = self.state.message_mut();
        message.content = content;
        message.edited |= edited;
        self.mark_self(self_id);
    }

    pub fn update_timestamp(&mut self, time: DateTime<Utc>) {
        self.state.message_mut().time = time;
    }

    pub fn update_attachments(&mut self, attachments: Vec<MessageAttachment>) {
        self.state.message_mut().attachments = attachments;
    }

    pub fn set_phase(&mut self, phase: PresendPhase) {
        if let RowState::Presend(presend) = &mut self.state {
            presend.phase = phase;
        }
    }

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    /// Re-evaluate whether the content mentions the local user.
    pub fn mark_self(&mut self, self_id: Option<&AuthorId>) -> bool {
        let mentions_self = self_id.is_some_and(|me| {
            self.unwrap()
                .content
                .mentioned_authors()
                .any(|id| id == me)
        });
        let changed = mentions_self != self.mentions_self;
        self.mentions_self = mentions_self;
        changed
    }

    /// Set the variant of a row that is not in the list yet.
    pub(crate) fn set_variant(&mut self, variant: Variant) {
        self.variant = variant;
    }

    /// Detach the row's decorations and hand back its state.
    pub fn revert(self) -> RowState {
        self.state
    }

    /// Rebuild the row as `variant`, keeping state and highlight.
    pub fn into_variant(self, variant: Variant, renderer: &Renderer, self_id: Option<&AuthorId>) -> Self {
        let highlighted = self.highlighted;
        let mut row = Self::new(self.revert(), variant, renderer, self_id);
        row.highlighted = highlighted;
        row
    }
}

impl Record for MessageRow {
    fn id(&self) -> &MessageId {
        &self.unwrap().id
    }

    fn nonce(&self) -> &Nonce {
        &self.unwrap().nonce
    }

    fn time(&self) -> DateTime<Utc> {
        self.unwrap().time
    }

    fn bind_id(&mut self, id: MessageId) {
        debug_assert!(self.unwrap().id.is_empty(), "message id is immutable");
        self.state.message_mut().id = id;
        self.set_phase(PresendPhase::Done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parlor_shared::{MentionTarget, SegmentKind};

    fn renderer() -> Renderer {
        Renderer::new("parlor")
    }

    fn presend(content: &str) -> PresendState {
        PresendState::new(
            Arc::new(Author::new("me", "Me")),
            Utc.timestamp_opt(100, 0).unwrap(),
            SendableMessage {
                content: content.into(),
                nonce: Nonce::from("n1"),
                reply_to: None,
                attachments: Vec::new(),
            },
            Vec::new(),
        )
    }

    #[test]
    fn test_presend_lifecycle_flags() {
        let mut row = MessageRow::new(RowState::Presend(presend("hi")), Variant::Full, &renderer(), None);
        assert!(!row.focusable());
        assert_eq!(row.tooltip(), None);
        assert!(!row.is_errored());

        row.set_phase(PresendPhase::Error("offline".into()));
        assert!(row.focusable());
        assert!(row.is_errored());
        assert_eq!(row.tooltip(), Some("offline"));

        row.set_phase(PresendPhase::Loading);
        assert!(!row.is_errored());
        row.bind_id(MessageId::from("m1"));
        assert_eq!(row.phase(), Some(&PresendPhase::Done));
        assert!(row.focusable());
        assert_eq!(row.nonce().as_str(), "n1");
    }

    #[test]
    fn test_update_content_marks_edited_and_rerenders() {
        let msg = MessageCreate::new(
            "m1",
            Utc.timestamp_opt(1, 0).unwrap(),
            Author::new("u1", "U"),
            "a < b",
        );
        let mut row = MessageRow::new(RowState::Received(msg.into()), Variant::Full, &renderer(), None);
        assert_eq!(row.render().markup, "a &lt; b");

        row.update_content(RichText::plain("c"), true, &renderer(), None);
        assert!(row.unwrap().edited);
        assert_eq!(row.render().markup, "c");

        // A later non-edit refresh keeps the edited mark.
        row.update_content(RichText::plain("d"), false, &renderer(), None);
        assert!(row.unwrap().edited);
    }

    #[test]
    fn test_self_mentions_are_marked() {
        let me = AuthorId::from("me");
        let content = RichText::plain("@me hi").with_segment(
            0,
            3,
            SegmentKind::Mention {
                target: MentionTarget::Author {
                    id: me.clone(),
                    info: RichText::plain("Me"),
                },
            },
        );
        let msg = MessageCreate::new("m1", Utc.timestamp_opt(1, 0).unwrap(), Author::new("u1", "U"), content);

        let mut row = MessageRow::new(RowState::Received(msg.into()), Variant::Full, &renderer(), Some(&me));
        assert!(row.mentions_self());
        assert!(row.mark_self(Some(&AuthorId::from("other"))));
        assert!(!row.mentions_self());
    }

    #[test]
    fn test_into_variant_keeps_state_and_highlight() {
        let mut row = MessageRow::new(RowState::Presend(presend("x")), Variant::Full, &renderer(), None);
        row.set_highlighted(true);

        let swapped = row.into_variant(Variant::Collapsed, &renderer(), None);
        assert_eq!(swapped.variant(), Variant::Collapsed);
        assert!(swapped.is_highlighted());
        assert_eq!(swapped.nonce().as_str(), "n1");
    }
}
