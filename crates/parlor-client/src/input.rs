//! The composer: text, queued attachments, and edit/reply targets.

use parlor_shared::{MessageId, Nonce, SendableMessage};

use crate::attachments::{self, Files};
use crate::row::Upload;

#[derive(Debug, Clone, Default)]
pub struct Input {
    text: String,
    files: Files,
    editing: Option<MessageId>,
    reply_to: Option<MessageId>,
}

impl Input {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn files(&self) -> &Files {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut Files {
        &mut self.files
    }

    pub fn editing(&self) -> Option<&MessageId> {
        self.editing.as_ref()
    }

    pub fn reply_to(&self) -> Option<&MessageId> {
        self.reply_to.as_ref()
    }

    /// Nothing to send: blank text and no attachments.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.files.is_empty()
    }

    /// Put the composer in edit mode for `id`, prefilled with `content`.
    pub fn begin_edit(&mut self, id: MessageId, content: String) {
        self.editing = Some(id);
        self.text = content;
    }

    pub fn cancel_edit(&mut self) {
        if self.editing.take().is_some() {
            self.text.clear();
        }
    }

    pub fn set_reply(&mut self, id: Option<MessageId>) {
        self.reply_to = id;
    }

    /// Take the edit target and the new text, leaving the composer empty.
    pub fn take_edit(&mut self) -> Option<(MessageId, String)> {
        let id = self.editing.take()?;
        Some((id, std::mem::take(&mut self.text)))
    }

    /// Build the message to send, leaving the composer empty. Attachments
    /// are wrapped to report upload progress.
    pub fn take_sendable(&mut self, nonce: Nonce) -> (SendableMessage, Vec<Upload>) {
        let mut uploads = Vec::new();
        let attachments = self
            .files
            .take()
            .into_iter()
            .map(|attachment| {
                let (wrapped, progress) = attachments::with_progress(attachment);
                uploads.push(Upload {
                    name: wrapped.name.clone(),
                    progress,
                });
                wrapped
            })
            .collect();

        let message = SendableMessage {
            content: std::mem::take(&mut self.text),
            nonce,
            reply_to: self.reply_to.take(),
            attachments,
        };
        (message, uploads)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
