//! In-memory backend implementing every capability.
//!
//! Sends are echoed back through the joined containers with the nonce
//! attached, the way real backends confirm a message. Failures can be
//! switched on to exercise error paths.

use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parlor_shared::backend::{
    BackendResult, Backlogger, Editor, LabelContainer, MemberListContainer, MemberLister,
    Messenger, MessagesContainer, Nicknamer, Sender, TypingContainer, TypingIndicator,
};
use parlor_shared::constants::TYPING_TIMEOUT_SECS;
use parlor_shared::{
    Author, AuthorId, BackendError, Member, MemberSection, MemberSectionId, MessageAttachment,
    MessageCreate, MessageId, MessageUpdate, RichText, SendableMessage, Subscription, Typer,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::attachments::ReusableReader;

/// Messages replayed into a freshly joined container.
pub const JOIN_PAGE: usize = 20;
/// Messages returned by one backlog request.
pub const BACKLOG_PAGE: usize = 20;

#[derive(Default)]
struct MockState {
    /// Sorted by time.
    history: Vec<MessageCreate>,
    messages: Vec<(u64, Arc<dyn MessagesContainer>)>,
    typers: Vec<(u64, Arc<dyn TypingContainer>)>,
    member_sinks: Vec<(u64, Arc<dyn MemberListContainer>)>,
    next_subscription: u64,

    sections: Vec<MemberSection>,
    members: Vec<(MemberSectionId, Member)>,

    can_attach: bool,
    fail_sends: bool,
    fail_backlog: bool,

    uploads: Vec<(String, Vec<u8>)>,
    backlog_calls: usize,
    typing_calls: usize,
}

struct Inner {
    me: Author,
    typing_timeout: Duration,
    state: Mutex<MockState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Clone)]
pub struct MockMessenger {
    inner: Arc<Inner>,
}

impl MockMessenger {
    pub fn new(me: Author) -> Self {
        Self {
            inner: Arc::new(Inner {
                me,
                typing_timeout: Duration::from_secs(TYPING_TIMEOUT_SECS),
                state: Mutex::new(MockState::default()),
            }),
        }
    }

    pub fn with_history(self, mut history: Vec<MessageCreate>) -> Self {
        history.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        self.inner.state().history = history;
        self
    }

    pub fn with_attachments(self) -> Self {
        self.inner.state().can_attach = true;
        self
    }

    pub fn with_members(self, sections: Vec<MemberSection>, members: Vec<(MemberSectionId, Member)>) -> Self {
        {
            let mut state = self.inner.state();
            state.sections = sections;
            state.members = members;
        }
        self
    }

    pub fn me(&self) -> &Author {
        &self.inner.me
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.inner.state().fail_sends = fail;
    }

    pub fn set_fail_backlog(&self, fail: bool) {
        self.inner.state().fail_backlog = fail;
    }

    pub fn history(&self) -> Vec<MessageCreate> {
        self.inner.state().history.clone()
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.inner.state().uploads.clone()
    }

    pub fn backlog_calls(&self) -> usize {
        self.inner.state().backlog_calls
    }

    pub fn typing_calls(&self) -> usize {
        self.inner.state().typing_calls
    }

    /// Containers still attached through live subscriptions.
    pub fn live_subscriptions(&self) -> usize {
        let state = self.inner.state();
        state.messages.len() + state.typers.len() + state.member_sinks.len()
    }

    /// A message from someone else arrives.
    pub fn push_message(&self, msg: MessageCreate) {
        let containers = {
            let mut state = self.inner.state();
            let at = state.history.partition_point(|m| m.time <= msg.time);
            state.history.insert(at, msg.clone());
            state.messages.iter().map(|(_, c)| c.clone()).collect::<Vec<_>>()
        };
        for container in containers {
            container.create_message(msg.clone());
        }
    }

    pub fn start_typing(&self, typer: Typer) {
        for container in self.typing_containers() {
            container.add_typer(typer.clone());
        }
    }

    pub fn stop_typing(&self, author: &AuthorId) {
        for container in self.typing_containers() {
            container.remove_typer(author.clone());
        }
    }

    pub fn set_member(&self, section: MemberSectionId, member: Member) {
        let sinks = {
            let mut state = self.inner.state();
            state.members.retain(|(s, m)| !(s == &section && m.id == member.id));
            state.members.push((section.clone(), member.clone()));
            state.member_sinks.iter().map(|(_, c)| c.clone()).collect::<Vec<_>>()
        };
        for sink in sinks {
            sink.set_member(section.clone(), member.clone());
        }
    }

    fn typing_containers(&self) -> Vec<Arc<dyn TypingContainer>> {
        self.inner.state().typers.iter().map(|(_, c)| c.clone()).collect()
    }

    fn broadcast_update(&self, update: MessageUpdate) {
        let containers: Vec<_> = self
            .inner
            .state()
            .messages
            .iter()
            .map(|(_, c)| c.clone())
            .collect();
        for container in containers {
            container.update_message(update.clone());
        }
    }

    fn next_subscription(&self) -> u64 {
        let mut state = self.inner.state();
        state.next_subscription += 1;
        state.next_subscription
    }

    /// A subscription that detaches container `id` when cancelled.
    fn subscription(&self, name: &'static str, id: u64) -> Subscription {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        Subscription::new(name, move || {
            if let Some(inner) = inner.upgrade() {
                let mut state = inner.state();
                state.messages.retain(|(i, _)| *i != id);
                state.typers.retain(|(i, _)| *i != id);
                state.member_sinks.retain(|(i, _)| *i != id);
            }
        })
    }

    fn upload(&self, attachment: parlor_shared::SendableAttachment) -> BackendResult<MessageAttachment> {
        let mut reader = ReusableReader::new(attachment.clone());
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let uploaded = MessageAttachment {
            url: format!("https://files.mock.invalid/{}/{}", Uuid::new_v4(), attachment.name),
            name: attachment.name.clone(),
            size: data.len() as i64,
        };
        self.inner.state().uploads.push((attachment.name, data));
        Ok(uploaded)
    }
}

impl Messenger for MockMessenger {
    fn join_server(&self, container: Arc<dyn MessagesContainer>) -> BackendResult<Subscription> {
        let id = self.next_subscription();
        let page = {
            let mut state = self.inner.state();
            state.messages.push((id, container.clone()));
            let start = state.history.len().saturating_sub(JOIN_PAGE);
            state.history[start..].to_vec()
        };
        info!(subscription = id, replayed = page.len(), "Mock channel joined");

        for msg in page {
            container.create_message(msg);
        }
        Ok(self.subscription("messages", id))
    }

    fn as_backlogger(&self) -> Option<Arc<dyn Backlogger>> {
        Some(Arc::new(self.clone()))
    }

    fn as_typing_indicator(&self) -> Option<Arc<dyn TypingIndicator>> {
        Some(Arc::new(self.clone()))
    }

    fn as_member_lister(&self) -> Option<Arc<dyn MemberLister>> {
        Some(Arc::new(self.clone()))
    }

    fn as_sender(&self) -> Option<Arc<dyn Sender>> {
        Some(Arc::new(self.clone()))
    }

    fn as_editor(&self) -> Option<Arc<dyn Editor>> {
        Some(Arc::new(self.clone()))
    }

    fn as_nicknamer(&self) -> Option<Arc<dyn Nicknamer>> {
        Some(Arc::new(self.clone()))
    }
}

impl Sender for MockMessenger {
    fn send_message(&self, msg: SendableMessage) -> BackendResult<()> {
        if self.inner.state().fail_sends {
            return Err(BackendError::Transient("mock send failure".into()));
        }

        let attachments = msg
            .attachments
            .into_iter()
            .map(|attachment| self.upload(attachment))
            .collect::<BackendResult<Vec<_>>>()?;

        let echo = MessageCreate {
            id: MessageId::new(Uuid::new_v4().to_string()),
            nonce: msg.nonce,
            time: Utc::now(),
            author: self.inner.me.clone(),
            content: RichText::plain(msg.content),
            attachments,
            reply_to: msg.reply_to,
        };
        debug!(id = %echo.id, nonce = %echo.nonce, "Mock echoing sent message");
        self.push_message(echo);
        Ok(())
    }

    fn can_attach(&self) -> bool {
        self.inner.state().can_attach
    }
}

impl Editor for MockMessenger {
    fn message_editable(&self, id: &MessageId) -> bool {
        self.inner
            .state()
            .history
            .iter()
            .any(|m| &m.id == id && m.author.id == self.inner.me.id)
    }

    fn raw_content(&self, id: &MessageId) -> BackendResult<String> {
        self.inner
            .state()
            .history
            .iter()
            .find(|m| &m.id == id)
            .map(|m| m.content.content.clone())
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    fn edit(&self, id: &MessageId, content: String) -> BackendResult<()> {
        {
            let mut state = self.inner.state();
            let msg = state
                .history
                .iter_mut()
                .find(|m| &m.id == id)
                .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
            if msg.author.id != self.inner.me.id {
                return Err(BackendError::Forbidden(format!("{id} belongs to {}", msg.author.id)));
            }
            msg.content = RichText::plain(content.clone());
        }

        self.broadcast_update(MessageUpdate {
            id: id.clone(),
            author: None,
            content: Some(RichText::plain(content)),
        });
        Ok(())
    }
}

impl TypingIndicator for MockMessenger {
    fn typing(&self) -> BackendResult<()> {
        self.inner.state().typing_calls += 1;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.inner.typing_timeout
    }

    fn subscribe(&self, container: Arc<dyn TypingContainer>) -> BackendResult<Subscription> {
        let id = self.next_subscription();
        self.inner.state().typers.push((id, container));
        Ok(self.subscription("typing", id))
    }
}

impl Backlogger for MockMessenger {
    fn backlog(&self, before: &MessageId, container: Arc<dyn MessagesContainer>) -> BackendResult<()> {
        let page = {
            let mut state = self.inner.state();
            state.backlog_calls += 1;
            if state.fail_backlog {
                return Err(BackendError::Transient("mock backlog failure".into()));
            }
            let end = state
                .history
                .iter()
                .position(|m| &m.id == before)
                .ok_or_else(|| BackendError::NotFound(before.to_string()))?;
            let start = end.saturating_sub(BACKLOG_PAGE);
            state.history[start..end].to_vec()
        };
        debug!(%before, count = page.len(), "Mock backlog");

        // Newest first, like most chat APIs page backwards.
        for msg in page.into_iter().rev() {
            container.create_message(msg);
        }
        Ok(())
    }
}

impl MemberLister for MockMessenger {
    fn list_members(&self, container: Arc<dyn MemberListContainer>) -> BackendResult<Subscription> {
        let id = self.next_subscription();
        let (sections, members) = {
            let mut state = self.inner.state();
            state.member_sinks.push((id, container.clone()));
            (state.sections.clone(), state.members.clone())
        };

        container.set_sections(sections);
        for (section, member) in members {
            container.set_member(section, member);
        }
        Ok(self.subscription("members", id))
    }
}

impl Nicknamer for MockMessenger {
    fn nickname(&self, container: Arc<dyn LabelContainer>) -> BackendResult<Subscription> {
        container.set_label(self.inner.me.name.clone());
        Ok(Subscription::noop("nickname"))
    }
}

/// `count` messages cycling through `authors`, `step_secs` apart from
/// `start`, with ids `m0`, `m1`, ...
pub fn generate_history(
    count: usize,
    authors: &[Author],
    start: DateTime<Utc>,
    step_secs: i64,
) -> Vec<MessageCreate> {
    if authors.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|i| {
            let author = authors[i % authors.len()].clone();
            let time = start + chrono::Duration::seconds(step_secs * i as i64);
            MessageCreate::new(format!("m{i}"), time, author, format!("message {i}"))
        })
        .collect()
}
