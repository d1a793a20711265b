//! The message view controller.
//!
//! [`MessageView`] is the UI-thread state of one open channel: the message
//! list, the composer, typing and member state, plus the live backend
//! subscriptions. Backend calls run on workers through the [`UiHandle`];
//! their results and every backend callback come back as jobs on the UI
//! loop. Each join starts a new session, and jobs from an older session are
//! dropped when they arrive.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parlor_shared::backend::{BackendResult, Messenger, MessagesContainer, Sender};
use parlor_shared::constants::MEMBER_DRAIN_CHUNK;
use parlor_shared::{
    Author, AuthorId, MessageCreate, MessageDelete, MessageId, MessageUpdate, Nonce,
    NonceGenerator, RichText, SendableMessage, Subscription, Typer,
};
use tracing::{debug, info, trace, warn};

use crate::backlog::BacklogGate;
use crate::bridge::ViewSink;
use crate::config::ViewConfig;
use crate::error::{ClientError, InputError};
use crate::events::{emit_event, ViewEvent, ViewHooks};
use crate::image::ImageLoader;
use crate::input::Input;
use crate::list::{MessageList, SelectionChange};
use crate::members::{EventQueue, MemberEvent, MemberList};
use crate::mention::{self, MentionAction};
use crate::row::PresendState;
use crate::scheduler::UiHandle;
use crate::scroll::Adjustment;
use crate::typing::{TypingNotifier, TypingState};
use crate::uri::{self, ImageSize, LinkAction};
use crate::widget::ListWidget;

/// Delay between two member drain chunks; just enough to yield to the loop.
const MEMBER_DRAIN_DELAY: Duration = Duration::from_millis(1);

struct Channel {
    messenger: Arc<dyn Messenger>,
    subscriptions: Vec<Subscription>,
}

pub struct MessageView {
    ui: UiHandle<MessageView>,
    config: ViewConfig,
    hooks: Box<dyn ViewHooks>,
    images: Option<Arc<dyn ImageLoader>>,

    list: MessageList,
    input: Input,
    nonces: Option<NonceGenerator>,

    typing: TypingState,
    notifier: TypingNotifier,
    typing_tick_scheduled: bool,

    members: MemberList,
    member_queue: EventQueue<MemberEvent>,
    nickname: Option<RichText>,

    backlog: BacklogGate,
    channel: Option<Channel>,
    session: u64,
}

impl MessageView {
    pub fn new(
        ui: UiHandle<MessageView>,
        config: ViewConfig,
        widget: Box<dyn ListWidget>,
        hooks: Box<dyn ViewHooks>,
    ) -> Self {
        let list = MessageList::new(widget, &config);
        let backlog = BacklogGate::new(config.backlog_interval());
        Self {
            ui,
            config,
            hooks,
            images: None,
            list,
            input: Input::default(),
            nonces: None,
            typing: TypingState::default(),
            notifier: TypingNotifier::default(),
            typing_tick_scheduled: false,
            members: MemberList::default(),
            member_queue: EventQueue::new(MEMBER_DRAIN_CHUNK),
            nickname: None,
            backlog,
            channel: None,
            session: 0,
        }
    }

    pub fn with_image_loader(mut self, loader: Arc<dyn ImageLoader>) -> Self {
        self.images = Some(loader);
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn list(&self) -> &MessageList {
        &self.list
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut Input {
        &mut self.input
    }

    pub fn typing(&self) -> &TypingState {
        &self.typing
    }

    pub fn members(&self) -> &MemberList {
        &self.members
    }

    pub fn nickname(&self) -> Option<&RichText> {
        self.nickname.as_ref()
    }

    pub fn is_joined(&self) -> bool {
        self.channel.is_some()
    }

    /// Number of live backend subscriptions.
    pub fn subscriptions(&self) -> usize {
        self.channel
            .as_ref()
            .map_or(0, |channel| channel.subscriptions.len())
    }

    pub(crate) fn is_current(&self, session: u64) -> bool {
        self.channel.is_some() && self.session == session
    }

    fn emit(&self, event: ViewEvent) {
        emit_event(self.hooks.as_ref(), event);
    }

    // -----------------------------------------------------------------------
    // Channel lifecycle
    // -----------------------------------------------------------------------

    /// Record the local user; used for presends, nonces and self mentions.
    pub fn set_self(&mut self, author: Author) {
        debug!(id = %author.id, "Local user set");
        self.nonces = Some(NonceGenerator::new(author.id.clone()));
        self.list.set_self(author);
    }

    /// Open `messenger`, leaving the current channel first. Subscriptions
    /// are established on workers and attach as they come back.
    pub fn join(&mut self, messenger: Arc<dyn Messenger>) {
        self.leave();
        self.session += 1;
        let session = self.session;
        info!(session, "Joining channel");

        self.channel = Some(Channel {
            messenger: messenger.clone(),
            subscriptions: Vec::new(),
        });
        let sink = Arc::new(ViewSink::new(self.ui.clone(), session));

        let container: Arc<dyn MessagesContainer> = sink.clone();
        let joining = messenger.clone();
        self.ui.spawn_async(
            "join_server",
            move || joining.join_server(container),
            move |view: &mut MessageView, result| view.on_subscribed(session, "messages", result),
        );

        if let Some(indicator) = messenger.as_typing_indicator() {
            let container = sink.clone();
            self.ui.spawn_async(
                "typing_subscribe",
                move || (indicator.timeout(), indicator.subscribe(container)),
                move |view: &mut MessageView, (timeout, result)| {
                    if view.is_current(session) {
                        view.typing.set_timeout(timeout);
                    }
                    view.on_subscribed(session, "typing", result);
                },
            );
        }

        if let Some(lister) = messenger.as_member_lister() {
            let container = sink.clone();
            self.ui.spawn_async(
                "list_members",
                move || lister.list_members(container),
                move |view: &mut MessageView, result| view.on_subscribed(session, "members", result),
            );
        }

        if let Some(nicknamer) = messenger.as_nicknamer() {
            let container = sink;
            self.ui.spawn_async(
                "nickname",
                move || nicknamer.nickname(container),
                move |view: &mut MessageView, result| view.on_subscribed(session, "nickname", result),
            );
        }
    }

    fn on_subscribed(&mut self, session: u64, what: &'static str, result: BackendResult<Subscription>) {
        if !self.is_current(session) {
            // Dropping the subscription cancels it.
            debug!(session, what, "Subscription arrived for a channel that was left");
            return;
        }
        match result {
            Ok(subscription) => {
                debug!(session, what, "Subscribed");
                if let Some(channel) = self.channel.as_mut() {
                    channel.subscriptions.push(subscription);
                }
            }
            Err(e) => {
                warn!(session, what, error = %e, "Subscription failed");
                self.emit(ViewEvent::Error {
                    message: format!("Failed to subscribe to {what}: {e}"),
                });
            }
        }
    }

    /// Cancel every subscription and drop all channel state.
    pub fn leave(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        for subscription in &mut channel.subscriptions {
            subscription.cancel();
        }
        info!(session = self.session, "Left channel");
        self.session += 1;

        self.list.reset();
        self.input.clear();
        self.notifier.reset();
        self.backlog.reset();
        self.members.clear();
        self.member_queue.clear();
        self.nickname = None;
        if self.typing.clear() {
            self.typing_changed();
        }
        self.emit(ViewEvent::MembersChanged);
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    pub fn create_message(&mut self, msg: MessageCreate) {
        let author = msg.author.id.clone();
        self.list.create_message(msg);
        // A message ends its author's typing state.
        self.remove_typer(&author);
    }

    pub fn update_message(&mut self, update: MessageUpdate) {
        self.list.update_message(update);
    }

    pub fn delete_message(&mut self, delete: MessageDelete) {
        self.list.delete_message(&delete.id);
    }

    /// Send the composer content, or apply the pending edit.
    pub fn send_input(&mut self) -> Result<(), InputError> {
        let messenger = self
            .channel
            .as_ref()
            .map(|channel| channel.messenger.clone())
            .ok_or(InputError::NotJoined)?;

        if self.input.editing().is_some() {
            return self.send_edit(messenger.as_ref());
        }
        if self.input.is_empty() {
            return Err(InputError::Empty);
        }

        let sender = messenger.as_sender().ok_or(InputError::SendUnsupported)?;
        if !self.input.files().is_empty() && !sender.can_attach() {
            return Err(InputError::AttachmentsUnsupported);
        }
        let author = self.list.self_author().cloned().ok_or(InputError::NoSelf)?;
        let nonces = self.nonces.as_ref().ok_or(InputError::NoSelf)?;

        let now = Utc::now();
        let nonce = nonces.next_at(now);
        let (sendable, uploads) = self.input.take_sendable(nonce);
        let replied = sendable.reply_to.is_some();

        self.list
            .add_presend(PresendState::new(author, now, sendable.clone(), uploads));
        self.notifier.reset();
        if replied {
            self.list.unselect();
            self.emit(ViewEvent::ReplyChanged { id: None });
        }

        self.dispatch_send(sender, sendable);
        Ok(())
    }

    fn send_edit(&mut self, messenger: &dyn Messenger) -> Result<(), InputError> {
        if self.input.text().trim().is_empty() {
            return Err(InputError::Empty);
        }
        let editor = messenger.as_editor().ok_or(InputError::NotEditable)?;
        let Some((id, content)) = self.input.take_edit() else {
            return Ok(());
        };

        debug!(%id, "Editing message");
        self.ui.spawn_async(
            "edit_message",
            move || {
                let result = editor.edit(&id, content);
                (id, result)
            },
            |view: &mut MessageView, (id, result): (MessageId, BackendResult<()>)| {
                if let Err(e) = result {
                    warn!(%id, error = %e, "Edit failed");
                    view.emit(ViewEvent::Error {
                        message: format!("Failed to edit message: {e}"),
                    });
                }
            },
        );
        Ok(())
    }

    /// Hand `sendable` to a worker. Success is confirmed by the echoed
    /// message, so only failures are applied here.
    fn dispatch_send(&self, sender: Arc<dyn Sender>, sendable: SendableMessage) {
        let nonce = sendable.nonce.clone();
        let session = self.session;
        debug!(%nonce, attachments = sendable.attachments.len(), "Sending message");

        self.ui.spawn_async(
            "send_message",
            move || sender.send_message(sendable),
            move |view: &mut MessageView, result| {
                if let Err(e) = result {
                    if view.is_current(session) {
                        view.list.presend_failed(&nonce, e.to_string());
                    }
                }
            },
        );
    }

    /// Send a failed presend again.
    pub fn retry_presend(&mut self, nonce: &Nonce) -> bool {
        let Some(sender) = self
            .channel
            .as_ref()
            .and_then(|channel| channel.messenger.as_sender())
        else {
            return false;
        };
        let Some(sendable) = self.list.retry_presend(nonce) else {
            return false;
        };
        self.dispatch_send(sender, sendable);
        true
    }

    pub fn discard_presend(&mut self, nonce: &Nonce) -> bool {
        self.list.discard_presend(nonce)
    }

    /// Load the raw content of `id` into the composer for editing.
    pub fn begin_edit(&mut self, id: MessageId) -> Result<(), InputError> {
        let editor = self
            .channel
            .as_ref()
            .ok_or(InputError::NotJoined)?
            .messenger
            .as_editor()
            .ok_or(InputError::NotEditable)?;
        if self.list.get(&id).is_none() {
            return Err(InputError::NotEditable);
        }

        let session = self.session;
        self.ui.spawn_async(
            "raw_content",
            move || {
                let content = if editor.message_editable(&id) {
                    editor.raw_content(&id).map(Some)
                } else {
                    Ok(None)
                };
                (id, content)
            },
            move |view: &mut MessageView, (id, content): (MessageId, BackendResult<Option<String>>)| {
                if !view.is_current(session) {
                    return;
                }
                match content {
                    Ok(Some(content)) => {
                        view.input.begin_edit(id.clone(), content.clone());
                        view.emit(ViewEvent::EditLoaded { id, content });
                    }
                    Ok(None) => view.emit(ViewEvent::Error {
                        message: InputError::NotEditable.to_string(),
                    }),
                    Err(e) => {
                        warn!(%id, error = %e, "Failed to load message for editing");
                        view.emit(ViewEvent::Error {
                            message: format!("Failed to load message: {e}"),
                        });
                    }
                }
            },
        );
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.input.cancel_edit();
    }

    /// Toggle selection; the selected message becomes the reply target.
    pub fn select_message(&mut self, id: &MessageId) -> SelectionChange {
        let change = self.list.select(id);
        match &change {
            SelectionChange::Selected(id) => {
                self.input.set_reply(Some(id.clone()));
                self.emit(ViewEvent::ReplyChanged {
                    id: Some(id.clone()),
                });
            }
            SelectionChange::Unselected => {
                self.input.set_reply(None);
                self.emit(ViewEvent::ReplyChanged { id: None });
            }
            SelectionChange::Unchanged => {}
        }
        change
    }

    /// The composer text changed; tell the backend we are typing, at most
    /// once per typing timeout.
    pub fn input_changed(&mut self, text: impl Into<String>) {
        self.input.set_text(text);
        if self.input.text().is_empty() {
            return;
        }
        let Some(indicator) = self
            .channel
            .as_ref()
            .and_then(|channel| channel.messenger.as_typing_indicator())
        else {
            return;
        };
        if !self.notifier.should_notify(Instant::now(), self.typing.timeout()) {
            return;
        }
        self.ui.spawn_async(
            "typing",
            move || indicator.typing(),
            |_: &mut MessageView, result: BackendResult<()>| {
                if let Err(e) = result {
                    debug!(error = %e, "Typing notification failed");
                }
            },
        );
    }

    // -----------------------------------------------------------------------
    // Scrolling and backlog
    // -----------------------------------------------------------------------

    pub fn on_scroll(&mut self, adj: Adjustment) {
        if self.list.on_scroll(adj).at_top {
            self.request_backlog();
        }
    }

    pub fn on_resize(&mut self, adj: Adjustment) {
        self.list.on_resize(adj);
    }

    /// Ask the backend for messages older than the oldest one shown.
    /// Returns `false` when gated or unsupported.
    pub fn request_backlog(&mut self) -> bool {
        let Some(backlogger) = self
            .channel
            .as_ref()
            .and_then(|channel| channel.messenger.as_backlogger())
        else {
            return false;
        };
        let Some(before) = self.list.oldest_id() else {
            return false;
        };
        if !self.backlog.try_begin(Instant::now()) {
            return false;
        }

        self.list.set_backlog_in_progress(true);
        let session = self.session;
        let container: Arc<dyn MessagesContainer> = Arc::new(ViewSink::new(self.ui.clone(), session));
        debug!(%before, "Requesting backlog");

        self.ui.spawn_async(
            "backlog",
            move || backlogger.backlog(&before, container),
            move |view: &mut MessageView, result: BackendResult<()>| {
                if !view.is_current(session) {
                    return;
                }
                view.backlog.finish();
                view.list.set_backlog_in_progress(false);
                if let Err(e) = result {
                    warn!(error = %e, "Backlog request failed");
                }
            },
        );
        true
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// A link inside the message `id` was activated.
    pub fn activate_link(&mut self, id: &MessageId, link: &str) -> Result<(), ClientError> {
        match uri::classify(link, &self.config.mention_scheme)? {
            LinkAction::Mention(index) => {
                let action = self
                    .list
                    .get(id)
                    .and_then(|row| row.render().mentions.get(index))
                    .map(mention::action_for);
                match action {
                    Some(MentionAction::Highlight(target)) => {
                        self.highlight(&target);
                    }
                    Some(MentionAction::Popover(info)) => {
                        self.emit(ViewEvent::ShowMention { info });
                    }
                    None => debug!(%id, index, "Stale mention link"),
                }
            }
            LinkAction::ImagePreview { url, size } => {
                self.emit(ViewEvent::ImagePreview {
                    url: url.clone(),
                    size,
                });
                self.load_image(url, size);
            }
            LinkAction::ConfirmOpen { url } => {
                if self.config.confirm_external_links {
                    self.emit(ViewEvent::ConfirmOpen { url });
                } else {
                    self.emit(ViewEvent::OpenExternal { url });
                }
            }
        }
        Ok(())
    }

    /// Scroll to and highlight `id` for the configured duration.
    pub fn highlight(&mut self, id: &MessageId) -> bool {
        let Some(token) = self.list.highlight(id) else {
            debug!(%id, "Referenced message is not loaded");
            return false;
        };
        self.ui
            .run_after_ui(self.config.highlight_duration(), move |view: &mut MessageView| {
                view.list.unhighlight(token);
            });
        true
    }

    fn load_image(&self, url: String, size: ImageSize) {
        let Some(loader) = self.images.clone() else {
            return;
        };
        let fetch = url.clone();
        self.ui.spawn_future(
            async move { loader.load(fetch, size).await },
            move |view: &mut MessageView, result| match result {
                Ok(bytes) => view.emit(ViewEvent::ImageLoaded { url, bytes }),
                Err(e) => {
                    warn!(url = %url, error = %e, "Image preview failed");
                    view.emit(ViewEvent::Error {
                        message: format!("Failed to load image: {e}"),
                    });
                }
            },
        );
    }

    // -----------------------------------------------------------------------
    // Typing
    // -----------------------------------------------------------------------

    pub fn add_typer(&mut self, typer: Typer) {
        if self.typing.add(typer) {
            self.typing_changed();
        }
        self.schedule_typing_tick();
    }

    pub fn remove_typer(&mut self, author: &AuthorId) {
        if self.typing.remove(author) {
            self.typing_changed();
        }
    }

    fn typing_changed(&self) {
        self.emit(ViewEvent::TypingChanged {
            label: self.typing.label(),
            empty: self.typing.is_empty(),
        });
    }

    /// Keep a prune tick running while anyone is typing.
    fn schedule_typing_tick(&mut self) {
        if self.typing_tick_scheduled || self.typing.is_empty() {
            return;
        }
        self.typing_tick_scheduled = true;
        self.ui
            .run_after_ui(self.config.typing_tick(), |view: &mut MessageView| view.typing_tick());
    }

    fn typing_tick(&mut self) {
        self.typing_tick_scheduled = false;
        if self.typing.prune(Utc::now()) {
            self.typing_changed();
        }
        self.schedule_typing_tick();
    }

    // -----------------------------------------------------------------------
    // Members
    // -----------------------------------------------------------------------

    pub fn member_event(&mut self, event: MemberEvent) {
        if let Some(event) = self.member_queue.push(event) {
            self.members.apply(event);
            self.emit(ViewEvent::MembersChanged);
        }
    }

    /// A popover anchored in the member list opened; hold member events.
    pub fn open_popover(&mut self) {
        self.member_queue.activate();
    }

    pub fn close_popover(&mut self) {
        if self.member_queue.deactivate() {
            self.schedule_member_drain();
        }
    }

    fn schedule_member_drain(&self) {
        self.ui
            .run_after_ui(MEMBER_DRAIN_DELAY, |view: &mut MessageView| view.drain_members());
    }

    fn drain_members(&mut self) {
        let (chunk, more) = self.member_queue.drain_chunk();
        if !chunk.is_empty() {
            trace!(events = chunk.len(), "Applying queued member events");
            for event in chunk {
                self.members.apply(event);
            }
            self.emit(ViewEvent::MembersChanged);
        }
        if more {
            self.schedule_member_drain();
        }
    }

    pub fn set_nickname(&mut self, label: RichText) {
        self.nickname = Some(label.clone());
        self.emit(ViewEvent::NicknameChanged { label });
    }
}
