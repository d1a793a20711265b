//! Backend-facing sinks.
//!
//! Backends call the container traits from any thread. [`ViewSink`] turns
//! every call into a job on the UI loop, tagged with the session it was
//! created for, so events from a channel that was left never reach the view.

use parlor_shared::backend::{
    LabelContainer, MemberListContainer, MessagesContainer, TypingContainer,
};
use parlor_shared::{
    AuthorId, Member, MemberSection, MemberSectionId, MessageCreate, MessageDelete,
    MessageUpdate, RichText, Typer,
};
use tracing::trace;

use crate::members::MemberEvent;
use crate::scheduler::UiHandle;
use crate::view::MessageView;

pub(crate) struct ViewSink {
    ui: UiHandle<MessageView>,
    session: u64,
}

impl ViewSink {
    pub(crate) fn new(ui: UiHandle<MessageView>, session: u64) -> Self {
        Self { ui, session }
    }

    fn apply<F>(&self, job: F)
    where
        F: FnOnce(&mut MessageView) + Send + 'static,
    {
        let session = self.session;
        self.ui.run_on_ui(move |view| {
            if view.is_current(session) {
                job(view);
            } else {
                trace!(session, "Dropping event from a previous session");
            }
        });
    }
}

impl MessagesContainer for ViewSink {
    fn create_message(&self, msg: MessageCreate) {
        self.apply(move |view| view.create_message(msg));
    }

    fn update_message(&self, msg: MessageUpdate) {
        self.apply(move |view| view.update_message(msg));
    }

    fn delete_message(&self, msg: MessageDelete) {
        self.apply(move |view| view.delete_message(msg));
    }
}

impl TypingContainer for ViewSink {
    fn add_typer(&self, typer: Typer) {
        self.apply(move |view| view.add_typer(typer));
    }

    fn remove_typer(&self, author: AuthorId) {
        self.apply(move |view| view.remove_typer(&author));
    }
}

impl MemberListContainer for ViewSink {
    fn set_sections(&self, sections: Vec<MemberSection>) {
        self.apply(move |view| view.member_event(MemberEvent::SetSections(sections)));
    }

    fn set_member(&self, section: MemberSectionId, member: Member) {
        self.apply(move |view| view.member_event(MemberEvent::SetMember { section, member }));
    }

    fn remove_member(&self, section: MemberSectionId, member: AuthorId) {
        self.apply(move |view| view.member_event(MemberEvent::RemoveMember { section, member }));
    }
}

impl LabelContainer for ViewSink {
    fn set_label(&self, label: RichText) {
        self.apply(move |view| view.set_nickname(label));
    }
}
