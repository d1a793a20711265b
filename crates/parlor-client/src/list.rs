//! The message list container.
//!
//! [`MessageList`] owns the [`MessageStore`] of rows and keeps a
//! [`ListWidget`] in lockstep with it: every insert, removal, move and
//! variant swap in the store is mirrored at the same index. It also owns
//! the per-list policies: reconciling backend messages with presends, cozy
//! regrouping, autoscroll, eviction of old rows, selection and highlight.
//!
//! Everything here runs on the UI thread.

use std::sync::Arc;

use parlor_shared::{
    Author, AuthorId, MentionTarget, MessageCreate, MessageId, MessageUpdate, Nonce,
    SendableMessage,
};
use parlor_store::{Hit, MessageStore, Moved, Record};
use tracing::{debug, error, trace, warn};

use crate::config::ViewConfig;
use crate::cozy;
use crate::render::Renderer;
use crate::row::{MessageRow, PresendPhase, PresendState, RowState, Variant};
use crate::scroll::{Adjustment, ScrollChange, ScrollState};
use crate::widget::ListWidget;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Selected(MessageId),
    Unselected,
    Unchanged,
}

pub struct MessageList {
    store: MessageStore<MessageRow>,
    widget: Box<dyn ListWidget>,
    renderer: Renderer,
    self_author: Option<Arc<Author>>,
    selected: Option<MessageId>,
    highlight: Option<(MessageId, u64)>,
    next_token: u64,
    scroll: ScrollState,
    backlog_limit: usize,
    collapse_window: chrono::Duration,
    backlog_in_progress: bool,
}

impl MessageList {
    pub fn new(widget: Box<dyn ListWidget>, config: &ViewConfig) -> Self {
        Self {
            store: MessageStore::new(),
            widget,
            renderer: Renderer::new(config.mention_scheme.clone()),
            self_author: None,
            selected: None,
            highlight: None,
            next_token: 0,
            scroll: ScrollState::default(),
            backlog_limit: config.backlog_limit,
            collapse_window: config.collapse_window(),
            backlog_in_progress: false,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &MessageStore<MessageRow> {
        &self.store
    }

    pub fn get(&self, id: &MessageId) -> Option<&MessageRow> {
        self.store.get(id)
    }

    pub fn get_pending(&self, nonce: &Nonce) -> Option<&MessageRow> {
        self.store.get_pending(nonce)
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    pub fn selected(&self) -> Option<&MessageId> {
        self.selected.as_ref()
    }

    pub fn self_author(&self) -> Option<&Arc<Author>> {
        self.self_author.as_ref()
    }

    pub fn backlog_in_progress(&self) -> bool {
        self.backlog_in_progress
    }

    /// The oldest confirmed message, used as the backlog cursor.
    pub fn oldest_id(&self) -> Option<MessageId> {
        self.store
            .iter()
            .find(|row| !row.id().is_empty())
            .map(|row| row.id().clone())
    }

    // -----------------------------------------------------------------------
    // Backend events
    // -----------------------------------------------------------------------

    /// Record the local user; rows mentioning them are re-marked.
    pub fn set_self(&mut self, author: Author) {
        let author = Arc::new(author);
        self.self_author = Some(author.clone());

        for index in 0..self.store.len() {
            let mut changed = false;
            self.store
                .update_nth(index, |row| changed = row.mark_self(Some(&author.id)));
            if changed {
                if let Some(row) = self.store.nth(index) {
                    self.widget.update(index, row);
                }
            }
        }
    }

    /// Insert a backend message, or reconcile it with the row it refers to.
    /// Returns the row's final position, `None` if it was dropped.
    pub fn create_message(&mut self, msg: MessageCreate) -> Option<usize> {
        match self.store.lookup_hit(&msg.id, &msg.nonce) {
            Some((Hit::Nonce, _)) => self.confirm(msg),
            Some((Hit::Id, _)) => self.refresh(msg),
            None => {
                let row = MessageRow::new(
                    RowState::Received(msg.into()),
                    Variant::Full,
                    &self.renderer,
                    self.self_id(),
                );
                self.insert_row(row)
            }
        }
    }

    /// Apply an edit. Empty content leaves the content untouched.
    pub fn update_message(&mut self, update: MessageUpdate) -> Option<usize> {
        let MessageUpdate {
            id,
            author,
            content,
        } = update;
        let content = content.filter(|c| !c.is_empty());

        let renderer = &self.renderer;
        let self_id = self.self_author.as_ref().map(|a| &a.id);
        let moved = self.store.update(&id, |row| {
            if let Some(author) = author {
                row.update_author(Arc::new(author));
            }
            if let Some(content) = content {
                row.update_content(content, true, renderer, self_id);
            }
        });

        match moved {
            Some(moved) => Some(self.apply_move(moved)),
            None => {
                trace!(%id, "Update for unknown message");
                None
            }
        }
    }

    pub fn delete_message(&mut self, id: &MessageId) -> Option<usize> {
        let Some((index, _)) = self.store.delete(id) else {
            trace!(%id, "Delete for unknown message");
            return None;
        };
        self.widget.remove(index);
        self.forget(id);
        self.regroup(index);
        Some(index)
    }

    // -----------------------------------------------------------------------
    // Presends
    // -----------------------------------------------------------------------

    pub fn add_presend(&mut self, presend: PresendState) -> Option<usize> {
        let row = MessageRow::new(
            RowState::Presend(presend),
            Variant::Full,
            &self.renderer,
            self.self_id(),
        );
        self.insert_row(row)
    }

    /// Mark a presend as failed. Ignored once the echo has confirmed it.
    pub fn presend_failed(&mut self, nonce: &Nonce, reason: String) -> Option<usize> {
        warn!(%nonce, error = %reason, "Message failed to send");
        let Some(moved) = self
            .store
            .update_pending(nonce, |row| row.set_phase(PresendPhase::Error(reason)))
        else {
            debug!(%nonce, "Send failure for a message that is no longer pending");
            return None;
        };
        Some(self.apply_move(moved))
    }

    /// Put a failed presend back into the loading state and return the
    /// message to send again.
    pub fn retry_presend(&mut self, nonce: &Nonce) -> Option<SendableMessage> {
        let sendable = match self.store.get_pending(nonce).map(MessageRow::state) {
            Some(RowState::Presend(PresendState {
                phase: PresendPhase::Error(_),
                sendable,
                ..
            })) => sendable.clone(),
            _ => return None,
        };

        let moved = self
            .store
            .update_pending(nonce, |row| row.set_phase(PresendPhase::Loading))?;
        self.apply_move(moved);
        debug!(%nonce, "Retrying presend");
        Some(sendable)
    }

    pub fn discard_presend(&mut self, nonce: &Nonce) -> bool {
        let Some((index, _)) = self.store.delete_pending(nonce) else {
            return false;
        };
        self.widget.remove(index);
        self.regroup(index);
        true
    }

    // -----------------------------------------------------------------------
    // Selection and highlight
    // -----------------------------------------------------------------------

    /// Toggle selection of `id`. Selecting another row clears the current
    /// one; rows that are not focusable cannot be selected.
    pub fn select(&mut self, id: &MessageId) -> SelectionChange {
        let Some(index) = self.store.index_of_id(id) else {
            return SelectionChange::Unchanged;
        };
        if !self.store.nth(index).is_some_and(MessageRow::focusable) {
            return SelectionChange::Unchanged;
        }

        if self.selected.as_ref() == Some(id) {
            self.selected = None;
            self.widget.set_selected(None);
            return SelectionChange::Unselected;
        }
        self.selected = Some(id.clone());
        self.widget.set_selected(Some(index));
        SelectionChange::Selected(id.clone())
    }

    pub fn unselect(&mut self) -> SelectionChange {
        if self.selected.take().is_none() {
            return SelectionChange::Unchanged;
        }
        self.widget.set_selected(None);
        SelectionChange::Unselected
    }

    /// Scroll to, focus and highlight `id`. The returned token clears the
    /// highlight through [`unhighlight`](Self::unhighlight), unless another
    /// highlight replaced it first.
    pub fn highlight(&mut self, id: &MessageId) -> Option<u64> {
        self.clear_highlight();

        let index = self.store.index_of_id(id)?;
        self.store
            .update_nth(index, |row| row.set_highlighted(true));
        if let Some(row) = self.store.nth(index) {
            self.widget.update(index, row);
        }
        self.widget.scroll_to(index);
        self.widget.grab_focus(index);

        self.next_token += 1;
        self.highlight = Some((id.clone(), self.next_token));
        Some(self.next_token)
    }

    pub fn unhighlight(&mut self, token: u64) -> bool {
        if !matches!(&self.highlight, Some((_, current)) if *current == token) {
            return false;
        }
        self.clear_highlight();
        true
    }

    /// Highlight the message a mention refers to, if it is one.
    pub fn find_by_reference(&mut self, target: &MentionTarget) -> Option<u64> {
        match target {
            MentionTarget::Message { id } => self.highlight(id),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Scrolling and eviction
    // -----------------------------------------------------------------------

    pub fn on_scroll(&mut self, adj: Adjustment) -> ScrollChange {
        let change = self.scroll.on_scroll(adj);
        if change.became_bottomed {
            self.clean_messages();
        }
        change
    }

    pub fn on_resize(&mut self, adj: Adjustment) -> ScrollChange {
        let change = self.scroll.on_resize(adj);
        if change.became_bottomed {
            self.clean_messages();
        }
        change
    }

    pub fn set_backlog_in_progress(&mut self, in_progress: bool) {
        self.backlog_in_progress = in_progress;
        if !in_progress {
            self.clean_messages();
        }
    }

    /// Evict the oldest rows so at most `backlog_limit` remain before the
    /// newest. Only while bottomed and no backlog request is in flight.
    /// Returns the number of rows evicted.
    pub fn clean_messages(&mut self) -> usize {
        if !self.scroll.is_bottomed() || self.backlog_in_progress {
            return 0;
        }
        let excess = self
            .store
            .len()
            .saturating_sub(self.backlog_limit.saturating_add(1));
        if excess == 0 {
            return 0;
        }

        let evicted = self.store.evict_earliest(excess);
        for row in &evicted {
            self.widget.remove(0);
            if !row.id().is_empty() {
                self.forget(row.id());
            }
        }
        self.regroup(0);

        debug!(evicted = evicted.len(), remaining = self.store.len(), "Evicted old messages");
        evicted.len()
    }

    /// Drop every row, e.g. when leaving a channel.
    pub fn reset(&mut self) {
        for index in (0..self.store.len()).rev() {
            self.widget.remove(index);
        }
        self.store.clear();
        self.selected = None;
        self.highlight = None;
        self.scroll = ScrollState::default();
        self.backlog_in_progress = false;
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn self_id(&self) -> Option<&AuthorId> {
        self.self_author.as_ref().map(|a| &a.id)
    }

    fn confirm(&mut self, msg: MessageCreate) -> Option<usize> {
        let MessageCreate {
            id,
            nonce,
            time,
            author,
            content,
            attachments,
            ..
        } = msg;

        let renderer = &self.renderer;
        let self_id = self.self_author.as_ref().map(|a| &a.id);
        let confirmed = self.store.confirm_nonce(&nonce, id.clone(), |row| {
            row.update_author(Arc::new(author));
            row.update_content(content, false, renderer, self_id);
            row.update_timestamp(time);
            row.update_attachments(attachments);
        });

        match confirmed {
            Ok(Some(moved)) => {
                debug!(%nonce, %id, from = moved.from, to = moved.to, "Presend confirmed");
                Some(self.apply_move(moved))
            }
            Ok(None) => None,
            Err(e) => {
                error!(%nonce, %id, error = %e, "Failed to confirm presend");
                None
            }
        }
    }

    /// The backend re-sent a message we already have.
    fn refresh(&mut self, msg: MessageCreate) -> Option<usize> {
        let MessageCreate {
            id,
            time,
            author,
            content,
            attachments,
            ..
        } = msg;

        let renderer = &self.renderer;
        let self_id = self.self_author.as_ref().map(|a| &a.id);
        let moved = self.store.update(&id, |row| {
            row.update_author(Arc::new(author));
            row.update_content(content, false, renderer, self_id);
            row.update_timestamp(time);
            row.update_attachments(attachments);
        })?;
        Some(self.apply_move(moved))
    }

    fn insert_row(&mut self, mut row: MessageRow) -> Option<usize> {
        let position = self.store.position_for(&row);
        let prev = position.checked_sub(1).and_then(|i| self.store.nth(i));
        let variant = cozy::variant_for(prev.map(MessageRow::unwrap), row.unwrap(), self.collapse_window);
        row.set_variant(variant);

        let index = match self.store.insert(row) {
            Ok(index) => index,
            Err(e) => {
                error!(error = %e, "Failed to insert message");
                return None;
            }
        };
        if let Some(row) = self.store.nth(index) {
            self.widget.insert(index, row);
        }
        self.regroup(index + 1);

        if self.scroll.is_bottomed() {
            self.widget.scroll_to_bottom();
        }
        let evicted = self.clean_messages();
        index.checked_sub(evicted)
    }

    /// Mirror a store mutation into the widget and regroup what it touched.
    fn apply_move(&mut self, moved: Moved) -> usize {
        if moved.is_move() {
            self.widget.remove(moved.from);
            if let Some(row) = self.store.nth(moved.to) {
                self.widget.insert(moved.to, row);
            }
            // The old neighbours are now adjacent.
            self.regroup(moved.from);
            self.regroup(moved.from + 1);
            self.sync_selection();
        } else if let Some(row) = self.store.nth(moved.to) {
            self.widget.update(moved.to, row);
        }
        self.regroup(moved.to);
        self.regroup(moved.to + 1);
        moved.to
    }

    /// Make the variant of row `index` match its predecessor.
    fn regroup(&mut self, index: usize) {
        let Some(row) = self.store.nth(index) else {
            return;
        };
        let prev = index.checked_sub(1).and_then(|i| self.store.nth(i));
        let want = cozy::variant_for(prev.map(MessageRow::unwrap), row.unwrap(), self.collapse_window);
        if row.variant() == want {
            return;
        }

        let renderer = &self.renderer;
        let self_id = self.self_author.as_ref().map(|a| &a.id);
        if let Err(e) = self
            .store
            .replace_nth(index, |old| old.into_variant(want, renderer, self_id))
        {
            error!(index, error = %e, "Failed to swap row variant");
            return;
        }
        if let Some(row) = self.store.nth(index) {
            self.widget.swap(index, row);
        }
        trace!(index, ?want, "Row variant swapped");

        if self.selected_index() == Some(index) {
            self.widget.set_selected(Some(index));
        }
    }

    fn selected_index(&self) -> Option<usize> {
        self.selected
            .as_ref()
            .and_then(|id| self.store.index_of_id(id))
    }

    fn sync_selection(&mut self) {
        if let Some(index) = self.selected_index() {
            self.widget.set_selected(Some(index));
        }
    }

    fn clear_highlight(&mut self) {
        let Some((id, _)) = self.highlight.take() else {
            return;
        };
        if let Some(moved) = self.store.update(&id, |row| row.set_highlighted(false)) {
            if let Some(row) = self.store.nth(moved.to) {
                self.widget.update(moved.to, row);
            }
        }
    }

    /// Drop selection and highlight pointing at a removed row.
    fn forget(&mut self, id: &MessageId) {
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
            self.widget.set_selected(None);
        }
        if matches!(&self.highlight, Some((highlighted, _)) if highlighted == id) {
            self.highlight = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use parlor_shared::RichText;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::widget::testing::RecordingWidget;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn msg(id: &str, author: &str, secs: i64) -> MessageCreate {
        MessageCreate::new(id, t(secs), Author::new(author, author), format!("text of {id}"))
    }

    fn presend(nonce: &str, secs: i64, text: &str) -> PresendState {
        PresendState::new(
            Arc::new(Author::new("me", "Me")),
            t(secs),
            SendableMessage {
                content: text.into(),
                nonce: Nonce::from(nonce),
                reply_to: None,
                attachments: Vec::new(),
            },
            Vec::new(),
        )
    }

    fn list(limit: usize) -> (MessageList, RecordingWidget) {
        let widget = RecordingWidget::default();
        let config = ViewConfig {
            backlog_limit: limit,
            ..Default::default()
        };
        (MessageList::new(Box::new(widget.clone()), &config), widget)
    }

    fn ids(list: &MessageList) -> Vec<String> {
        list.store()
            .iter()
            .map(|r| {
                if r.id().is_empty() {
                    r.nonce().to_string()
                } else {
                    r.id().to_string()
                }
            })
            .collect()
    }

    fn variants(list: &MessageList) -> Vec<Variant> {
        list.store().iter().map(MessageRow::variant).collect()
    }

    /// The widget shows exactly the store, and grouping is exact.
    fn assert_coherent(list: &MessageList, widget: &RecordingWidget) {
        assert!(list.store().is_consistent());
        let log = widget.log();
        assert_eq!(log.keys(), ids(list));
        let shown: Vec<Variant> = log.rows.iter().map(|r| r.variant).collect();
        assert_eq!(shown, variants(list));

        let rows: Vec<&MessageRow> = list.store().iter().collect();
        for (i, row) in rows.iter().enumerate() {
            let prev = i.checked_sub(1).map(|p| rows[p].unwrap());
            let collapsible = cozy::is_collapsible(prev, row.unwrap(), chrono::Duration::minutes(3));
            assert_eq!(row.variant() == Variant::Collapsed, collapsible, "row {i}");
        }
    }

    #[test]
    fn test_presend_confirmed_by_echo() {
        let (mut list, widget) = list(50);
        let nonce = Nonce::from("N");
        list.add_presend(presend("N", 0, "hi"));

        let row = list.get_pending(&nonce).unwrap();
        assert_eq!(row.phase(), Some(&PresendPhase::Loading));
        assert!(!widget.log().rows[0].focusable);

        let echo = MessageCreate::new("M1", t(0), Author::new("me", "Me"), "hi").with_nonce("N");
        assert_eq!(list.create_message(echo.clone()), Some(0));

        assert_eq!(list.len(), 1);
        assert!(list.get_pending(&nonce).is_none());
        let row = list.get(&MessageId::from("M1")).unwrap();
        assert_eq!(row.nonce(), &nonce);
        assert_eq!(row.phase(), Some(&PresendPhase::Done));
        let shown = widget.log().rows[0].clone();
        assert!(shown.focusable);
        assert_eq!(shown.tooltip, None);
        assert_coherent(&list, &widget);

        // The same echo again only refreshes the row.
        assert_eq!(list.create_message(echo), Some(0));
        assert_eq!(list.len(), 1);
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_confirm_with_backend_time_repositions() {
        let (mut list, widget) = list(50);
        list.create_message(msg("a", "u", 10));
        list.add_presend(presend("N", 20, "mine"));
        assert_eq!(ids(&list), vec!["a", "N"]);

        let echo = MessageCreate::new("m", t(5), Author::new("me", "Me"), "mine").with_nonce("N");
        assert_eq!(list.create_message(echo), Some(0));
        assert_eq!(ids(&list), vec!["m", "a"]);
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_presend_failure_then_retry() {
        let (mut list, widget) = list(50);
        let nonce = Nonce::from("N");
        list.create_message(msg("a", "u", 1));
        list.add_presend(presend("N", 2, "oops"));
        let before = ids(&list);

        assert_eq!(list.presend_failed(&nonce, "E".into()), Some(1));
        let row = list.get_pending(&nonce).unwrap();
        assert_eq!(row.phase(), Some(&PresendPhase::Error("E".into())));
        assert_eq!(ids(&list), before);
        let shown = widget.log().rows[1].clone();
        assert_eq!(shown.tooltip.as_deref(), Some("E"));
        assert!(shown.errored);
        assert!(shown.focusable);

        let sendable = list.retry_presend(&nonce).unwrap();
        assert_eq!(sendable.content, "oops");
        assert_eq!(list.get_pending(&nonce).unwrap().phase(), Some(&PresendPhase::Loading));
        assert!(!widget.log().rows[1].errored);
        assert!(widget.log().rows[1].tooltip.is_none());
        // Only failed presends can be retried.
        assert!(list.retry_presend(&nonce).is_none());

        assert!(list.discard_presend(&nonce));
        assert_eq!(ids(&list), vec!["a"]);
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_failure_after_confirmation_is_ignored() {
        let (mut list, _widget) = list(50);
        list.add_presend(presend("N", 0, "hi"));
        list.create_message(
            MessageCreate::new("M1", t(0), Author::new("me", "Me"), "hi").with_nonce("N"),
        );

        assert_eq!(list.presend_failed(&Nonce::from("N"), "late".into()), None);
        assert_eq!(
            list.get(&MessageId::from("M1")).unwrap().phase(),
            Some(&PresendPhase::Done)
        );
    }

    #[test]
    fn test_out_of_order_backlog() {
        let (mut list, widget) = list(50);
        list.create_message(msg("m3", "u", 30));
        list.create_message(msg("m4", "u", 40));

        list.set_backlog_in_progress(true);
        list.create_message(msg("m2", "u", 20));
        list.create_message(msg("m1", "u", 10));
        list.set_backlog_in_progress(false);

        assert_eq!(ids(&list), vec!["m1", "m2", "m3", "m4"]);
        assert_eq!(variants(&list)[0], Variant::Full);
        assert_eq!(
            variants(&list),
            vec![Variant::Full, Variant::Collapsed, Variant::Collapsed, Variant::Collapsed]
        );
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_delete_keeps_collapsible_survivor() {
        let (mut list, widget) = list(50);
        list.create_message(msg("A", "u", 10));
        list.create_message(msg("B", "u", 11));
        list.create_message(msg("C", "u", 12));
        assert_eq!(variants(&list), vec![Variant::Full, Variant::Collapsed, Variant::Collapsed]);

        assert_eq!(list.delete_message(&MessageId::from("B")), Some(1));
        assert_eq!(ids(&list), vec!["A", "C"]);
        assert_eq!(variants(&list), vec![Variant::Full, Variant::Collapsed]);
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_delete_head_promotes_survivor() {
        let (mut list, widget) = list(50);
        list.create_message(msg("A", "u", 10));
        list.create_message(msg("B", "u", 11));

        list.delete_message(&MessageId::from("A"));
        assert_eq!(variants(&list), vec![Variant::Full]);
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_author_change_regroups() {
        let (mut list, widget) = list(50);
        list.create_message(msg("A", "U", 10));
        list.create_message(msg("B", "U", 11));
        assert_eq!(variants(&list), vec![Variant::Full, Variant::Collapsed]);

        list.update_message(MessageUpdate {
            id: MessageId::from("B"),
            author: Some(Author::new("V", "V")),
            content: None,
        });
        assert_eq!(variants(&list), vec![Variant::Full, Variant::Full]);
        assert_eq!(widget.log().swaps, 1);
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_update_content_marks_edited() {
        let (mut list, _widget) = list(50);
        list.create_message(msg("A", "U", 10));

        list.update_message(MessageUpdate {
            id: MessageId::from("A"),
            author: None,
            content: Some(RichText::plain("")),
        });
        let row = list.get(&MessageId::from("A")).unwrap();
        assert!(!row.unwrap().edited);
        assert_eq!(row.unwrap().content.content, "text of A");

        list.update_message(MessageUpdate {
            id: MessageId::from("A"),
            author: None,
            content: Some(RichText::plain("fixed")),
        });
        let row = list.get(&MessageId::from("A")).unwrap();
        assert!(row.unwrap().edited);
        assert_eq!(row.render().markup, "fixed");

        // Evicted or unknown messages are a silent no-op.
        assert_eq!(
            list.update_message(MessageUpdate {
                id: MessageId::from("gone"),
                ..Default::default()
            }),
            None
        );
    }

    #[test]
    fn test_eviction_promotes_new_top() {
        let (mut list, widget) = list(3);
        list.create_message(msg("M1", "U", 10));
        list.create_message(msg("M2", "U", 11));
        list.create_message(msg("M3", "U", 12));
        list.create_message(msg("M4", "V", 13));
        assert!(list.scroll().is_bottomed());
        assert_eq!(
            variants(&list),
            vec![Variant::Full, Variant::Collapsed, Variant::Collapsed, Variant::Full]
        );

        assert_eq!(list.create_message(msg("M5", "W", 14)), Some(3));
        assert_eq!(ids(&list), vec!["M2", "M3", "M4", "M5"]);
        assert_eq!(
            variants(&list),
            vec![Variant::Full, Variant::Collapsed, Variant::Full, Variant::Full]
        );
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_no_eviction_unless_bottomed_and_idle() {
        let (mut list, widget) = list(1);
        list.on_scroll(Adjustment {
            value: 0.0,
            upper: 1000.0,
            page_size: 100.0,
        });
        for i in 0..4 {
            list.create_message(msg(&format!("m{i}"), "u", i));
        }
        assert_eq!(list.len(), 4);

        list.set_backlog_in_progress(true);
        list.on_scroll(Adjustment {
            value: 900.0,
            upper: 1000.0,
            page_size: 100.0,
        });
        assert_eq!(list.len(), 4);

        list.set_backlog_in_progress(false);
        assert_eq!(ids(&list), vec!["m2", "m3"]);
        assert_coherent(&list, &widget);
    }

    #[test]
    fn test_inserts_scroll_only_when_bottomed() {
        let (mut list, widget) = list(50);
        list.create_message(msg("a", "u", 1));
        assert_eq!(widget.log().bottom_scrolls, 1);

        list.on_scroll(Adjustment {
            value: 0.0,
            upper: 1000.0,
            page_size: 100.0,
        });
        list.create_message(msg("b", "u", 2));
        assert_eq!(widget.log().bottom_scrolls, 1);
    }

    #[test]
    fn test_selection_toggles() {
        let (mut list, widget) = list(50);
        list.create_message(msg("a", "u", 1));
        list.create_message(msg("b", "v", 2));
        let (a, b) = (MessageId::from("a"), MessageId::from("b"));

        assert_eq!(list.select(&a), SelectionChange::Selected(a.clone()));
        assert_eq!(widget.log().selected, Some(0));
        assert_eq!(list.select(&b), SelectionChange::Selected(b.clone()));
        assert_eq!(widget.log().selected, Some(1));
        assert_eq!(list.select(&b), SelectionChange::Unselected);
        assert_eq!(widget.log().selected, None);
        assert_eq!(list.select(&MessageId::from("zz")), SelectionChange::Unchanged);

        list.select(&a);
        list.delete_message(&a);
        assert_eq!(list.selected(), None);
    }

    #[test]
    fn test_highlight_and_stale_unhighlight() {
        let (mut list, widget) = list(50);
        list.create_message(msg("a", "u", 1));
        list.create_message(msg("b", "u", 2));
        let target = MentionTarget::Message {
            id: MessageId::from("a"),
        };

        let first = list.find_by_reference(&target).unwrap();
        {
            let log = widget.log();
            assert!(log.rows[0].highlighted);
            assert_eq!(log.scrolled_to, Some(0));
            assert_eq!(log.focused, Some(0));
        }

        let second = list.highlight(&MessageId::from("b")).unwrap();
        assert!(!widget.log().rows[0].highlighted);
        assert!(!list.unhighlight(first));
        assert!(widget.log().rows[1].highlighted);

        assert!(list.unhighlight(second));
        assert!(!widget.log().rows[1].highlighted);
        assert!(list
            .find_by_reference(&MentionTarget::Info {
                info: RichText::plain("x")
            })
            .is_none());
    }

    #[test]
    fn test_set_self_marks_mentions() {
        use parlor_shared::SegmentKind;

        let (mut list, _widget) = list(50);
        let content = RichText::plain("@me").with_segment(
            0,
            3,
            SegmentKind::Mention {
                target: MentionTarget::Author {
                    id: AuthorId::from("me"),
                    info: RichText::plain("Me"),
                },
            },
        );
        list.create_message(MessageCreate::new("a", t(1), Author::new("u", "u"), content));
        assert!(!list.get(&MessageId::from("a")).unwrap().mentions_self());

        list.set_self(Author::new("me", "Me"));
        assert!(list.get(&MessageId::from("a")).unwrap().mentions_self());
    }

    #[test]
    fn test_grouping_stays_exact_under_random_edits() {
        let (mut list, widget) = list(1_000);
        let authors = ["u", "v", "w"];
        let mut rng = StdRng::seed_from_u64(0x2545_f491_4f6c_dd1d);
        let mut next = move || rng.gen::<u64>();

        for step in 0..300u64 {
            let roll = next();
            match roll % 5 {
                0 | 1 | 2 => {
                    let author = authors[(next() % 3) as usize];
                    let secs = (next() % 2_000) as i64;
                    list.create_message(msg(&format!("m{step}"), author, secs));
                }
                3 => {
                    if let Some(row) = list.store().nth((next() as usize) % list.len().max(1)) {
                        let id = row.id().clone();
                        list.delete_message(&id);
                    }
                }
                _ => {
                    if let Some(row) = list.store().nth((next() as usize) % list.len().max(1)) {
                        let id = row.id().clone();
                        let author = authors[(next() % 3) as usize];
                        list.update_message(MessageUpdate {
                            id,
                            author: Some(Author::new(author, author)),
                            content: None,
                        });
                    }
                }
            }
            assert_coherent(&list, &widget);
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut list, widget) = list(50);
        list.create_message(msg("a", "u", 1));
        list.add_presend(presend("N", 2, "x"));
        list.select(&MessageId::from("a"));

        list.reset();
        assert!(list.is_empty());
        assert!(widget.log().rows.is_empty());
        assert_eq!(list.selected(), None);
        assert_eq!(list.oldest_id(), None);
    }
}
