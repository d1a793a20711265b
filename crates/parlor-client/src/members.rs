//! Member list state and the queue that shields it while a popover is open.
//!
//! Mutating the member list tears down any popover anchored in it. While a
//! popover is open the [`EventQueue`] is active and member events pile up;
//! once it closes they are drained a chunk at a time so a burst does not
//! freeze the UI thread.

use std::collections::VecDeque;

use parlor_shared::{AuthorId, Member, MemberSection, MemberSectionId};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberEvent {
    SetSections(Vec<MemberSection>),
    SetMember {
        section: MemberSectionId,
        member: Member,
    },
    RemoveMember {
        section: MemberSectionId,
        member: AuthorId,
    },
}

// ---------------------------------------------------------------------------
// Member list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEntry {
    pub section: MemberSection,
    /// Sorted by name content.
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Default)]
pub struct MemberList {
    sections: Vec<SectionEntry>,
}

impl MemberList {
    pub fn sections(&self) -> &[SectionEntry] {
        &self.sections
    }

    pub fn section(&self, id: &MemberSectionId) -> Option<&SectionEntry> {
        self.sections.iter().find(|s| &s.section.id == id)
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn apply(&mut self, event: MemberEvent) {
        match event {
            MemberEvent::SetSections(sections) => self.set_sections(sections),
            MemberEvent::SetMember { section, member } => self.set_member(&section, member),
            MemberEvent::RemoveMember { section, member } => self.remove_member(&section, &member),
        }
    }

    /// Replace the section layout. Members of sections that survive are kept.
    fn set_sections(&mut self, sections: Vec<MemberSection>) {
        let mut old = std::mem::take(&mut self.sections);
        self.sections = sections
            .into_iter()
            .map(|section| {
                let members = old
                    .iter_mut()
                    .find(|e| e.section.id == section.id)
                    .map(|e| std::mem::take(&mut e.members))
                    .unwrap_or_default();
                SectionEntry { section, members }
            })
            .collect();
        debug!(sections = self.sections.len(), "Member sections set");
    }

    fn set_member(&mut self, section: &MemberSectionId, member: Member) {
        let Some(entry) = self.sections.iter_mut().find(|e| &e.section.id == section) else {
            trace!(%section, member = %member.id, "Member for unknown section");
            return;
        };

        entry.members.retain(|m| m.id != member.id);
        let at = entry
            .members
            .partition_point(|m| m.name.content <= member.name.content);
        entry.members.insert(at, member);
    }

    fn remove_member(&mut self, section: &MemberSectionId, member: &AuthorId) {
        if let Some(entry) = self.sections.iter_mut().find(|e| &e.section.id == section) {
            entry.members.retain(|m| &m.id != member);
        }
    }
}

// ---------------------------------------------------------------------------
// Event queue
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EventQueue<E> {
    active: bool,
    draining: bool,
    pending: VecDeque<E>,
    chunk: usize,
}

impl<E> EventQueue<E> {
    pub fn new(chunk: usize) -> Self {
        Self {
            active: false,
            draining: false,
            pending: VecDeque::new(),
            chunk: chunk.max(1),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Hand `event` back for immediate application, or keep it for later.
    /// Events queue while active and while earlier events still wait, so
    /// order is preserved.
    pub fn push(&mut self, event: E) -> Option<E> {
        if self.active || !self.pending.is_empty() {
            self.pending.push_back(event);
            return None;
        }
        Some(event)
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Return to the inactive state. Returns `true` when the caller should
    /// schedule a drain.
    pub fn deactivate(&mut self) -> bool {
        self.active = false;
        if self.pending.is_empty() || self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    /// Take the next chunk to apply. The flag is `true` when another drain
    /// should be scheduled. Re-activation stops the drain.
    pub fn drain_chunk(&mut self) -> (Vec<E>, bool) {
        if self.active {
            self.draining = false;
            return (Vec::new(), false);
        }
        let take = self.chunk.min(self.pending.len());
        let chunk: Vec<E> = self.pending.drain(..take).collect();
        let more = !self.pending.is_empty();
        self.draining = more;
        (chunk, more)
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.draining = false;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_shared::{MemberStatus, RichText};

    fn member(id: &str, name: &str) -> Member {
        Member {
            id: AuthorId::from(id),
            name: RichText::plain(name),
            status: MemberStatus::Online,
            secondary: RichText::default(),
        }
    }

    fn section(id: &str) -> MemberSection {
        MemberSection {
            id: MemberSectionId::from(id),
            name: RichText::plain(id),
            total: 0,
        }
    }

    #[test]
    fn test_members_sorted_by_name() {
        let mut list = MemberList::default();
        list.apply(MemberEvent::SetSections(vec![section("online")]));
        for (id, name) in [("3", "carol"), ("1", "alice"), ("2", "Bob")] {
            list.apply(MemberEvent::SetMember {
                section: MemberSectionId::from("online"),
                member: member(id, name),
            });
        }

        let names: Vec<&str> = list.sections()[0]
            .members
            .iter()
            .map(|m| m.name.content.as_str())
            .collect();
        // Case-sensitive: uppercase sorts first.
        assert_eq!(names, vec!["Bob", "alice", "carol"]);
    }

    #[test]
    fn test_set_member_replaces_and_resorts() {
        let mut list = MemberList::default();
        let online = MemberSectionId::from("online");
        list.apply(MemberEvent::SetSections(vec![section("online")]));
        list.apply(MemberEvent::SetMember { section: online.clone(), member: member("1", "a") });
        list.apply(MemberEvent::SetMember { section: online.clone(), member: member("2", "b") });
        list.apply(MemberEvent::SetMember { section: online.clone(), member: member("1", "z") });

        let section = list.section(&online).unwrap();
        assert_eq!(section.members.len(), 2);
        assert_eq!(section.members[1].name.content, "z");

        list.apply(MemberEvent::RemoveMember { section: online.clone(), member: AuthorId::from("2") });
        assert_eq!(list.section(&online).unwrap().members.len(), 1);
    }

    #[test]
    fn test_set_sections_keeps_surviving_members() {
        let mut list = MemberList::default();
        list.apply(MemberEvent::SetSections(vec![section("a"), section("b")]));
        list.apply(MemberEvent::SetMember { section: "a".into(), member: member("1", "x") });
        list.apply(MemberEvent::SetMember { section: "b".into(), member: member("2", "y") });

        list.apply(MemberEvent::SetSections(vec![section("b"), section("c")]));
        let ids: Vec<&str> = list.sections().iter().map(|s| s.section.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(list.sections()[0].members.len(), 1);
        assert!(list.sections()[1].members.is_empty());
    }

    #[test]
    fn test_queue_passes_through_when_inactive() {
        let mut queue = EventQueue::new(25);
        assert_eq!(queue.push(1), Some(1));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_queue_drains_in_chunks_after_deactivate() {
        let mut queue = EventQueue::new(25);
        queue.activate();
        for i in 0..60 {
            assert_eq!(queue.push(i), None);
        }

        assert!(queue.deactivate());
        assert!(!queue.is_active());
        // Still draining, so new events keep their place in line.
        assert_eq!(queue.push(60), None);
        assert!(!queue.deactivate());

        let (first, more) = queue.drain_chunk();
        assert_eq!(first, (0..25).collect::<Vec<_>>());
        assert!(more);

        let (second, more) = queue.drain_chunk();
        assert_eq!(second.len(), 25);
        assert!(more);

        let (last, more) = queue.drain_chunk();
        assert_eq!(last, (50..=60).collect::<Vec<_>>());
        assert!(!more);
        assert_eq!(queue.push(61), Some(61));
    }

    #[test]
    fn test_reactivation_pauses_drain() {
        let mut queue = EventQueue::new(2);
        queue.activate();
        for i in 0..5 {
            queue.push(i);
        }
        assert!(queue.deactivate());
        let (chunk, _) = queue.drain_chunk();
        assert_eq!(chunk, vec![0, 1]);

        queue.activate();
        let (chunk, more) = queue.drain_chunk();
        assert!(chunk.is_empty());
        assert!(!more);

        assert!(queue.deactivate());
        let (chunk, _) = queue.drain_chunk();
        assert_eq!(chunk, vec![2, 3]);
    }
}
