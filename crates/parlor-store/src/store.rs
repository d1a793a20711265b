//! Time-ordered message index with dual identity keys.
//!
//! Records live in a handle-addressed map. The order is a `VecDeque` of
//! handles sorted by [`compare`], so positional queries are binary searches
//! and appends or evictions at either end are amortized O(1). Inserting or
//! moving a record in the middle shifts `min(i, len - i)` handles; live
//! messages land at the end and backlog pages at the front, so that path is
//! rare and bounded by the backlog limit. Two hash maps give O(1) access by
//! id (confirmed records) and by nonce (pending records). A record is indexed
//! by exactly one of the two maps at any time.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parlor_shared::{MessageId, Nonce};
use tracing::{debug, error, trace};

use crate::error::{Result, StoreError};
use crate::record::{compare, Hit, Moved, Record};

type Handle = u64;

/// Ordered set of records keyed by `(time, id | nonce)`.
#[derive(Debug)]
pub struct MessageStore<R> {
    order: VecDeque<Handle>,
    records: HashMap<Handle, R>,
    by_id: HashMap<MessageId, Handle>,
    by_nonce: HashMap<Nonce, Handle>,
    next_handle: Handle,
}

impl<R: Record> MessageStore<R> {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
            records: HashMap::new(),
            by_id: HashMap::new(),
            by_nonce: HashMap::new(),
            next_handle: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Find a record by id first, then by nonce.
    pub fn lookup(&self, id: &MessageId, nonce: &Nonce) -> Option<&R> {
        self.lookup_handle(id, nonce)
            .and_then(|(_, handle)| self.records.get(&handle))
    }

    /// Like [`lookup`](Self::lookup) but reports which key matched and the
    /// record's position.
    pub fn lookup_hit(&self, id: &MessageId, nonce: &Nonce) -> Option<(Hit, usize)> {
        let (hit, handle) = self.lookup_handle(id, nonce)?;
        self.index_of_handle(handle).map(|index| (hit, index))
    }

    pub fn get(&self, id: &MessageId) -> Option<&R> {
        self.by_id.get(id).and_then(|h| self.records.get(h))
    }

    pub fn get_pending(&self, nonce: &Nonce) -> Option<&R> {
        self.by_nonce.get(nonce).and_then(|h| self.records.get(h))
    }

    pub fn index_of_id(&self, id: &MessageId) -> Option<usize> {
        let handle = *self.by_id.get(id)?;
        self.index_of_handle(handle)
    }

    pub fn index_of_nonce(&self, nonce: &Nonce) -> Option<usize> {
        let handle = *self.by_nonce.get(nonce)?;
        self.index_of_handle(handle)
    }

    // -----------------------------------------------------------------------
    // Positional queries
    // -----------------------------------------------------------------------

    pub fn nth(&self, n: usize) -> Option<&R> {
        self.order.get(n).and_then(|h| self.records.get(h))
    }

    pub fn first(&self) -> Option<&R> {
        self.nth(0)
    }

    pub fn last(&self) -> Option<&R> {
        self.len().checked_sub(1).and_then(|n| self.nth(n))
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &R> + '_ {
        self.order.iter().filter_map(|h| self.records.get(h))
    }

    /// Neighbors of the record with `id` in time order.
    pub fn around(&self, id: &MessageId) -> (Option<&R>, Option<&R>) {
        match self.index_of_id(id) {
            Some(index) => (
                index.checked_sub(1).and_then(|i| self.nth(i)),
                self.nth(index + 1),
            ),
            None => (None, None),
        }
    }

    /// Where a record with `time` would go, after every record at or before
    /// that time, together with the record that would precede it.
    pub fn insert_position(&self, time: DateTime<Utc>) -> (Option<&R>, usize) {
        let index = self.order.partition_point(|h| {
            self.records
                .get(h)
                .map_or(true, |record| record.time() <= time)
        });
        let before = index.checked_sub(1).and_then(|i| self.nth(i));
        (before, index)
    }

    /// Exact position `record` would take if inserted now.
    pub fn position_for(&self, record: &R) -> usize {
        self.insertion_point(record)
    }

    /// Search from the newest record towards the oldest.
    pub fn find_backwards<P>(&self, mut pred: P) -> Option<(&R, usize)>
    where
        P: FnMut(&R) -> bool,
    {
        self.order
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(i, h)| self.records.get(h).map(|r| (r, i)))
            .find(|(r, _)| pred(*r))
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Insert a new record and return its position.
    pub fn insert(&mut self, record: R) -> Result<usize> {
        if record.id().is_empty() {
            if record.nonce().is_empty() {
                return Err(StoreError::MissingKey);
            }
            if self.by_nonce.contains_key(record.nonce()) {
                return Err(StoreError::DuplicateNonce(record.nonce().clone()));
            }
        } else if self.by_id.contains_key(record.id()) {
            return Err(StoreError::DuplicateKey(record.id().clone()));
        }

        let index = self.insertion_point(&record);
        let handle = self.next_handle;
        self.next_handle += 1;

        if record.id().is_empty() {
            self.by_nonce.insert(record.nonce().clone(), handle);
        } else {
            self.by_id.insert(record.id().clone(), handle);
        }

        trace!(id = %record.id(), nonce = %record.nonce(), index, "Inserted record");
        self.order.insert(index, handle);
        self.records.insert(handle, record);
        Ok(index)
    }

    /// Promote the pending record indexed by `nonce` to `id`, then apply
    /// `patch`. The nonce stays on the record but no longer indexes it.
    ///
    /// Returns `Ok(None)` when no pending record has this nonce, which makes
    /// a repeated confirmation a no-op.
    pub fn confirm_nonce<F>(&mut self, nonce: &Nonce, id: MessageId, patch: F) -> Result<Option<Moved>>
    where
        F: FnOnce(&mut R),
    {
        let Some(&handle) = self.by_nonce.get(nonce) else {
            return Ok(None);
        };
        if id.is_empty() {
            return Err(StoreError::MissingKey);
        }
        if self.by_id.contains_key(&id) {
            return Err(StoreError::DuplicateKey(id));
        }

        self.by_nonce.remove(nonce);
        self.by_id.insert(id.clone(), handle);
        debug!(%nonce, %id, "Confirmed pending record");

        Ok(self.modify(handle, move |record| {
            record.bind_id(id);
            patch(record);
        }))
    }

    /// Apply `patch` to the confirmed record with `id`. The patch must not
    /// change the id; a changed time repositions the record.
    pub fn update<F>(&mut self, id: &MessageId, patch: F) -> Option<Moved>
    where
        F: FnOnce(&mut R),
    {
        let handle = *self.by_id.get(id)?;
        let moved = self.modify(handle, patch);
        debug_assert!(self.records.get(&handle).map_or(true, |r| r.id() == id));
        moved
    }

    /// Apply `patch` to the pending record with `nonce`.
    pub fn update_pending<F>(&mut self, nonce: &Nonce, patch: F) -> Option<Moved>
    where
        F: FnOnce(&mut R),
    {
        let handle = *self.by_nonce.get(nonce)?;
        let moved = self.modify(handle, patch);
        debug_assert!(self
            .records
            .get(&handle)
            .map_or(true, |r| r.id().is_empty() && r.nonce() == nonce));
        moved
    }

    /// Apply `patch` to the record at position `n`. The patch must not
    /// change the id or nonce.
    pub fn update_nth<F>(&mut self, n: usize, patch: F) -> Option<Moved>
    where
        F: FnOnce(&mut R),
    {
        let handle = *self.order.get(n)?;
        self.modify(handle, patch)
    }

    /// Replace the record at position `n` with the result of `swap`, keeping
    /// its indices. Used to turn a row into another variant in place.
    pub fn replace_nth<F>(&mut self, n: usize, swap: F) -> Result<()>
    where
        F: FnOnce(R) -> R,
    {
        let handle = *self.order.get(n).ok_or(StoreError::NoSuchRecord(n))?;
        let old = self
            .records
            .remove(&handle)
            .ok_or(StoreError::NoSuchRecord(n))?;

        let (id, nonce) = (old.id().clone(), old.nonce().clone());
        let new = swap(old);
        if new.id() != &id || new.nonce() != &nonce {
            error!(%id, %nonce, "Replacement record changed its identity");
            debug_assert!(false, "replace_nth must preserve id and nonce");
        }
        self.records.insert(handle, new);
        Ok(())
    }

    /// Remove the confirmed record with `id`, returning its former position.
    pub fn delete(&mut self, id: &MessageId) -> Option<(usize, R)> {
        let handle = *self.by_id.get(id)?;
        self.remove_handle(handle)
    }

    /// Remove the pending record with `nonce`.
    pub fn delete_pending(&mut self, nonce: &Nonce) -> Option<(usize, R)> {
        let handle = *self.by_nonce.get(nonce)?;
        self.remove_handle(handle)
    }

    /// Remove the `n` oldest records, oldest first.
    pub fn evict_earliest(&mut self, n: usize) -> Vec<R> {
        let count = n.min(self.order.len());
        let handles: Vec<Handle> = self.order.drain(..count).collect();

        let mut evicted = Vec::with_capacity(count);
        for handle in handles {
            if let Some(record) = self.records.remove(&handle) {
                self.unindex(handle, &record);
                evicted.push(record);
            }
        }

        if !evicted.is_empty() {
            debug!(count = evicted.len(), remaining = self.len(), "Evicted earliest records");
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.records.clear();
        self.by_id.clear();
        self.by_nonce.clear();
    }

    /// Check the structural invariants: the order is strictly sorted, every
    /// record is reachable from the order and from exactly one key map.
    pub fn is_consistent(&self) -> bool {
        if self.order.len() != self.records.len()
            || self.by_id.len() + self.by_nonce.len() != self.records.len()
        {
            return false;
        }

        let mut previous: Option<&R> = None;
        for handle in &self.order {
            let Some(record) = self.records.get(handle) else {
                return false;
            };
            if let Some(prev) = previous {
                if compare(prev, record) != Ordering::Less {
                    return false;
                }
            }

            let indexed = if record.id().is_empty() {
                self.by_nonce.get(record.nonce()) == Some(handle)
            } else {
                self.by_id.get(record.id()) == Some(handle)
                    && self.by_nonce.get(record.nonce()) != Some(handle)
            };
            if !indexed {
                return false;
            }
            previous = Some(record);
        }
        true
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lookup_handle(&self, id: &MessageId, nonce: &Nonce) -> Option<(Hit, Handle)> {
        if !id.is_empty() {
            if let Some(&handle) = self.by_id.get(id) {
                return Some((Hit::Id, handle));
            }
        }
        if nonce.is_empty() {
            return None;
        }
        self.by_nonce.get(nonce).map(|&handle| (Hit::Nonce, handle))
    }

    fn insertion_point(&self, record: &R) -> usize {
        self.order.partition_point(|h| {
            self.records
                .get(h)
                .map_or(true, |existing| compare(existing, record) == Ordering::Less)
        })
    }

    fn index_of_handle(&self, handle: Handle) -> Option<usize> {
        let record = self.records.get(&handle)?;
        let found = self.order.binary_search_by(|h| match self.records.get(h) {
            Some(existing) => compare(existing, record),
            None => Ordering::Less,
        });
        match found {
            Ok(index) if self.order[index] == handle => Some(index),
            _ => self.order.iter().position(|h| *h == handle),
        }
    }

    /// Take the record out of the order, patch it, and put it back where its
    /// (possibly new) key belongs.
    fn modify<F>(&mut self, handle: Handle, patch: F) -> Option<Moved>
    where
        F: FnOnce(&mut R),
    {
        let from = self.index_of_handle(handle)?;
        self.order.remove(from);

        if let Some(record) = self.records.get_mut(&handle) {
            patch(record);
        }

        let to = match self.records.get(&handle) {
            Some(record) => self.insertion_point(record),
            None => from,
        };
        self.order.insert(to, handle);

        if from != to {
            trace!(from, to, "Record moved");
        }
        Some(Moved { from, to })
    }

    fn remove_handle(&mut self, handle: Handle) -> Option<(usize, R)> {
        let index = self.index_of_handle(handle)?;
        self.order.remove(index);
        let record = self.records.remove(&handle)?;
        self.unindex(handle, &record);
        Some((index, record))
    }

    fn unindex(&mut self, handle: Handle, record: &R) {
        if self.by_id.get(record.id()) == Some(&handle) {
            self.by_id.remove(record.id());
        }
        if self.by_nonce.get(record.nonce()) == Some(&handle) {
            self.by_nonce.remove(record.nonce());
        }
    }
}

impl<R: Record> Default for MessageStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[derive(Debug, Clone, PartialEq)]
    struct Msg {
        id: MessageId,
        nonce: Nonce,
        time: DateTime<Utc>,
        text: String,
    }

    impl Record for Msg {
        fn id(&self) -> &MessageId {
            &self.id
        }
        fn nonce(&self) -> &Nonce {
            &self.nonce
        }
        fn time(&self) -> DateTime<Utc> {
            self.time
        }
        fn bind_id(&mut self, id: MessageId) {
            self.id = id;
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn confirmed(id: &str, secs: i64) -> Msg {
        Msg {
            id: MessageId::from(id),
            nonce: Nonce::empty(),
            time: t(secs),
            text: id.to_string(),
        }
    }

    fn pending(nonce: &str, secs: i64) -> Msg {
        Msg {
            id: MessageId::empty(),
            nonce: Nonce::from(nonce),
            time: t(secs),
            text: nonce.to_string(),
        }
    }

    fn ids(store: &MessageStore<Msg>) -> Vec<String> {
        store.iter().map(|m| m.text.clone()).collect()
    }

    #[test]
    fn test_insert_keeps_time_order() {
        let mut store = MessageStore::new();
        assert_eq!(store.insert(confirmed("m3", 30)).unwrap(), 0);
        assert_eq!(store.insert(confirmed("m4", 40)).unwrap(), 1);
        assert_eq!(store.insert(confirmed("m2", 20)).unwrap(), 0);
        assert_eq!(store.insert(confirmed("m1", 10)).unwrap(), 0);
        assert_eq!(ids(&store), ["m1", "m2", "m3", "m4"]);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_equal_times_order_by_id_with_pending_first() {
        let mut store = MessageStore::new();
        store.insert(confirmed("b", 5)).unwrap();
        store.insert(confirmed("a", 5)).unwrap();
        store.insert(pending("n1", 5)).unwrap();
        assert_eq!(ids(&store), ["n1", "a", "b"]);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_insert_rejects_duplicates_and_keyless() {
        let mut store = MessageStore::new();
        store.insert(confirmed("m1", 1)).unwrap();
        store.insert(pending("n1", 2)).unwrap();

        assert_eq!(
            store.insert(confirmed("m1", 9)),
            Err(StoreError::DuplicateKey(MessageId::from("m1")))
        );
        assert_eq!(
            store.insert(pending("n1", 9)),
            Err(StoreError::DuplicateNonce(Nonce::from("n1")))
        );
        assert_eq!(store.insert(pending("", 9)), Err(StoreError::MissingKey));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_lookup_prefers_id_then_nonce() {
        let mut store = MessageStore::new();
        store.insert(confirmed("m1", 1)).unwrap();
        store.insert(pending("n1", 2)).unwrap();

        let hit = store.lookup_hit(&MessageId::from("m1"), &Nonce::from("n1"));
        assert_eq!(hit, Some((Hit::Id, 0)));

        let hit = store.lookup_hit(&MessageId::from("unknown"), &Nonce::from("n1"));
        assert_eq!(hit, Some((Hit::Nonce, 1)));

        assert!(store.lookup(&MessageId::from("x"), &Nonce::empty()).is_none());
    }

    #[test]
    fn test_confirm_nonce_moves_between_indices() {
        let mut store = MessageStore::new();
        store.insert(pending("n1", 10)).unwrap();

        let moved = store
            .confirm_nonce(&Nonce::from("n1"), MessageId::from("m1"), |m| {
                m.text = "hi".into();
            })
            .unwrap();
        assert_eq!(moved, Some(Moved::in_place(0)));

        let record = store.get(&MessageId::from("m1")).unwrap();
        assert_eq!(record.text, "hi");
        assert_eq!(record.nonce, Nonce::from("n1"));
        assert!(store.get_pending(&Nonce::from("n1")).is_none());
        assert!(store.is_consistent());
    }

    #[test]
    fn test_confirm_nonce_is_idempotent() {
        let mut store = MessageStore::new();
        store.insert(confirmed("m0", 1)).unwrap();
        store.insert(pending("n1", 10)).unwrap();

        store
            .confirm_nonce(&Nonce::from("n1"), MessageId::from("m1"), |_| {})
            .unwrap();
        let snapshot: Vec<Msg> = store.iter().cloned().collect();

        let again = store
            .confirm_nonce(&Nonce::from("n1"), MessageId::from("m1"), |m| {
                m.text = "changed".into();
            })
            .unwrap();
        assert_eq!(again, None);
        assert_eq!(store.iter().cloned().collect::<Vec<_>>(), snapshot);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_confirm_nonce_repositions_on_time_change() {
        let mut store = MessageStore::new();
        store.insert(confirmed("a", 10)).unwrap();
        store.insert(confirmed("b", 20)).unwrap();
        store.insert(pending("n1", 30)).unwrap();

        let moved = store
            .confirm_nonce(&Nonce::from("n1"), MessageId::from("c"), |m| {
                m.time = t(15);
            })
            .unwrap();
        assert_eq!(moved, Some(Moved { from: 2, to: 1 }));
        assert_eq!(ids(&store), ["a", "n1", "b"]);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_confirm_nonce_rejects_taken_id() {
        let mut store = MessageStore::new();
        store.insert(confirmed("m1", 1)).unwrap();
        store.insert(pending("n1", 2)).unwrap();

        let result = store.confirm_nonce(&Nonce::from("n1"), MessageId::from("m1"), |_| {});
        assert_eq!(result, Err(StoreError::DuplicateKey(MessageId::from("m1"))));
        assert!(store.get_pending(&Nonce::from("n1")).is_some());
        assert!(store.is_consistent());
    }

    #[test]
    fn test_update_missing_is_noop() {
        let mut store: MessageStore<Msg> = MessageStore::new();
        assert!(store.update(&MessageId::from("ghost"), |_| {}).is_none());
    }

    #[test]
    fn test_delete_and_around() {
        let mut store = MessageStore::new();
        for (id, secs) in [("a", 1), ("b", 2), ("c", 3)] {
            store.insert(confirmed(id, secs)).unwrap();
        }

        let (before, after) = store.around(&MessageId::from("b"));
        assert_eq!(before.map(|m| m.text.as_str()), Some("a"));
        assert_eq!(after.map(|m| m.text.as_str()), Some("c"));

        let (index, removed) = store.delete(&MessageId::from("b")).unwrap();
        assert_eq!((index, removed.text.as_str()), (1, "b"));
        assert!(store.delete(&MessageId::from("b")).is_none());

        let (before, after) = store.around(&MessageId::from("a"));
        assert!(before.is_none());
        assert_eq!(after.map(|m| m.text.as_str()), Some("c"));
        assert!(store.is_consistent());
    }

    #[test]
    fn test_insert_position_for_backlog() {
        let mut store = MessageStore::new();
        store.insert(confirmed("m3", 30)).unwrap();
        store.insert(confirmed("m4", 40)).unwrap();

        let (before, index) = store.insert_position(t(10));
        assert!(before.is_none());
        assert_eq!(index, 0);

        let (before, index) = store.insert_position(t(35));
        assert_eq!(before.map(|m| m.text.as_str()), Some("m3"));
        assert_eq!(index, 1);
    }

    #[test]
    fn test_find_backwards() {
        let mut store = MessageStore::new();
        for (id, secs) in [("a", 1), ("b", 2), ("c", 3)] {
            store.insert(confirmed(id, secs)).unwrap();
        }
        let (found, index) = store.find_backwards(|m| m.text != "c").unwrap();
        assert_eq!((found.text.as_str(), index), ("b", 1));
        assert!(store.find_backwards(|m| m.text == "z").is_none());
    }

    #[test]
    fn test_evict_earliest() {
        let mut store = MessageStore::new();
        for i in 0..5 {
            store.insert(confirmed(&format!("m{i}"), i)).unwrap();
        }
        store.insert(pending("n", 9)).unwrap();

        let evicted = store.evict_earliest(2);
        assert_eq!(evicted.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(), ["m0", "m1"]);
        assert_eq!(store.len(), 4);
        assert!(store.get(&MessageId::from("m0")).is_none());
        assert!(store.is_consistent());

        let evicted = store.evict_earliest(100);
        assert_eq!(evicted.len(), 4);
        assert!(store.is_empty());
        assert!(store.is_consistent());
    }

    #[test]
    fn test_replace_nth_keeps_indices() {
        let mut store = MessageStore::new();
        store.insert(confirmed("a", 1)).unwrap();
        store
            .replace_nth(0, |mut m| {
                m.text = "swapped".into();
                m
            })
            .unwrap();
        assert_eq!(store.get(&MessageId::from("a")).unwrap().text, "swapped");
        assert_eq!(
            store.replace_nth(3, |m| m),
            Err(StoreError::NoSuchRecord(3))
        );
        assert!(store.is_consistent());
    }

    #[test]
    fn test_mixed_operations_stay_consistent() {
        let mut store = MessageStore::new();
        // A seeded random walk over every mutating operation.
        let mut rng = StdRng::seed_from_u64(0x2545_f491_4f6c_dd1d);
        let mut next = move || rng.gen::<u64>();

        for step in 0..500u64 {
            let roll = next();
            let secs = (roll % 50) as i64;
            match roll % 5 {
                0 | 1 => {
                    let _ = store.insert(confirmed(&format!("m{}", roll % 97), secs));
                }
                2 => {
                    let _ = store.insert(pending(&format!("n{step}"), secs));
                }
                3 => {
                    let nonce = Nonce::from(format!("n{}", roll % (step + 1)));
                    let id = MessageId::from(format!("c{step}"));
                    let _ = store.confirm_nonce(&nonce, id, |m| m.time = t(secs));
                }
                _ => {
                    if roll % 2 == 0 {
                        store.evict_earliest((roll % 4) as usize);
                    } else {
                        store.delete(&MessageId::from(format!("m{}", roll % 97)));
                    }
                }
            }
            assert!(store.is_consistent(), "inconsistent after step {step}");
        }

        let times: Vec<_> = store.iter().map(|m| m.time).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }
}
