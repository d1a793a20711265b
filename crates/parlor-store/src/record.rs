//! The ordering contract between the store and the records it holds.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use parlor_shared::{MessageId, Nonce};

/// Anything the store can index: a message with a time, an id once
/// confirmed, and a nonce while pending.
pub trait Record {
    fn id(&self) -> &MessageId;
    fn nonce(&self) -> &Nonce;
    fn time(&self) -> DateTime<Utc>;

    /// Assign the backend id to a pending record.
    fn bind_id(&mut self, id: MessageId);
}

/// Result of a mutation that may have moved a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moved {
    pub from: usize,
    pub to: usize,
}

impl Moved {
    pub fn in_place(index: usize) -> Self {
        Self {
            from: index,
            to: index,
        }
    }

    pub fn is_move(&self) -> bool {
        self.from != self.to
    }
}

/// Which index answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Id,
    Nonce,
}

/// Total order over records: time, then confirmed after unconfirmed, then
/// id, then nonce for records that have no id yet.
pub fn compare<A: Record + ?Sized, B: Record + ?Sized>(a: &A, b: &B) -> Ordering {
    a.time()
        .cmp(&b.time())
        .then_with(|| (!a.id().is_empty()).cmp(&!b.id().is_empty()))
        .then_with(|| a.id().cmp(b.id()))
        .then_with(|| {
            if a.id().is_empty() {
                a.nonce().cmp(b.nonce())
            } else {
                Ordering::Equal
            }
        })
}
