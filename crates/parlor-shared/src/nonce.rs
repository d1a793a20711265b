use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::types::{AuthorId, Nonce};

/// Number of hash bytes kept in a nonce (128 bits).
const NONCE_BYTES: usize = 16;

/// Generates nonces for locally sent messages.
///
/// Each nonce is the first 128 bits of a BLAKE3 hash over
/// `"{user}|{unix nanos}|{counter}"`, hex encoded. The counter makes two
/// nonces generated within the same clock tick distinct.
#[derive(Debug)]
pub struct NonceGenerator {
    user: AuthorId,
    counter: AtomicU64,
}

impl NonceGenerator {
    pub fn new(user: AuthorId) -> Self {
        Self {
            user,
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> Nonce {
        self.next_at(Utc::now())
    }

    pub fn next_at(&self, now: DateTime<Utc>) -> Nonce {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1_000));

        let input = format!("{}|{}|{}", self.user, nanos, count);
        let hash = blake3::hash(input.as_bytes());
        Nonce(hex::encode(&hash.as_bytes()[..NONCE_BYTES]))
    }
}
