//! Gate for backlog (history) requests.
//!
//! At most one request is in flight, and two requests are never issued less
//! than `interval` apart. A request advances the gate when it starts, so a
//! failed request still counts.

use std::time::{Duration, Instant};

use tracing::trace;

#[derive(Debug, Clone)]
pub struct BacklogGate {
    interval: Duration,
    last: Option<Instant>,
    in_flight: bool,
}

impl BacklogGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
            in_flight: false,
        }
    }

    /// Claim the gate for a request issued at `now`.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if self.in_flight {
            trace!("Backlog already in flight");
            return false;
        }
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.interval {
                trace!("Backlog gated by interval");
                return false;
            }
        }
        self.last = Some(now);
        self.in_flight = true;
        true
    }

    /// The request's reply (success or error) has been applied.
    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Forget history, e.g. after switching channels.
    pub fn reset(&mut self) {
        self.last = None;
        self.in_flight = false;
    }
}
