//! Who is typing, and when to tell the backend that we are.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parlor_shared::constants::TYPING_TIMEOUT_SECS;
use parlor_shared::{AuthorId, Typer};
use tracing::trace;

/// Remote typers, sorted by when they started typing.
#[derive(Debug, Clone)]
pub struct TypingState {
    typers: Vec<Typer>,
    timeout: Duration,
}

impl Default for TypingState {
    fn default() -> Self {
        Self::new(Duration::from_secs(TYPING_TIMEOUT_SECS))
    }
}

impl TypingState {
    pub fn new(timeout: Duration) -> Self {
        Self {
            typers: Vec::new(),
            timeout,
        }
    }

    pub fn typers(&self) -> &[Typer] {
        &self.typers
    }

    pub fn is_empty(&self) -> bool {
        self.typers.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Add or refresh a typer. Returns whether anything changed.
    pub fn add(&mut self, typer: Typer) -> bool {
        match self
            .typers
            .iter_mut()
            .find(|t| t.author.id == typer.author.id)
        {
            Some(existing) if *existing == typer => return false,
            Some(existing) => *existing = typer,
            None => self.typers.push(typer),
        }
        self.typers.sort_by_key(|t| t.started_at);
        true
    }

    pub fn remove(&mut self, author: &AuthorId) -> bool {
        let before = self.typers.len();
        self.typers.retain(|t| &t.author.id != author);
        self.typers.len() != before
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.typers.is_empty();
        self.typers.clear();
        changed
    }

    /// Drop typers whose announcement is `timeout` old or older.
    pub fn prune(&mut self, now: DateTime<Utc>) -> bool {
        let timeout = chrono::Duration::from_std(self.timeout)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let before = self.typers.len();
        self.typers.retain(|t| now - t.started_at < timeout);

        let pruned = before - self.typers.len();
        if pruned > 0 {
            trace!(pruned, "Expired typers");
        }
        pruned > 0
    }

    /// "A is typing.", "A and B are typing.", "A, B, and C are typing."
    pub fn label(&self) -> String {
        let names: Vec<&str> = self
            .typers
            .iter()
            .map(|t| t.author.name.content.as_str())
            .collect();

        match names.as_slice() {
            [] => String::new(),
            [one] => format!("{one} is typing."),
            [a, b] => format!("{a} and {b} are typing."),
            [rest @ .., last] => format!("{}, and {last} are typing.", rest.join(", ")),
        }
    }
}

/// Rate limit for our own "I am typing" announcements: one per timeout.
#[derive(Debug, Clone, Default)]
pub struct TypingNotifier {
    last: Option<Instant>,
}

impl TypingNotifier {
    pub fn should_notify(&mut self, now: Instant, timeout: Duration) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < timeout {
                return false;
            }
        }
        self.last = Some(now);
        true
    }

    /// Sending a message ends the typing state on most backends.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parlor_shared::Author;

    fn typer(id: &str, secs: i64) -> Typer {
        Typer {
            author: Author::new(id, id.to_uppercase()),
            started_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_add_sorts_and_dedupes() {
        let mut state = TypingState::new(Duration::from_secs(10));
        assert!(state.add(typer("b", 5)));
        assert!(state.add(typer("a", 3)));
        assert!(!state.add(typer("a", 3)));
        assert!(state.add(typer("b", 1)));

        let ids: Vec<&str> = state.typers().iter().map(|t| t.author.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_prune_drops_expired() {
        let mut state = TypingState::new(Duration::from_secs(10));
        state.add(typer("a", 0));
        state.add(typer("b", 5));

        assert!(!state.prune(at(9)));
        assert!(state.prune(at(10)));
        assert_eq!(state.typers().len(), 1);
        assert!(state
            .typers()
            .iter()
            .all(|t| at(10) - t.started_at < chrono::Duration::seconds(10)));

        assert!(state.prune(at(15)));
        assert!(state.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut state = TypingState::default();
        state.add(typer("a", 0));
        assert!(state.remove(&AuthorId::from("a")));
        assert!(!state.remove(&AuthorId::from("a")));
    }

    #[test]
    fn test_label_grammar() {
        let mut state = TypingState::default();
        assert_eq!(state.label(), "");

        state.add(typer("a", 1));
        assert_eq!(state.label(), "A is typing.");

        state.add(typer("b", 2));
        assert_eq!(state.label(), "A and B are typing.");

        state.add(typer("c", 3));
        assert_eq!(state.label(), "A, B, and C are typing.");

        state.add(typer("d", 4));
        assert_eq!(state.label(), "A, B, C, and D are typing.");
    }

    #[test]
    fn test_notifier_once_per_window() {
        let mut notifier = TypingNotifier::default();
        let t0 = Instant::now();
        let timeout = Duration::from_secs(8);

        assert!(notifier.should_notify(t0, timeout));
        assert!(!notifier.should_notify(t0 + Duration::from_secs(7), timeout));
        assert!(notifier.should_notify(t0 + Duration::from_secs(8), timeout));

        notifier.reset();
        assert!(notifier.should_notify(t0 + Duration::from_secs(9), timeout));
    }
}
