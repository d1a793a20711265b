//! Cozy grouping: consecutive messages from one author within a short window
//! are shown as continuations of the first.

use chrono::Duration;

use crate::row::{MessageState, Variant};

/// Whether `msg` continues `prev`: same author and less than `window` apart.
pub fn is_collapsible(prev: Option<&MessageState>, msg: &MessageState, window: Duration) -> bool {
    let Some(prev) = prev else {
        return false;
    };
    prev.author.id == msg.author.id && msg.time - prev.time < window
}

pub fn variant_for(prev: Option<&MessageState>, msg: &MessageState, window: Duration) -> Variant {
    if is_collapsible(prev, msg, window) {
        Variant::Collapsed
    } else {
        Variant::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parlor_shared::{Author, MessageCreate};

    fn msg(author: &str, secs: i64) -> MessageState {
        MessageCreate::new(
            format!("{author}{secs}"),
            Utc.timestamp_opt(secs, 0).unwrap(),
            Author::new(author, author),
            "x",
        )
        .into()
    }

    #[test]
    fn test_first_message_is_full() {
        assert!(!is_collapsible(None, &msg("u", 0), Duration::minutes(3)));
    }

    #[test]
    fn test_same_author_within_window() {
        let window = Duration::minutes(3);
        assert!(is_collapsible(Some(&msg("u", 0)), &msg("u", 179), window));
        assert!(!is_collapsible(Some(&msg("u", 0)), &msg("u", 180), window));
        assert!(!is_collapsible(Some(&msg("u", 0)), &msg("v", 1), window));
    }

    #[test]
    fn test_variant_for() {
        let window = Duration::minutes(3);
        assert_eq!(variant_for(Some(&msg("u", 0)), &msg("u", 5), window), Variant::Collapsed);
        assert_eq!(variant_for(None, &msg("u", 5), window), Variant::Full);
    }
}
