//! Synthetic mention URIs and what activating one means.

use parlor_shared::{MentionTarget, MessageId, RichText, UriError};

/// Build the link for the mention at `index` in a row's mention list.
pub fn mention_uri(scheme: &str, index: usize) -> String {
    format!("{scheme}://mention:{index}")
}

/// Extract the mention index from `uri`.
pub fn parse_mention_uri(scheme: &str, uri: &str) -> Result<usize, UriError> {
    let rest = uri
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix("://mention:"))
        .ok_or_else(|| UriError::NotMention(uri.to_string()))?;

    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UriError::InvalidIndex(rest.to_string()));
    }
    rest.parse()
        .map_err(|_| UriError::InvalidIndex(rest.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionAction {
    /// Scroll to and highlight another message.
    Highlight(MessageId),
    /// Show the mention's info in a popover.
    Popover(RichText),
}

pub fn action_for(target: &MentionTarget) -> MentionAction {
    match target {
        MentionTarget::Message { id } => MentionAction::Highlight(id.clone()),
        MentionTarget::Author { info, .. } | MentionTarget::Info { info } => {
            MentionAction::Popover(info.clone())
        }
    }
}
