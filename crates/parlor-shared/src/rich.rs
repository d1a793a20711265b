//! Rich text as delivered by backends: a plain string plus styled byte ranges.
//!
//! Segment offsets are byte offsets into `content`. Segments may overlap;
//! the renderer decides how overlaps are presented.

use serde::{Deserialize, Serialize};

use crate::types::{AuthorId, MessageId};

/// A string with formatting segments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RichText {
    pub content: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// One formatting range `[start, end)` in bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
    pub kind: SegmentKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentKind {
    Link {
        url: String,
    },
    Image {
        url: String,
        width: u32,
        height: u32,
    },
    Avatar {
        url: String,
        size: u32,
        round: bool,
    },
    Mention {
        target: MentionTarget,
    },
    Color {
        /// 0xRRGGBB.
        rgb: u32,
    },
    Attribute {
        attribute: Attribute,
    },
    CodeBlock {
        language: Option<String>,
    },
    QuoteBlock,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Monospace,
    Dimmed,
}

/// What a mention segment points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum MentionTarget {
    /// A user; `info` is shown in a popover when activated.
    Author {
        id: AuthorId,
        info: RichText,
    },
    /// Another message in the same channel.
    Message { id: MessageId },
    /// Anything else that only carries descriptive text.
    Info { info: RichText },
}

impl MentionTarget {
    pub fn info(&self) -> Option<&RichText> {
        match self {
            Self::Author { info, .. } | Self::Info { info } => Some(info),
            Self::Message { .. } => None,
        }
    }
}

impl RichText {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            segments: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn with_segment(mut self, start: usize, end: usize, kind: SegmentKind) -> Self {
        self.segments.push(Segment { start, end, kind });
        self
    }

    /// Whether `segment` can be applied to this text: in range, non-inverted
    /// and on UTF-8 character boundaries.
    pub fn segment_fits(&self, segment: &Segment) -> bool {
        segment.start <= segment.end
            && segment.end <= self.content.len()
            && self.content.is_char_boundary(segment.start)
            && self.content.is_char_boundary(segment.end)
    }

    /// Authors mentioned anywhere in this text.
    pub fn mentioned_authors(&self) -> impl Iterator<Item = &AuthorId> {
        self.segments.iter().filter_map(|s| match &s.kind {
            SegmentKind::Mention {
                target: MentionTarget::Author { id, .. },
            } => Some(id),
            _ => None,
        })
    }
}

impl From<&str> for RichText {
    fn from(value: &str) -> Self {
        Self::plain(value)
    }
}

impl From<String> for RichText {
    fn from(value: String) -> Self {
        Self::plain(value)
    }
}
