//! Rich text to Pango-style markup.
//!
//! The content is split into runs at every segment boundary. Each run is
//! wrapped in the tags of every segment covering it, opened in segment order
//! and closed in reverse, so overlapping segments still produce balanced
//! markup. Mentions become synthetic `{scheme}://mention:{index}` links whose
//! index points into [`RenderOutput::mentions`].

use parlor_shared::{Attribute, MentionTarget, RichText, Segment, SegmentKind};
use tracing::warn;

use crate::mention;

/// Markup plus the mention targets its synthetic links refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub markup: String,
    pub mentions: Vec<MentionTarget>,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    scheme: String,
}

impl Renderer {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
        }
    }

    pub fn render(&self, text: &RichText) -> RenderOutput {
        let mut segments: Vec<&Segment> = text
            .segments
            .iter()
            .filter(|segment| {
                let fits = text.segment_fits(segment);
                if !fits {
                    warn!(
                        start = segment.start,
                        end = segment.end,
                        len = text.content.len(),
                        "Dropping segment outside of text"
                    );
                }
                fits && segment.start < segment.end
            })
            .collect();
        // Stable, so equal starts keep their input order.
        segments.sort_by_key(|segment| segment.start);

        let mut mentions = Vec::new();
        let tags: Vec<(String, &'static str)> = segments
            .iter()
            .map(|segment| self.tags(&segment.kind, &mut mentions))
            .collect();

        let mut bounds: Vec<usize> = segments
            .iter()
            .flat_map(|segment| [segment.start, segment.end])
            .chain([0, text.content.len()])
            .collect();
        bounds.sort_unstable();
        bounds.dedup();

        let mut markup = String::with_capacity(text.content.len());
        for window in bounds.windows(2) {
            let (start, end) = (window[0], window[1]);
            let covering: Vec<usize> = segments
                .iter()
                .enumerate()
                .filter(|(_, segment)| segment.start <= start && segment.end >= end)
                .map(|(i, _)| i)
                .collect();

            for &i in &covering {
                markup.push_str(&tags[i].0);
            }
            markup.push_str(&escape(&text.content[start..end]));
            for &i in covering.iter().rev() {
                markup.push_str(tags[i].1);
            }
        }

        RenderOutput { markup, mentions }
    }

    fn tags(&self, kind: &SegmentKind, mentions: &mut Vec<MentionTarget>) -> (String, &'static str) {
        match kind {
            SegmentKind::Link { url } => (format!("<a href=\"{}\">", escape(url)), "</a>"),
            SegmentKind::Image { url, width, height } => (
                format!("<a href=\"{}#w={width};h={height}\">", escape(url)),
                "</a>",
            ),
            SegmentKind::Avatar { url, size, round } => {
                let round = if *round { ";round" } else { "" };
                (
                    format!("<a href=\"{}#w={size};h={size}{round}\">", escape(url)),
                    "</a>",
                )
            }
            SegmentKind::Mention { target } => {
                mentions.push(target.clone());
                let uri = mention::mention_uri(&self.scheme, mentions.len() - 1);
                (format!("<a href=\"{uri}\">"), "</a>")
            }
            SegmentKind::Color { rgb } => {
                (format!("<span color=\"#{:06x}\">", rgb & 0xff_ffff), "</span>")
            }
            SegmentKind::Attribute { attribute } => attribute_tags(*attribute),
            SegmentKind::CodeBlock { .. } => ("<tt>".to_string(), "</tt>"),
            SegmentKind::QuoteBlock => ("<span color=\"#789922\">".to_string(), "</span>"),
        }
    }
}

fn attribute_tags(attribute: Attribute) -> (String, &'static str) {
    let (open, close) = match attribute {
        Attribute::Bold => ("<b>", "</b>"),
        Attribute::Italic => ("<i>", "</i>"),
        Attribute::Underline => ("<u>", "</u>"),
        Attribute::Strikethrough => ("<s>", "</s>"),
        Attribute::Spoiler => ("<span bgcolor=\"#000000\" color=\"#000000\">", "</span>"),
        Attribute::Monospace => ("<tt>", "</tt>"),
        Attribute::Dimmed => ("<span alpha=\"50%\">", "</span>"),
    };
    (open.to_string(), close)
}

/// Escape text for use in markup and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
