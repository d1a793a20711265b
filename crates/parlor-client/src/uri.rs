//! Classification of links activated inside a message.

use parlor_shared::constants::IMAGE_EXTENSIONS;
use parlor_shared::UriError;
use url::Url;

use crate::mention;

/// Requested display size of an image preview. Zero means natural size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
    pub round: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// One of the row's synthetic mention links.
    Mention(usize),
    /// Show an inline preview of `url` (size hint stripped).
    ImagePreview { url: String, size: ImageSize },
    /// Anything else; ask before handing it to the system browser.
    ConfirmOpen { url: String },
}

pub fn classify(uri: &str, mention_scheme: &str) -> Result<LinkAction, UriError> {
    match mention::parse_mention_uri(mention_scheme, uri) {
        Ok(index) => return Ok(LinkAction::Mention(index)),
        Err(UriError::NotMention(_)) => {}
        Err(e) => return Err(e),
    }

    let mut url = Url::parse(uri).map_err(|e| UriError::Malformed(format!("{uri}: {e}")))?;
    if !is_image(&url) {
        return Ok(LinkAction::ConfirmOpen {
            url: url.to_string(),
        });
    }

    let size = match url.fragment() {
        Some(fragment) if fragment.starts_with("w=") => parse_size_hint(fragment)?,
        _ => ImageSize::default(),
    };
    url.set_fragment(None);
    Ok(LinkAction::ImagePreview {
        url: url.to_string(),
        size,
    })
}

/// Whether the URL path ends in a known image extension.
pub fn is_image(url: &Url) -> bool {
    let path = url.path();
    let Some((_, ext)) = path.rsplit_once('.') else {
        return false;
    };
    IMAGE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
}

/// Parse `w=<int>;h=<int>[;round]`.
pub fn parse_size_hint(fragment: &str) -> Result<ImageSize, UriError> {
    let invalid = || UriError::InvalidSizeHint(fragment.to_string());

    let mut parts = fragment.split(';');
    let width = parts
        .next()
        .and_then(|p| p.strip_prefix("w="))
        .and_then(|v| v.parse().ok())
        .ok_or_else(invalid)?;
    let height = parts
        .next()
        .and_then(|p| p.strip_prefix("h="))
        .and_then(|v| v.parse().ok())
        .ok_or_else(invalid)?;
    let round = match parts.next() {
        None => false,
        Some("round") => true,
        Some(_) => return Err(invalid()),
    };
    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(ImageSize {
        width,
        height,
        round,
    })
}
