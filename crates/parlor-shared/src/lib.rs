//! # parlor-shared
//!
//! Types shared between the message store and the client: identifiers, rich
//! text, backend payloads, and the backend capability traits the message
//! view consumes.

pub mod backend;
pub mod constants;
pub mod error;
pub mod message;
pub mod nonce;
pub mod rich;
pub mod subscription;
pub mod types;

pub use error::{BackendError, UriError};
pub use message::*;
pub use nonce::NonceGenerator;
pub use rich::{Attribute, MentionTarget, RichText, Segment, SegmentKind};
pub use subscription::Subscription;
pub use types::{AuthorId, MemberSectionId, MessageId, Nonce};
