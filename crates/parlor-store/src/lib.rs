//! # parlor-store
//!
//! The in-memory message index behind the message view.
//!
//! [`MessageStore`] keeps records in time order and indexes them twice: by
//! backend id once confirmed, by nonce while a locally sent message waits for
//! its echo. It is owned and mutated by a single thread (the UI thread) and
//! does no locking of its own.

pub mod record;
pub mod store;

mod error;

pub use error::{Result, StoreError};
pub use record::{compare, Hit, Moved, Record};
pub use store::MessageStore;
