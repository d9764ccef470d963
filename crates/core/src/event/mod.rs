//! Storage-change notifications.

mod decoder;
mod types;

pub use decoder::{decode, NotificationDecoder, DEFAULT_DOMAIN_MARKER};
pub use types::*;
