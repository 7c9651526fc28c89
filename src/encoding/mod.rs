//! Value encoding/decoding for storage
//!
//! The list mode keeps every message under one key as a JSON array; this
//! module owns that representation.

pub mod list;

pub use list::{DecodeError, MessageList};
