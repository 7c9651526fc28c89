//! JSON list encoding for the accumulating message key

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::Message;

/// Ordered list of messages as stored under the list key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageList {
    pub messages: Vec<Message>,
}

impl MessageList {
    /// Decode a stored value. An absent key decodes to an empty list.
    pub fn decode(raw: Option<&str>) -> Result<Self, DecodeError> {
        match raw {
            Some(raw) => serde_json::from_str(raw).map_err(DecodeError::InvalidJson),
            None => Ok(Self::default()),
        }
    }

    /// Encode for storage
    pub fn encode(&self) -> Result<String, DecodeError> {
        serde_json::to_string(self).map_err(DecodeError::Unencodable)
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Errors that can occur while encoding or decoding the stored list
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("stored list is not a JSON array of messages: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("message list could not be encoded: {0}")]
    Unencodable(#[source] serde_json::Error),
}
