//! Persistence adapters
//!
//! Translate message-board records to and from store values. Two layouts
//! exist: [`keyed`] stores one key per username, [`list`] keeps every message
//! in a single JSON array.

pub mod keyed;
pub mod list;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::store::StoreError;

pub use keyed::KeyedRepository;
pub use list::ListRepository;

/// A message posted under a username (keyed mode)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMessage {
    pub username: String,
    pub message: String,
}

impl UserMessage {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }
}

/// An anonymous message (list mode)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Storage for one record shape
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    type Record: Serialize + DeserializeOwned + Default + Send + Sync + 'static;

    /// Persist a record
    async fn save(&self, record: Self::Record) -> Result<(), StoreError>;

    /// Load every stored record
    async fn load_all(&self) -> Result<Vec<Self::Record>, StoreError>;
}
