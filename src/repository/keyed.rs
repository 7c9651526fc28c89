//! One store key per username; the raw message is the value.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Repository, UserMessage};
use crate::store::{StoreClient, StoreError};

/// Key pattern matching every stored username
const ALL_KEYS: &str = "*";

pub struct KeyedRepository {
    store: StoreClient,
}

impl KeyedRepository {
    pub fn new(store: StoreClient) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Repository for KeyedRepository {
    type Record = UserMessage;

    /// `SET username message`, overwriting any earlier message
    async fn save(&self, record: UserMessage) -> Result<(), StoreError> {
        self.store.set(&record.username, &record.message).await?;
        debug!("Saved message for {:?}", record.username);
        Ok(())
    }

    /// `KEYS *` then `GET` per key. Keys that cannot be read are skipped;
    /// the result is sorted by username.
    async fn load_all(&self) -> Result<Vec<UserMessage>, StoreError> {
        let keys = self.store.keys(ALL_KEYS).await?;

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get(&key).await {
                Ok(Some(message)) => records.push(UserMessage::new(key, message)),
                Ok(None) => debug!("Key {:?} vanished before it could be read", key),
                Err(e @ (StoreError::Connection { .. } | StoreError::Timeout(_))) => {
                    info!("Store lost after {} records: {}", records.len(), e);
                    break;
                }
                Err(e) => debug!("Skipping key {:?}: {}", key, e),
            }
        }

        records.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(records)
    }
}
