//! Every message in one JSON array under a fixed key.
//!
//! Reads for queries go to the replica endpoint; appends go to the primary.
//! Appends are a read-modify-write of the whole array, so they are funnelled
//! through a single writer lock and read the current array from the primary,
//! never from a replica that may lag behind it. Writers in other processes
//! are not coordinated.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Message, Repository};
use crate::encoding::MessageList;
use crate::store::{StoreClient, StoreError};

/// Key holding the message array
pub const MESSAGES_KEY: &str = "messages";

pub struct ListRepository {
    primary: StoreClient,
    replica: StoreClient,
    writer: Mutex<()>,
}

impl ListRepository {
    pub fn new(primary: StoreClient, replica: StoreClient) -> Self {
        Self {
            primary,
            replica,
            writer: Mutex::new(()),
        }
    }

    /// Read the array from `store`. Absent or unparsable values read as empty.
    async fn read_list(store: &StoreClient) -> Result<MessageList, StoreError> {
        let raw = store.get(MESSAGES_KEY).await?;

        match MessageList::decode(raw.as_deref()) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!(
                    "Ignoring unreadable {:?} value on {}: {}",
                    MESSAGES_KEY,
                    store.endpoint(),
                    e
                );
                Ok(MessageList::default())
            }
        }
    }
}

#[async_trait]
impl Repository for ListRepository {
    type Record = Message;

    async fn save(&self, record: Message) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;

        let mut list = Self::read_list(&self.primary).await?;
        list.push(record);
        let encoded = list.encode()?;

        self.primary.set(MESSAGES_KEY, &encoded).await?;
        debug!("Appended message, list now holds {}", list.messages.len());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Message>, StoreError> {
        Ok(Self::read_list(&self.replica).await?.into_messages())
    }
}
