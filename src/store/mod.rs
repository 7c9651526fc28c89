//! Store client
//!
//! Authenticated connections to a Redis-compatible endpoint, managed by the
//! `redis` crate and shared by request handlers.

pub mod client;

use std::time::Duration;

use redis::RedisError;
use thiserror::Error;

pub use client::{StoreClient, StoreOptions};

/// Errors raised while talking to the store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("could not reach store at {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: RedisError,
    },

    #[error("could not authenticate to store at {addr}: {source}")]
    Auth {
        addr: String,
        #[source]
        source: RedisError,
    },

    #[error("{command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: RedisError,
    },

    #[error("store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("store client is shut down")]
    Closed,

    #[error("stored value is not valid: {0}")]
    Decode(#[from] crate::encoding::DecodeError),
}
