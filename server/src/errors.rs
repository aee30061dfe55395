//! Error types for the location pipeline.
//!
//! Every failure is scoped: an [`IngestError`] belongs to one inbound
//! message, a [`ConnectionError`] to one observer and a [`StoreError`] to
//! one upsert. None of them is fatal to the process.

use std::time::Duration;

use config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Rejected inbound message. Reported to the sender only.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum IngestError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("message from a closed connection")]
    ConnectionClosed,
}

impl IngestError {
    /// Unparseable payloads and incomplete ones get different acknowledgements.
    pub fn is_unparseable(&self) -> bool {
        matches!(self, IngestError::Malformed(_))
    }
}

/// Delivery to a single observer failed; the connection gets pruned.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    #[error("outbound queue full")]
    Full,

    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sled(#[from] sled::Error),

    #[error("record encoding failed: {0}")]
    Codec(#[from] postcard::Error),

    #[error("location {0} not found")]
    NotFound(u64),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
