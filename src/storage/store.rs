//! `AlignmentStore` trait and its error type.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::storage::record::{PassageRecord, PassageSummary};

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("passage {0} not found")]
    NotFound(Uuid),

    /// Ids are v4 UUIDs; anything else is rejected before touching storage.
    #[error("invalid passage id {0:?}")]
    InvalidId(String),
}

/// Parse a user-supplied passage id.
pub fn parse_id(id: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(id.trim()).map_err(|_| StorageError::InvalidId(id.to_string()))
}

// ---------------------------------------------------------------------------
// AlignmentStore trait
// ---------------------------------------------------------------------------

/// Persistence for passage records and their audio.
///
/// `persist` must be all-or-nothing: a record is never visible without its
/// audio.
#[async_trait]
pub trait AlignmentStore: Send + Sync {
    async fn persist(&self, record: &PassageRecord, audio: &[u8]) -> Result<Uuid, StorageError>;

    async fn retrieve(&self, id: Uuid) -> Result<PassageRecord, StorageError>;

    async fn audio(&self, id: Uuid) -> Result<Vec<u8>, StorageError>;

    /// All stored passages, newest first.
    async fn list(&self) -> Result<Vec<PassageSummary>, StorageError>;
}
