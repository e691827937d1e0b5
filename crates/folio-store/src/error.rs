//! Error types for persistence and editing.

use std::io;
use std::path::PathBuf;

use folio_types::{BlockId, BlockKind, PayloadError};
use thiserror::Error;

/// Result alias for record and blob store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Record store / blob store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row with that id.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Unique constraint (page slug) violated.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A blob path tried to leave the store root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// A blob path that is empty or not relative.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The backend refused the write (offline, injected failure).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn block_not_found(id: BlockId) -> Self {
        Self::NotFound {
            what: "block",
            id: id.to_string(),
        }
    }

    pub fn page_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            what: "page",
            id: id.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// An editing operation the session refused before touching memory.
#[derive(Debug, Error)]
pub enum EditError {
    /// The session was opened without admin access.
    #[error("editing requires admin access")]
    Forbidden,

    #[error("block not on this page: {0}")]
    UnknownBlock(BlockId),

    /// `add_child` was pointed at something that is not a `columns` block.
    #[error("block {0} is not a columns block")]
    NotAContainer(BlockId),

    /// A `columns` block cannot be created inside a slot.
    #[error("columns blocks cannot be nested")]
    NestedColumns,

    /// `update_payload` with a payload of a different kind.
    #[error("payload kind mismatch: block is {expected}, payload is {actual}")]
    KindMismatch {
        expected: BlockKind,
        actual: BlockKind,
    },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Loading or saving configuration failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),

    /// No platform config directory and no explicit path.
    #[error("no config directory available")]
    NoConfigDir,
}
