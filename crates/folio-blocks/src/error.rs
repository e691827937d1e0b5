//! Error types for container resolution.

use thiserror::Error;

/// Errors resolving a container identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The text is not `root` or `col:<left|right>:<uuid>`.
    #[error("malformed container id: {0:?}")]
    MalformedContainer(String),

    /// The slot segment of a column container id is not `left` or `right`.
    #[error("unknown slot {slot:?} in container id {raw:?}")]
    UnknownSlot { raw: String, slot: String },

    /// The parent segment of a column container id is not a UUID.
    #[error("invalid parent id in container id {0:?}")]
    InvalidParent(String),
}
