//! Shared identity, block, and payload types for folio.
//!
//! This crate is the leaf of the workspace: typed IDs, the closed set of block
//! kinds, the payload sum type, and page metadata. It has **no internal folio
//! dependencies** and does no I/O.
//!
//! # Model
//!
//! ```text
//! Page (PageId)
//!     └── owns Block (BlockId), ordered by `position` within a container
//!             container = page root, or (columns block, left|right slot)
//!             └── Block.payload: Payload (one variant per BlockKind)
//! ```

pub mod block;
pub mod ids;
pub mod page;
pub mod payload;

pub use block::{Block, BlockKind, ParseError, Slot};
pub use ids::{BlockId, PageId, PrefixError, resolve_block_prefix};
pub use page::{Page, PageKind, is_valid_slug};
pub use payload::{
    Align, Animation, AnimationType, ButtonPayload, ButtonVariant, Card, CardGridPayload,
    ColumnsPayload, DateLabelPayload, GalleryPayload, HeadingPayload, ImagePayload, MediaRef,
    ParagraphPayload, Payload, PayloadError, SlideshowPayload, VideoPayload,
};
