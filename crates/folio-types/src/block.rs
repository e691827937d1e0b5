//! Block kinds, column slots, and the block envelope.
//!
//! A [`Block`] is the structural envelope the editing core works with: identity,
//! owning page, placement (`parent_id` + `slot`), and a container-local
//! `position`. The kind-specific content lives in [`Payload`], which the core
//! treats as opaque.
//!
//! ## Placement
//!
//! `parent_id` and `slot` are set together or not at all:
//!
//! - both `None` → the block sits in the page root container
//! - both `Some` → the block sits in one side of a `columns` block
//!
//! Only `columns` blocks are ever referenced as a `parent_id`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;
use thiserror::Error;

use crate::ids::{BlockId, PageId};
use crate::payload::Payload;

/// A kind or slot name that is not part of the closed set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown block kind: {0:?}")]
    UnknownKind(String),
    #[error("unknown slot: {0:?} (expected left or right)")]
    UnknownSlot(String),
}

/// What a block *is*.
///
/// Closed set. The string form is the `block_type` column in the record store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    Title,
    Subtitle,
    Paragraph,
    Image,
    Gallery,
    Video,
    Button,
    Slideshow,
    #[strum(serialize = "date_label", serialize = "date")]
    DateLabel,
    #[strum(serialize = "card_grid", serialize = "cards")]
    CardGrid,
    /// Two-slot layout container. The only kind that may parent other blocks.
    Columns,
}

impl BlockKind {
    /// Every kind, in palette order.
    pub const ALL: [BlockKind; 11] = [
        BlockKind::Title,
        BlockKind::Subtitle,
        BlockKind::Paragraph,
        BlockKind::Image,
        BlockKind::Gallery,
        BlockKind::Video,
        BlockKind::Button,
        BlockKind::Slideshow,
        BlockKind::DateLabel,
        BlockKind::CardGrid,
        BlockKind::Columns,
    ];

    /// Parse from string (case-insensitive, accepts legacy aliases).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Parse, reporting the rejected input.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Self::from_str(s).ok_or_else(|| ParseError::UnknownKind(s.to_string()))
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Title => "title",
            BlockKind::Subtitle => "subtitle",
            BlockKind::Paragraph => "paragraph",
            BlockKind::Image => "image",
            BlockKind::Gallery => "gallery",
            BlockKind::Video => "video",
            BlockKind::Button => "button",
            BlockKind::Slideshow => "slideshow",
            BlockKind::DateLabel => "date_label",
            BlockKind::CardGrid => "card_grid",
            BlockKind::Columns => "columns",
        }
    }

    /// Check if blocks of this kind can hold children.
    pub fn is_container(&self) -> bool {
        matches!(self, BlockKind::Columns)
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side of a `columns` block a child occupies.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Slot {
    Left,
    Right,
}

impl Slot {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn parse(s: &str) -> Result<Self, ParseError> {
        Self::from_str(s).ok_or_else(|| ParseError::UnknownSlot(s.to_string()))
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Left => "left",
            Slot::Right => "right",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single typed unit of page content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub page_id: PageId,
    /// The `columns` block this block sits inside, if any.
    pub parent_id: Option<BlockId>,
    /// Which side of the parent. Set exactly when `parent_id` is set.
    pub slot: Option<Slot>,
    /// Sort key, only comparable among siblings of the same container.
    pub position: f64,
    pub payload: Payload,
}

impl Block {
    /// The block's kind, derived from its payload.
    pub fn kind(&self) -> BlockKind {
        self.payload.kind()
    }

    /// Check if this block sits in the page root container.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Check if this block is a `columns` container.
    pub fn is_columns(&self) -> bool {
        self.kind().is_container()
    }

    /// Check the parent ⇔ slot invariant.
    pub fn has_consistent_placement(&self) -> bool {
        self.parent_id.is_some() == self.slot.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::from_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_kind_aliases_and_case() {
        assert_eq!(BlockKind::from_str("DATE"), Some(BlockKind::DateLabel));
        assert_eq!(BlockKind::from_str("cards"), Some(BlockKind::CardGrid));
        assert_eq!(BlockKind::from_str("Columns"), Some(BlockKind::Columns));
        assert_eq!(BlockKind::from_str("marquee"), None);
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        for kind in BlockKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_only_columns_is_container() {
        let containers: Vec<_> = BlockKind::ALL.iter().filter(|k| k.is_container()).collect();
        assert_eq!(containers, vec![&BlockKind::Columns]);
    }

    #[test]
    fn test_slot_parse() {
        assert_eq!(Slot::from_str("LEFT"), Some(Slot::Left));
        assert_eq!(Slot::from_str("right"), Some(Slot::Right));
        assert_eq!(Slot::from_str("middle"), None);
        assert_eq!(
            Slot::parse("middle"),
            Err(ParseError::UnknownSlot("middle".into()))
        );
    }

    #[test]
    fn test_kind_parse_error_keeps_input() {
        assert_eq!(BlockKind::parse("cards"), Ok(BlockKind::CardGrid));
        assert_eq!(
            BlockKind::parse("marquee"),
            Err(ParseError::UnknownKind("marquee".into()))
        );
    }

    #[test]
    fn test_block_placement() {
        let mut block = Block {
            id: BlockId::new(),
            page_id: PageId::new(),
            parent_id: None,
            slot: None,
            position: 1000.0,
            payload: Payload::default_for(BlockKind::Paragraph),
        };
        assert!(block.is_root());
        assert!(block.has_consistent_placement());
        assert_eq!(block.kind(), BlockKind::Paragraph);

        block.parent_id = Some(BlockId::new());
        assert!(!block.has_consistent_placement());
        block.slot = Some(Slot::Right);
        assert!(block.has_consistent_placement());
        assert!(!block.is_root());
    }
}
