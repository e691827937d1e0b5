//! Typed identifiers for pages and blocks.
//!
//! Both ID types wrap UUIDv7 (time-ordered, globally unique). The record store
//! mints them at insert time; nothing in the editing core invents IDs. They
//! display as standard UUID text for logging. The `short()` form (first 8 hex
//! chars) is for human-facing output only and is never used as a lookup key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A page identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(uuid::Uuid);

/// A content block identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(uuid::Uuid);

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Mint a fresh UUIDv7.
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters, for human display only.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Simple (unhyphenated) hex form, 32 characters.
            pub fn to_hex(&self) -> String {
                self.0.as_simple().to_string()
            }

            /// Accepts both hyphenated and bare hex UUID text.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// Whether `query` (hyphens ignored) is a prefix of this id's hex form.
            pub fn matches_hex_prefix(&self, query: &str) -> bool {
                self.to_hex().starts_with(&query.replace('-', ""))
            }

            /// All-zero id. Only for placeholders in tests and fixtures.
            pub fn nil() -> Self {
                Self(uuid::Uuid::nil())
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $T {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(PageId, "PageId");
impl_typed_id!(BlockId, "BlockId");

// ── Prefix resolution ───────────────────────────────────────────────────────

/// Why a typed-in block reference did not resolve.
#[derive(Debug, thiserror::Error)]
pub enum PrefixError {
    #[error("no block matches '{0}'")]
    NoMatch(String),
    #[error("'{prefix}' matches several blocks: {candidates:?}")]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },
}

/// Resolve a typed-in block reference against the blocks of a page.
///
/// A full UUID wins outright if present; otherwise the query must be a
/// unique hex prefix.
pub fn resolve_block_prefix(
    ids: impl Iterator<Item = BlockId>,
    query: &str,
) -> Result<BlockId, PrefixError> {
    let ids: Vec<BlockId> = ids.collect();

    if let Ok(exact) = BlockId::parse(query)
        && ids.contains(&exact)
    {
        return Ok(exact);
    }

    let matches: Vec<BlockId> = ids
        .into_iter()
        .filter(|id| id.matches_hex_prefix(query))
        .collect();

    match matches.len() {
        0 => Err(PrefixError::NoMatch(query.to_string())),
        1 => Ok(matches[0]),
        _ => Err(PrefixError::Ambiguous {
            prefix: query.to_string(),
            candidates: matches.iter().map(|id| id.to_hex()).collect(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unique() {
        assert_ne!(BlockId::new(), BlockId::new());
    }

    #[test]
    fn test_short_is_8_chars() {
        assert_eq!(PageId::new().short().len(), 8);
    }

    #[test]
    fn test_parse_roundtrips_display() {
        let id = BlockId::new();
        let parsed: BlockId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(BlockId::parse(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = BlockId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_nil() {
        assert!(PageId::nil().is_nil());
        assert!(!PageId::new().is_nil());
    }

    #[test]
    fn test_resolve_prefix_unique() {
        let a = BlockId::new();
        let b = BlockId::new();
        let found = resolve_block_prefix([a, b].into_iter(), &a.to_hex()[..32]).unwrap();
        assert_eq!(found, a);
    }

    #[test]
    fn test_resolve_prefix_full_uuid() {
        let a = BlockId::new();
        let found = resolve_block_prefix([a].into_iter(), &a.to_string()).unwrap();
        assert_eq!(found, a);
    }

    #[test]
    fn test_resolve_prefix_no_match() {
        let a = BlockId::new();
        let err = resolve_block_prefix([a].into_iter(), "zzzz").unwrap_err();
        assert!(matches!(err, PrefixError::NoMatch(_)));
    }

    #[test]
    fn test_resolve_prefix_ambiguous() {
        // Empty prefix matches everything.
        let err = resolve_block_prefix([BlockId::new(), BlockId::new()].into_iter(), "")
            .unwrap_err();
        assert!(matches!(err, PrefixError::Ambiguous { .. }));
    }
}
