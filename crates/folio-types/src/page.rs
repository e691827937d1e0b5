//! Page metadata.
//!
//! Pages are the `page_id` foreign-key target for blocks. Navigation order uses
//! the same fractional scheme as blocks, flat rather than nested.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::PageId;

/// What a page renders as in the site navigation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum PageKind {
    /// Block-composed page.
    #[default]
    Content,
    /// Page that renders the uploaded resume document.
    Resume,
    /// Navigation entry pointing elsewhere.
    Link,
}

impl PageKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Content => "content",
            PageKind::Resume => "resume",
            PageKind::Link => "link",
        }
    }
}

impl std::fmt::Display for PageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A site page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub slug: String,
    pub title: String,
    pub published: bool,
    pub kind: PageKind,
    pub nav_order: f64,
}

/// Check that a slug is URL-safe: lowercase ASCII letters, digits, and
/// single interior hyphens.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
