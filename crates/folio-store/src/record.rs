//! Record store contract.
//!
//! Rows mirror the `content_blocks` and `pages` tables. Reads are lenient:
//! `block_type` and `slot` come back as raw strings and are converted into a
//! [`Block`] at one boundary, [`BlockRecord::into_block`], which coerces bad
//! rows instead of failing the page.

use std::sync::Arc;

use async_trait::async_trait;
use folio_types::{Block, BlockId, BlockKind, Page, PageId, PageKind, Payload, PayloadError, Slot};
use folio_blocks::ContainerId;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// A `content_blocks` row as stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: BlockId,
    pub page_id: PageId,
    pub block_type: String,
    pub data: serde_json::Value,
    pub position: f64,
    pub parent_id: Option<BlockId>,
    pub slot: Option<String>,
}

impl BlockRecord {
    /// Convert a row into a block.
    ///
    /// Returns `None` for unknown `block_type`. A payload that fails to decode
    /// is replaced with the kind's default, and inconsistent `parent_id`/`slot`
    /// pairs are coerced. Every coercion is logged.
    pub fn into_block(self) -> Option<Block> {
        let Some(kind) = BlockKind::from_str(&self.block_type) else {
            tracing::warn!(block = %self.id, block_type = %self.block_type, "skipping block of unknown type");
            return None;
        };

        let payload = Payload::from_parts(kind, self.data).unwrap_or_else(|e| {
            tracing::warn!(block = %self.id, error = %e, "undecodable payload, using default");
            Payload::default_for(kind)
        });

        let slot = self.slot.as_deref().and_then(|s| {
            let parsed = Slot::from_str(s);
            if parsed.is_none() {
                tracing::warn!(block = %self.id, slot = %s, "ignoring unknown slot");
            }
            parsed
        });
        let (parent_id, slot) = ContainerId::from_placement(self.parent_id, slot).placement();

        let position = if self.position.is_finite() {
            self.position
        } else {
            tracing::warn!(block = %self.id, "non-finite position, treating as 0");
            0.0
        };

        Some(Block {
            id: self.id,
            page_id: self.page_id,
            parent_id,
            slot,
            position,
            payload,
        })
    }

    /// The row for a block.
    pub fn from_block(block: &Block) -> Result<Self, PayloadError> {
        Ok(Self {
            id: block.id,
            page_id: block.page_id,
            block_type: block.kind().as_str().to_string(),
            data: block.payload.to_data()?,
            position: block.position,
            parent_id: block.parent_id,
            slot: block.slot.map(|s| s.as_str().to_string()),
        })
    }
}

/// Convert rows into blocks, dropping the ones that cannot be read.
pub fn records_to_blocks(records: Vec<BlockRecord>) -> Vec<Block> {
    records.into_iter().filter_map(BlockRecord::into_block).collect()
}

/// Insert request. The store assigns the id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewBlockRecord {
    pub page_id: PageId,
    pub block_type: BlockKind,
    pub data: serde_json::Value,
    pub position: f64,
    pub parent_id: Option<BlockId>,
    pub slot: Option<Slot>,
}

impl NewBlockRecord {
    /// A new block of `kind` in `container` with the kind's default payload.
    pub fn with_default_payload(
        page_id: PageId,
        kind: BlockKind,
        container: ContainerId,
        position: f64,
    ) -> Result<Self, PayloadError> {
        let (parent_id, slot) = container.placement();
        Ok(Self {
            page_id,
            block_type: kind,
            data: Payload::default_for(kind).to_data()?,
            position,
            parent_id,
            slot,
        })
    }

    /// The row this request produces once the store picks an id.
    pub fn into_record(self, id: BlockId) -> BlockRecord {
        BlockRecord {
            id,
            page_id: self.page_id,
            block_type: self.block_type.as_str().to_string(),
            data: self.data,
            position: self.position,
            parent_id: self.parent_id,
            slot: self.slot.map(|s| s.as_str().to_string()),
        }
    }
}

/// Partial update of one row. `None` leaves a column untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockPatch {
    pub position: Option<f64>,
    pub parent_id: Option<Option<BlockId>>,
    pub slot: Option<Option<Slot>>,
    pub data: Option<serde_json::Value>,
}

impl BlockPatch {
    /// Move: position, parent, and slot written together.
    pub fn placement(position: f64, parent_id: Option<BlockId>, slot: Option<Slot>) -> Self {
        Self {
            position: Some(position),
            parent_id: Some(parent_id),
            slot: Some(slot),
            data: None,
        }
    }

    pub fn position(position: f64) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.parent_id.is_none()
            && self.slot.is_none()
            && self.data.is_none()
    }

    /// Apply to a stored row.
    pub fn apply_to(&self, record: &mut BlockRecord) {
        if let Some(position) = self.position {
            record.position = position;
        }
        if let Some(parent_id) = self.parent_id {
            record.parent_id = parent_id;
        }
        if let Some(slot) = self.slot {
            record.slot = slot.map(|s| s.as_str().to_string());
        }
        if let Some(data) = &self.data {
            record.data = data.clone();
        }
    }
}

/// Insert request for a page.
#[derive(Clone, Debug, PartialEq)]
pub struct NewPage {
    pub slug: String,
    pub title: String,
    pub published: bool,
    pub kind: PageKind,
    pub nav_order: f64,
}

impl NewPage {
    pub fn new(slug: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            title: title.into(),
            published: false,
            kind: PageKind::Content,
            nav_order: folio_blocks::POSITION_BASE,
        }
    }

    pub fn with_kind(mut self, kind: PageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn published(mut self, published: bool) -> Self {
        self.published = published;
        self
    }

    pub fn with_nav_order(mut self, nav_order: f64) -> Self {
        self.nav_order = nav_order;
        self
    }

    pub fn into_page(self, id: PageId) -> Page {
        Page {
            id,
            slug: self.slug,
            title: self.title,
            published: self.published,
            kind: self.kind,
            nav_order: self.nav_order,
        }
    }
}

/// Durable storage for pages and their blocks.
///
/// Every call is an independent single-row operation; there are no
/// multi-row transactions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a block row and return it with its new id.
    async fn insert_block(&self, new: NewBlockRecord) -> StoreResult<BlockRecord>;

    /// Update the given columns of one row.
    async fn update_block(&self, id: BlockId, patch: BlockPatch) -> StoreResult<()>;

    /// Delete one row. Children are not touched.
    async fn delete_block(&self, id: BlockId) -> StoreResult<()>;

    /// All rows of a page, ordered by `position` ascending.
    async fn select_blocks(&self, page_id: PageId) -> StoreResult<Vec<BlockRecord>>;

    async fn insert_page(&self, new: NewPage) -> StoreResult<Page>;

    async fn page_by_slug(&self, slug: &str) -> StoreResult<Option<Page>>;

    /// All pages ordered by `nav_order`.
    async fn list_pages(&self) -> StoreResult<Vec<Page>>;
}

/// Shared handle to a record store.
pub type SharedRecordStore = Arc<dyn RecordStore>;
