//! In-memory record store.
//!
//! Used for tests and previews. All data is lost when dropped. Writes can be
//! made to fail on demand and are counted, so tests can assert exactly what a
//! gesture persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use folio_types::{BlockId, Page, PageId};
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::record::{BlockPatch, BlockRecord, NewBlockRecord, NewPage, RecordStore};

/// A write the store has accepted, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Insert(BlockId),
    Update(BlockId, BlockPatch),
    Delete(BlockId),
}

/// In-memory record store.
///
/// Thread-safe via internal `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    blocks: RwLock<HashMap<BlockId, BlockRecord>>,
    pages: RwLock<Vec<Page>>,
    writes: RwLock<Vec<WriteOp>>,
    write_attempts: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following block write fail until turned off again.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Block writes that succeeded.
    pub fn write_count(&self) -> usize {
        self.writes.read().len()
    }

    /// Block writes attempted, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// The accepted block writes, oldest first.
    pub fn writes(&self) -> Vec<WriteOp> {
        self.writes.read().clone()
    }

    /// Forget the write log without touching data.
    pub fn reset_writes(&self) {
        self.writes.write().clear();
        self.write_attempts.store(0, Ordering::SeqCst);
    }

    /// Look up one row.
    pub fn block(&self, id: &BlockId) -> Option<BlockRecord> {
        self.blocks.read().get(id).cloned()
    }

    /// Seed a row directly, bypassing the write log.
    pub fn seed_block(&self, record: BlockRecord) {
        self.blocks.write().insert(record.id, record);
    }

    fn begin_write(&self) -> StoreResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("writes disabled"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_block(&self, new: NewBlockRecord) -> StoreResult<BlockRecord> {
        self.begin_write()?;
        let record = new.into_record(BlockId::new());
        self.blocks.write().insert(record.id, record.clone());
        self.writes.write().push(WriteOp::Insert(record.id));
        Ok(record)
    }

    async fn update_block(&self, id: BlockId, patch: BlockPatch) -> StoreResult<()> {
        self.begin_write()?;
        {
            let mut blocks = self.blocks.write();
            let record = blocks
                .get_mut(&id)
                .ok_or_else(|| StoreError::block_not_found(id))?;
            patch.apply_to(record);
        }
        self.writes.write().push(WriteOp::Update(id, patch));
        Ok(())
    }

    async fn delete_block(&self, id: BlockId) -> StoreResult<()> {
        self.begin_write()?;
        self.blocks
            .write()
            .remove(&id)
            .ok_or_else(|| StoreError::block_not_found(id))?;
        self.writes.write().push(WriteOp::Delete(id));
        Ok(())
    }

    async fn select_blocks(&self, page_id: PageId) -> StoreResult<Vec<BlockRecord>> {
        let mut rows: Vec<BlockRecord> = self
            .blocks
            .read()
            .values()
            .filter(|r| r.page_id == page_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.position.total_cmp(&b.position).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn insert_page(&self, new: NewPage) -> StoreResult<Page> {
        let mut pages = self.pages.write();
        if pages.iter().any(|p| p.slug == new.slug) {
            return Err(StoreError::AlreadyExists(format!("page {}", new.slug)));
        }
        let page = new.into_page(PageId::new());
        pages.push(page.clone());
        Ok(page)
    }

    async fn page_by_slug(&self, slug: &str) -> StoreResult<Option<Page>> {
        Ok(self.pages.read().iter().find(|p| p.slug == slug).cloned())
    }

    async fn list_pages(&self) -> StoreResult<Vec<Page>> {
        let mut pages = self.pages.read().clone();
        pages.sort_by(|a, b| a.nav_order.total_cmp(&b.nav_order).then_with(|| a.slug.cmp(&b.slug)));
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_blocks::ContainerId;
    use folio_types::BlockKind;

    fn new_block(page_id: PageId, position: f64) -> NewBlockRecord {
        NewBlockRecord::with_default_payload(page_id, BlockKind::Title, ContainerId::Root, position)
            .unwrap()
    }

    #[tokio::test]
    async fn test_crud_and_write_log() {
        let store = MemoryRecordStore::new();
        let page_id = PageId::new();

        let a = store.insert_block(new_block(page_id, 2000.0)).await.unwrap();
        let b = store.insert_block(new_block(page_id, 1000.0)).await.unwrap();
        store.update_block(a.id, BlockPatch::position(500.0)).await.unwrap();
        store.delete_block(b.id).await.unwrap();

        let rows = store.select_blocks(page_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position, 500.0);
        assert_eq!(store.write_count(), 4);
        assert_eq!(
            store.writes(),
            vec![
                WriteOp::Insert(a.id),
                WriteOp::Insert(b.id),
                WriteOp::Update(a.id, BlockPatch::position(500.0)),
                WriteOp::Delete(b.id),
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryRecordStore::new();
        let page_id = PageId::new();
        let row = store.insert_block(new_block(page_id, 1000.0)).await.unwrap();

        store.fail_writes(true);
        let err = store.update_block(row.id, BlockPatch::position(5.0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.block(&row.id).unwrap().position, 1000.0);
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.write_attempts(), 2);

        store.fail_writes(false);
        store.update_block(row.id, BlockPatch::position(5.0)).await.unwrap();
        assert_eq!(store.block(&row.id).unwrap().position, 5.0);
    }

    #[tokio::test]
    async fn test_duplicate_slug() {
        let store = MemoryRecordStore::new();
        store.insert_page(NewPage::new("home", "Home")).await.unwrap();
        assert!(store.insert_page(NewPage::new("home", "Other")).await.is_err());
        assert_eq!(store.list_pages().await.unwrap().len(), 1);
    }
}
