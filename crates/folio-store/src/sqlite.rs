//! SQLite record store.
//!
//! One connection behind a mutex; every call runs on the blocking pool so the
//! editor's async tasks never stall on disk. IDs are stored as hyphenated
//! UUID text and `data` as JSON text.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use folio_types::{BlockId, Page, PageId, PageKind};
use parking_lot::Mutex;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};

use crate::error::{StoreError, StoreResult};
use crate::record::{BlockPatch, BlockRecord, NewBlockRecord, NewPage, RecordStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    published INTEGER NOT NULL DEFAULT 0,
    kind TEXT NOT NULL DEFAULT 'content',
    nav_order REAL NOT NULL DEFAULT 1000
);

CREATE TABLE IF NOT EXISTS content_blocks (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL,
    block_type TEXT NOT NULL,
    data TEXT,
    position REAL NOT NULL,
    parent_id TEXT,
    slot TEXT
);
CREATE INDEX IF NOT EXISTS idx_blocks_page_position ON content_blocks(page_id, position);
"#;

const BLOCK_COLUMNS: &str = "id, page_id, block_type, data, position, parent_id, slot";
const PAGE_COLUMNS: &str = "id, slug, title, published, kind, nav_order";

/// Record store backed by a SQLite database file.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore").finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode one `content_blocks` row. Rows whose ids cannot be parsed are
/// skipped with a warning so one bad row does not hide the rest of the page.
fn block_from_row(row: &Row<'_>) -> rusqlite::Result<Option<BlockRecord>> {
    let raw_id: String = row.get(0)?;
    let Ok(id) = BlockId::parse(&raw_id) else {
        tracing::warn!(id = %raw_id, "skipping block row with unparseable id");
        return Ok(None);
    };
    let raw_page: String = row.get(1)?;
    let Ok(page_id) = PageId::parse(&raw_page) else {
        tracing::warn!(block = %id, page = %raw_page, "skipping block row with unparseable page id");
        return Ok(None);
    };
    let parent_id = match row.get::<_, Option<String>>(5)? {
        Some(raw) => match BlockId::parse(&raw) {
            Ok(parent) => Some(parent),
            Err(e) => {
                tracing::warn!(block = %id, parent = %raw, error = %e, "skipping block row with unparseable parent id");
                return Ok(None);
            }
        },
        None => None,
    };

    let data: Option<String> = row.get(3)?;
    let data = match data.as_deref().map(serde_json::from_str) {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            tracing::warn!(block = %id, error = %e, "block data is not JSON");
            serde_json::Value::Null
        }
        None => serde_json::Value::Null,
    };

    Ok(Some(BlockRecord {
        id,
        page_id,
        block_type: row.get(2)?,
        data,
        position: row.get(4)?,
        parent_id,
        slot: row.get(6)?,
    }))
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    let kind: String = row.get(4)?;
    Ok(Page {
        id: parsed_column(row, 0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        published: row.get(3)?,
        kind: PageKind::from_str(&kind).unwrap_or_default(),
        nav_order: row.get(5)?,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert_block(&self, new: NewBlockRecord) -> StoreResult<BlockRecord> {
        let record = new.into_record(BlockId::new());
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO content_blocks ({BLOCK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    record.id.to_string(),
                    record.page_id.to_string(),
                    record.block_type,
                    serde_json::to_string(&record.data)?,
                    record.position,
                    record.parent_id.map(|p| p.to_string()),
                    record.slot,
                ],
            )?;
            Ok(record)
        })
        .await
    }

    async fn update_block(&self, id: BlockId, patch: BlockPatch) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.with_conn(move |conn| {
            let mut sets = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            if let Some(position) = patch.position {
                sets.push("position");
                values.push(Value::Real(position));
            }
            if let Some(parent_id) = patch.parent_id {
                sets.push("parent_id");
                values.push(parent_id.map_or(Value::Null, |p| Value::Text(p.to_string())));
            }
            if let Some(slot) = patch.slot {
                sets.push("slot");
                values.push(slot.map_or(Value::Null, |s| Value::Text(s.as_str().to_string())));
            }
            if let Some(data) = &patch.data {
                sets.push("data");
                values.push(Value::Text(serde_json::to_string(data)?));
            }

            let assignments: Vec<String> = sets
                .iter()
                .enumerate()
                .map(|(i, col)| format!("{col} = ?{}", i + 1))
                .collect();
            values.push(Value::Text(id.to_string()));
            let sql = format!(
                "UPDATE content_blocks SET {} WHERE id = ?{}",
                assignments.join(", "),
                values.len()
            );

            let changed = conn.execute(&sql, params_from_iter(values))?;
            if changed == 0 {
                return Err(StoreError::block_not_found(id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_block(&self, id: BlockId) -> StoreResult<()> {
        self.with_conn(move |conn| {
            let changed =
                conn.execute("DELETE FROM content_blocks WHERE id = ?1", params![id.to_string()])?;
            if changed == 0 {
                return Err(StoreError::block_not_found(id));
            }
            Ok(())
        })
        .await
    }

    async fn select_blocks(&self, page_id: PageId) -> StoreResult<Vec<BlockRecord>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BLOCK_COLUMNS} FROM content_blocks WHERE page_id = ?1 ORDER BY position ASC"
            ))?;
            let rows = stmt.query_map(params![page_id.to_string()], block_from_row)?;
            let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows.into_iter().flatten().collect())
        })
        .await
    }

    async fn insert_page(&self, new: NewPage) -> StoreResult<Page> {
        let page = new.into_page(PageId::new());
        self.with_conn(move |conn| {
            let result = conn.execute(
                &format!("INSERT INTO pages ({PAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    page.id.to_string(),
                    page.slug,
                    page.title,
                    page.published,
                    page.kind.as_str(),
                    page.nav_order,
                ],
            );
            match result {
                Ok(_) => Ok(page),
                Err(e) if is_constraint_violation(&e) => {
                    Err(StoreError::AlreadyExists(format!("page {}", page.slug)))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn page_by_slug(&self, slug: &str) -> StoreResult<Option<Page>> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            let page = conn
                .query_row(
                    &format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug = ?1"),
                    params![slug],
                    page_from_row,
                )
                .optional()?;
            Ok(page)
        })
        .await
    }

    async fn list_pages(&self) -> StoreResult<Vec<Page>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PAGE_COLUMNS} FROM pages ORDER BY nav_order ASC, slug ASC"
            ))?;
            let rows = stmt.query_map([], page_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_blocks::ContainerId;
    use folio_types::{BlockKind, Slot};
    use serde_json::json;

    async fn page(store: &SqliteRecordStore) -> Page {
        store.insert_page(NewPage::new("home", "Home")).await.unwrap()
    }

    fn new_block(page_id: PageId, position: f64) -> NewBlockRecord {
        NewBlockRecord::with_default_payload(page_id, BlockKind::Paragraph, ContainerId::Root, position)
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_select_ordered() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let page = page(&store).await;

        let b = store.insert_block(new_block(page.id, 2000.0)).await.unwrap();
        let a = store.insert_block(new_block(page.id, 1000.0)).await.unwrap();
        // Another page's block is not selected.
        let other = store.insert_page(NewPage::new("about", "About")).await.unwrap();
        store.insert_block(new_block(other.id, 500.0)).await.unwrap();

        let rows = store.select_blocks(page.id).await.unwrap();
        let ids: Vec<BlockId> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(rows[0], a);
    }

    #[tokio::test]
    async fn test_update_patch_columns() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let page = page(&store).await;
        let row = store.insert_block(new_block(page.id, 1000.0)).await.unwrap();
        let parent = BlockId::new();

        store
            .update_block(row.id, BlockPatch::placement(1500.0, Some(parent), Some(Slot::Right)))
            .await
            .unwrap();
        store
            .update_block(row.id, BlockPatch::data(json!({"html": "hi"})))
            .await
            .unwrap();

        let rows = store.select_blocks(page.id).await.unwrap();
        assert_eq!(rows[0].position, 1500.0);
        assert_eq!(rows[0].parent_id, Some(parent));
        assert_eq!(rows[0].slot.as_deref(), Some("right"));
        assert_eq!(rows[0].data, json!({"html": "hi"}));

        // Moving back to root clears both columns.
        store
            .update_block(row.id, BlockPatch::placement(3000.0, None, None))
            .await
            .unwrap();
        let rows = store.select_blocks(page.id).await.unwrap();
        assert_eq!((rows[0].parent_id, rows[0].slot.clone()), (None, None));
    }

    #[tokio::test]
    async fn test_malformed_rows_do_not_hide_the_page() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let page = page(&store).await;
        let good = store.insert_block(new_block(page.id, 1000.0)).await.unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO content_blocks (id, page_id, block_type, data, position)
                 VALUES ('not-a-uuid', ?1, 'paragraph', '{}', 2000)",
                params![page.id.to_string()],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO content_blocks (id, page_id, block_type, data, position, parent_id, slot)
                 VALUES (?1, ?2, 'image', '{}', 3000, 'garbage', 'left')",
                params![BlockId::new().to_string(), page.id.to_string()],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO content_blocks (id, page_id, block_type, data, position)
                 VALUES (?1, ?2, 'title', 'not json', 4000)",
                params![BlockId::new().to_string(), page.id.to_string()],
            )
            .unwrap();
        }

        let rows = store.select_blocks(page.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, good.id);
        assert_eq!(rows[1].block_type, "title");
        assert_eq!(rows[1].data, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let id = BlockId::new();
        assert!(store.delete_block(id).await.unwrap_err().is_not_found());
        assert!(store
            .update_block(id, BlockPatch::position(1.0))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let store = SqliteRecordStore::in_memory().unwrap();
        page(&store).await;
        let err = store.insert_page(NewPage::new("home", "Again")).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_pages_by_nav_order() {
        let store = SqliteRecordStore::in_memory().unwrap();
        store
            .insert_page(NewPage::new("work", "Work").with_nav_order(2000.0))
            .await
            .unwrap();
        store
            .insert_page(NewPage::new("cv", "CV").with_kind(PageKind::Resume).with_nav_order(500.0))
            .await
            .unwrap();

        let pages = store.list_pages().await.unwrap();
        let slugs: Vec<&str> = pages.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["cv", "work"]);
        assert_eq!(pages[0].kind, PageKind::Resume);

        let found = store.page_by_slug("work").await.unwrap().unwrap();
        assert_eq!(found.title, "Work");
        assert!(store.page_by_slug("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.db");

        let page_id = {
            let store = SqliteRecordStore::open(&path).unwrap();
            let page = page(&store).await;
            store.insert_block(new_block(page.id, 1000.0)).await.unwrap();
            page.id
        };

        let store = SqliteRecordStore::open(&path).unwrap();
        assert_eq!(store.select_blocks(page_id).await.unwrap().len(), 1);
    }
}
