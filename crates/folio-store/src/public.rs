//! Read-only path for the public site.

use folio_blocks::PageTree;
use folio_types::{Page, PageId};

use crate::error::StoreResult;
use crate::record::{RecordStore, records_to_blocks};

/// Fetch a page's blocks and index them for rendering.
pub async fn load_page_tree(store: &dyn RecordStore, page_id: PageId) -> StoreResult<PageTree> {
    let blocks = records_to_blocks(store.select_blocks(page_id).await?);
    let tree = PageTree::build(blocks);

    let orphans = tree.orphans().len();
    if orphans > 0 {
        tracing::debug!(page = %page_id, orphans, "page has unreachable blocks");
    }
    Ok(tree)
}

/// Look up a page by slug for public viewing.
///
/// Unpublished pages are treated as missing.
pub async fn load_published_page(
    store: &dyn RecordStore,
    slug: &str,
) -> StoreResult<Option<(Page, PageTree)>> {
    let Some(page) = store.page_by_slug(slug).await? else {
        return Ok(None);
    };
    if !page.published {
        return Ok(None);
    }
    let tree = load_page_tree(store, page.id).await?;
    Ok(Some((page, tree)))
}

/// Published pages in navigation order.
pub async fn navigation(store: &dyn RecordStore) -> StoreResult<Vec<Page>> {
    Ok(store
        .list_pages()
        .await?
        .into_iter()
        .filter(|p| p.published)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordStore;
    use crate::record::{NewBlockRecord, NewPage};
    use folio_blocks::ContainerId;
    use folio_types::{BlockKind, Slot};

    #[tokio::test]
    async fn test_unpublished_page_hidden() {
        let store = MemoryRecordStore::new();
        store.insert_page(NewPage::new("draft", "Draft")).await.unwrap();
        store
            .insert_page(NewPage::new("home", "Home").published(true))
            .await
            .unwrap();

        assert!(load_published_page(&store, "draft").await.unwrap().is_none());
        assert!(load_published_page(&store, "missing").await.unwrap().is_none());
        assert!(load_published_page(&store, "home").await.unwrap().is_some());

        let nav: Vec<String> = navigation(&store).await.unwrap().into_iter().map(|p| p.slug).collect();
        assert_eq!(nav, vec!["home".to_string()]);
    }

    #[tokio::test]
    async fn test_tree_from_rows() {
        let store = MemoryRecordStore::new();
        let page = store.insert_page(NewPage::new("home", "Home")).await.unwrap();
        let cols = store
            .insert_block(
                NewBlockRecord::with_default_payload(page.id, BlockKind::Columns, ContainerId::Root, 1000.0)
                    .unwrap(),
            )
            .await
            .unwrap();
        let right = ContainerId::Column { parent_id: cols.id, slot: Slot::Right };
        let child = store
            .insert_block(
                NewBlockRecord::with_default_payload(page.id, BlockKind::Image, right, 1000.0).unwrap(),
            )
            .await
            .unwrap();

        let tree = load_page_tree(&store, page.id).await.unwrap();
        let order: Vec<_> = tree.iter_dfs().map(|n| (n.depth, n.block.id)).collect();
        assert_eq!(order, vec![(0, cols.id), (1, child.id)]);
    }
}
