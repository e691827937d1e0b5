//! Command implementations.
//!
//! Each command returns the text to print so tests can drive them against
//! an in-memory store.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context as _, Result, bail};
use folio_blocks::{ContainerId, DragGesture, DropTarget, PageTree};
use folio_store::{
    Access, BlobStore, BlockStore, EditorSettings, MutationOutcome, NewPage, PendingWrite,
    SharedRecordStore, load_page_tree,
};
use folio_types::{BlockId, BlockKind, Page, PageKind, Payload, Slot, is_valid_slug, resolve_block_prefix};

/// What every command needs.
pub struct Ctx {
    pub records: SharedRecordStore,
    pub blobs: Box<dyn BlobStore>,
    pub settings: EditorSettings,
}

impl Ctx {
    async fn page(&self, slug: &str) -> Result<Page> {
        self.records
            .page_by_slug(slug)
            .await?
            .with_context(|| format!("no page with slug '{slug}'"))
    }

    async fn editor(&self, slug: &str) -> Result<BlockStore> {
        let page = self.page(slug).await?;
        Ok(BlockStore::hydrate(self.records.clone(), page.id, Access::Admin, self.settings).await?)
    }
}

fn resolve_block(editor: &BlockStore, query: &str) -> Result<BlockId> {
    Ok(resolve_block_prefix(editor.blocks().iter().map(|b| b.id), query)?)
}

/// Wait for a write and turn a persistence failure into an error.
async fn settle(pending: PendingWrite) -> Result<()> {
    match pending.wait().await {
        MutationOutcome::Persisted => Ok(()),
        MutationOutcome::PersistFailed(reason) => bail!("write failed: {reason}"),
    }
}

pub async fn page_new(
    ctx: &Ctx,
    slug: &str,
    title: &str,
    kind: &str,
    published: bool,
    nav_order: Option<f64>,
) -> Result<String> {
    if !is_valid_slug(slug) {
        bail!("invalid slug '{slug}': use lowercase letters, digits and single hyphens");
    }
    let kind = PageKind::from_str(kind).with_context(|| format!("unknown page kind '{kind}'"))?;

    let nav_order = match nav_order {
        Some(n) => n,
        None => {
            let pages = ctx.records.list_pages().await?;
            folio_blocks::append_after(pages.last().map(|p| p.nav_order))
        }
    };

    let page = ctx
        .records
        .insert_page(
            NewPage::new(slug, title)
                .with_kind(kind)
                .published(published)
                .with_nav_order(nav_order),
        )
        .await?;
    Ok(format!("created page {} ({})\n", page.slug, page.id.short()))
}

pub async fn pages(ctx: &Ctx) -> Result<String> {
    let mut out = String::new();
    for page in ctx.records.list_pages().await? {
        let state = if page.published { "published" } else { "draft" };
        writeln!(out, "{:<20} {:<8} {:<9} {}", page.slug, page.kind.as_str(), state, page.title)?;
    }
    Ok(out)
}

/// One line per block in render order, indented by depth.
pub fn render_outline(tree: &PageTree) -> String {
    let mut out = String::new();
    for node in tree.iter_dfs() {
        let block = node.block;
        let slot = match block.slot {
            Some(slot) => format!("[{slot}] "),
            None => String::new(),
        };
        let mut summary = block.payload.summary();
        if summary.len() > 48 {
            let cut = (0..=48).rev().find(|i| summary.is_char_boundary(*i)).unwrap_or(0);
            summary.truncate(cut);
            summary.push_str("...");
        }
        let _ = writeln!(
            out,
            "{:indent$}{}{} {} @{} {}",
            "",
            slot,
            block.id.to_hex(),
            block.kind(),
            block.position,
            summary,
            indent = node.depth * 2,
        );
    }
    let orphans = tree.orphans();
    if !orphans.is_empty() {
        let _ = writeln!(out, "({} unreachable)", orphans.len());
    }
    out
}

pub async fn show(ctx: &Ctx, slug: &str) -> Result<String> {
    let page = ctx.page(slug).await?;
    let tree = load_page_tree(ctx.records.as_ref(), page.id).await?;
    Ok(format!("# {}\n{}", page.title, render_outline(&tree)))
}

pub async fn add(
    ctx: &Ctx,
    slug: &str,
    kind: &str,
    parent: Option<&str>,
    slot: Option<&str>,
) -> Result<String> {
    let kind = BlockKind::parse(kind)?;
    let mut editor = ctx.editor(slug).await?;

    let block = match parent {
        Some(parent) => {
            let parent_id = resolve_block(&editor, parent)?;
            let slot = Slot::parse(slot.unwrap_or("left"))?;
            editor.add_child(parent_id, slot, kind).await?
        }
        None => {
            if slot.is_some() {
                bail!("--slot requires --parent");
            }
            editor.add_root(kind).await?
        }
    };
    Ok(format!("added {} {} @{}\n", block.kind(), block.id, block.position))
}

pub async fn edit(ctx: &Ctx, slug: &str, block: &str, json: &str) -> Result<String> {
    let mut editor = ctx.editor(slug).await?;
    let id = resolve_block(&editor, block)?;
    let kind = editor.get(&id).map(|b| b.kind()).context("block vanished")?;

    let data: serde_json::Value = serde_json::from_str(json).context("payload is not valid JSON")?;
    let payload = Payload::from_parts(kind, data)?;
    settle(editor.update_payload(id, payload)?).await?;
    Ok(format!("updated {}\n", id.short()))
}

/// Interpret a move target typed by a user.
///
/// Block references may be short prefixes; zone markers and `root` pass
/// through unchanged.
fn drop_target(editor: &BlockStore, raw: &str) -> DropTarget {
    if raw == "root" {
        return DropTarget::Container(ContainerId::Root);
    }
    if let Ok(id) = resolve_block(editor, raw) {
        return DropTarget::Block(id);
    }
    DropTarget::parse(raw)
}

pub async fn move_block(ctx: &Ctx, slug: &str, block: &str, target: &str) -> Result<String> {
    let mut editor = ctx.editor(slug).await?;
    let id = resolve_block(&editor, block)?;
    let gesture = DragGesture::new(id, Some(drop_target(&editor, target)));

    match editor.apply_drag(&gesture) {
        None => Ok("nothing to move\n".to_string()),
        Some(pending) => {
            settle(pending).await?;
            let block = editor.get(&id).context("block vanished")?;
            let container = ContainerId::from_placement(block.parent_id, block.slot);
            Ok(format!("moved {} to {} @{}\n", id.short(), container, block.position))
        }
    }
}

pub async fn remove(ctx: &Ctx, slug: &str, block: &str) -> Result<String> {
    let mut editor = ctx.editor(slug).await?;
    let id = resolve_block(&editor, block)?;
    settle(editor.delete(id)?).await?;
    Ok(format!("deleted {} ({})\n", id.short(), ctx.settings.delete_policy))
}

pub async fn upload(ctx: &Ctx, file: &Path, dest: &str) -> Result<String> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let size = bytes.len();
    let url = ctx.blobs.upload(dest, bytes).await?;
    Ok(format!("{url} ({size} bytes)\n"))
}

pub async fn media(ctx: &Ctx, prefix: &str) -> Result<String> {
    let mut out = String::new();
    for entry in ctx.blobs.list(prefix).await? {
        writeln!(out, "{:>10} {}", entry.size, entry.url)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_store::{DeletePolicy, MemoryBlobStore, MemoryRecordStore};
    use std::sync::Arc;

    fn ctx() -> (Ctx, Arc<MemoryRecordStore>) {
        let records = Arc::new(MemoryRecordStore::new());
        let ctx = Ctx {
            records: records.clone(),
            blobs: Box::new(MemoryBlobStore::new("https://cdn.test")),
            settings: EditorSettings::default(),
        };
        (ctx, records)
    }

    async fn ids(ctx: &Ctx, slug: &str) -> Vec<BlockId> {
        let page = ctx.page(slug).await.unwrap();
        load_page_tree(ctx.records.as_ref(), page.id)
            .await
            .unwrap()
            .iter_dfs()
            .map(|n| n.block.id)
            .collect()
    }

    #[tokio::test]
    async fn test_page_new_validates_and_orders() {
        let (ctx, _) = ctx();
        assert!(page_new(&ctx, "Bad Slug", "x", "content", false, None).await.is_err());
        assert!(page_new(&ctx, "home", "Home", "gallery", false, None).await.is_err());

        page_new(&ctx, "home", "Home", "content", true, None).await.unwrap();
        page_new(&ctx, "cv", "CV", "resume", false, None).await.unwrap();

        let listed = pages(&ctx).await.unwrap();
        let slugs: Vec<&str> = listed.lines().filter_map(|l| l.split_whitespace().next()).collect();
        assert_eq!(slugs, vec!["home", "cv"]);
        assert!(listed.contains("draft"));
    }

    #[tokio::test]
    async fn test_add_move_show() {
        let (ctx, _) = ctx();
        page_new(&ctx, "home", "Home", "content", false, None).await.unwrap();
        add(&ctx, "home", "title", None, None).await.unwrap();
        add(&ctx, "home", "paragraph", None, None).await.unwrap();
        add(&ctx, "home", "columns", None, None).await.unwrap();

        let blocks = ids(&ctx, "home").await;
        let [title, para, cols] = blocks[..] else {
            panic!("expected three blocks");
        };

        add(&ctx, "home", "image", Some(&cols.to_string()), Some("right")).await.unwrap();
        assert!(add(&ctx, "home", "image", Some(&para.to_string()), None).await.is_err());
        assert!(add(&ctx, "home", "image", None, Some("left")).await.is_err());

        let zone = DropTarget::zone_id(&ContainerId::Column { parent_id: cols, slot: Slot::Left });
        let out = move_block(&ctx, "home", &para.to_string(), &zone).await.unwrap();
        assert!(out.starts_with("moved"));

        let outline = show(&ctx, "home").await.unwrap();
        let lines: Vec<&str> = outline.lines().collect();
        assert_eq!(lines[0], "# Home");
        assert!(lines[1].contains(&title.to_hex()));
        assert!(lines[2].contains(&cols.to_hex()));
        assert!(lines[3].starts_with("  [left] "));
        assert!(lines[4].starts_with("  [right] "));
    }

    #[tokio::test]
    async fn test_move_to_same_place_is_noop() {
        let (ctx, records) = ctx();
        page_new(&ctx, "home", "Home", "content", false, None).await.unwrap();
        add(&ctx, "home", "title", None, None).await.unwrap();
        let id = ids(&ctx, "home").await[0];
        records.reset_writes();

        let out = move_block(&ctx, "home", &id.to_string(), "root").await.unwrap();
        assert_eq!(out, "nothing to move\n");
        assert_eq!(records.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_edit_rejects_bad_json() {
        let (ctx, _) = ctx();
        page_new(&ctx, "home", "Home", "content", false, None).await.unwrap();
        add(&ctx, "home", "title", None, None).await.unwrap();
        let id = ids(&ctx, "home").await[0].to_string();

        assert!(edit(&ctx, "home", &id, "{not json").await.is_err());
        edit(&ctx, "home", &id, r#"{"text": "Selected work"}"#).await.unwrap();
        assert!(show(&ctx, "home").await.unwrap().contains("Selected work"));
    }

    #[tokio::test]
    async fn test_remove_reports_policy() {
        let (mut ctx, _) = ctx();
        ctx.settings = ctx.settings.with_delete_policy(DeletePolicy::Cascade);
        page_new(&ctx, "home", "Home", "content", false, None).await.unwrap();
        add(&ctx, "home", "columns", None, None).await.unwrap();
        let cols = ids(&ctx, "home").await[0];
        add(&ctx, "home", "paragraph", Some(&cols.to_string()), None).await.unwrap();

        let out = remove(&ctx, "home", &cols.to_string()).await.unwrap();
        assert!(out.contains("cascade"));
        assert!(ids(&ctx, "home").await.is_empty());
        assert!(show(&ctx, "home").await.unwrap().lines().count() == 1);
    }

    #[tokio::test]
    async fn test_upload_and_list_media() {
        let (ctx, _) = ctx();
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hero.png");
        std::fs::write(&file, [0u8; 16]).unwrap();

        let out = upload(&ctx, &file, "images/hero.png").await.unwrap();
        assert_eq!(out, "https://cdn.test/images/hero.png (16 bytes)\n");
        assert!(media(&ctx, "images").await.unwrap().contains("hero.png"));
        assert!(upload(&ctx, &file, "../escape.png").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_page() {
        let (ctx, _) = ctx();
        let err = show(&ctx, "nope").await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }
}
