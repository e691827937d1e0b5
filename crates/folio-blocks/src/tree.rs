//! Read-only page tree for rendering.
//!
//! The public renderer takes the same flat rows the editor does: roots are the
//! blocks with no parent, sorted by position, and each `columns` block renders
//! its left then right slot recursively. Nesting depth is not limited by the
//! data model, so traversal is capped at [`MAX_TREE_DEPTH`] and guarded against
//! parent cycles.

use std::collections::{HashMap, HashSet};

use folio_types::{Block, BlockId, Slot};

use crate::container::{ContainerId, group_by_container};

/// Traversal stops descending past this depth.
pub const MAX_TREE_DEPTH: usize = 32;

/// One block in depth-first render order.
#[derive(Debug, Clone, Copy)]
pub struct TreeNode<'a> {
    /// 0 for root blocks, +1 per enclosing `columns` block.
    pub depth: usize,
    pub container: ContainerId,
    pub block: &'a Block,
}

/// Blocks of one page, indexed for rendering.
#[derive(Debug, Clone)]
pub struct PageTree {
    blocks: Vec<Block>,
    index: HashMap<BlockId, usize>,
    /// Position-sorted block indices per container.
    groups: HashMap<ContainerId, Vec<usize>>,
}

impl PageTree {
    /// Build from a flat block list in any order.
    pub fn build(blocks: Vec<Block>) -> Self {
        let index: HashMap<BlockId, usize> =
            blocks.iter().enumerate().map(|(i, b)| (b.id, i)).collect();

        let groups = group_by_container(&blocks)
            .iter()
            .map(|(container, siblings)| {
                let ids = siblings.iter().filter_map(|b| index.get(&b.id).copied()).collect();
                (*container, ids)
            })
            .collect();

        Self { blocks, index, groups }
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.index.get(id).map(|&i| &self.blocks[i])
    }

    fn group(&self, container: ContainerId) -> impl Iterator<Item = &Block> {
        self.groups
            .get(&container)
            .into_iter()
            .flatten()
            .map(move |&i| &self.blocks[i])
    }

    /// Root blocks in render order.
    pub fn roots(&self) -> impl Iterator<Item = &Block> {
        self.group(ContainerId::Root)
    }

    /// Children in one slot of a `columns` block, in render order.
    pub fn children(&self, parent_id: BlockId, slot: Slot) -> impl Iterator<Item = &Block> {
        self.group(ContainerId::Column { parent_id, slot })
    }

    /// Iterate blocks depth-first in render order.
    pub fn iter_dfs(&self) -> impl Iterator<Item = TreeNode<'_>> {
        DfsIterator::new(self)
    }

    /// Blocks the renderer never reaches: parent missing, parent not a
    /// `columns` block, or stuck in a parent cycle.
    pub fn orphans(&self) -> Vec<&Block> {
        let reached: HashSet<BlockId> = self.iter_dfs().map(|n| n.block.id).collect();
        self.blocks.iter().filter(|b| !reached.contains(&b.id)).collect()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Depth-first iterator over the page tree.
///
/// Tracks visited blocks so a parent cycle cannot loop, and stops descending
/// at `MAX_TREE_DEPTH`.
struct DfsIterator<'a> {
    tree: &'a PageTree,
    stack: Vec<TreeNode<'a>>,
    visited: HashSet<BlockId>,
}

impl<'a> DfsIterator<'a> {
    fn new(tree: &'a PageTree) -> Self {
        // Reverse so the first root pops first
        let mut stack: Vec<_> = tree
            .roots()
            .map(|block| TreeNode {
                depth: 0,
                container: ContainerId::Root,
                block,
            })
            .collect();
        stack.reverse();
        Self {
            tree,
            stack,
            visited: HashSet::new(),
        }
    }
}

impl<'a> Iterator for DfsIterator<'a> {
    type Item = TreeNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            if !self.visited.insert(node.block.id) {
                continue;
            }
            if node.block.is_columns() {
                let depth = node.depth + 1;
                if depth >= MAX_TREE_DEPTH {
                    tracing::warn!(
                        block = %node.block.id,
                        "page tree hit MAX_TREE_DEPTH ({MAX_TREE_DEPTH}), not descending"
                    );
                } else {
                    // Left then right, each in position order; push in reverse.
                    for slot in [Slot::Right, Slot::Left] {
                        let container = ContainerId::Column {
                            parent_id: node.block.id,
                            slot,
                        };
                        let children: Vec<&Block> = self.tree.group(container).collect();
                        for block in children.into_iter().rev() {
                            self.stack.push(TreeNode {
                                depth,
                                container,
                                block,
                            });
                        }
                    }
                }
            }
            return Some(node);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{BlockKind, PageId, Payload};

    fn block(kind: BlockKind, parent_id: Option<BlockId>, slot: Option<Slot>, position: f64) -> Block {
        Block {
            id: BlockId::new(),
            page_id: PageId::nil(),
            parent_id,
            slot,
            position,
            payload: Payload::default_for(kind),
        }
    }

    #[test]
    fn test_empty_tree() {
        let tree = PageTree::build(Vec::new());
        assert!(tree.is_empty());
        assert_eq!(tree.iter_dfs().count(), 0);
        assert!(tree.orphans().is_empty());
    }

    #[test]
    fn test_dfs_render_order() {
        let title = block(BlockKind::Title, None, None, 1000.0);
        let cols = block(BlockKind::Columns, None, None, 2000.0);
        let x = cols.id;
        let right = block(BlockKind::Image, Some(x), Some(Slot::Right), 1000.0);
        let left_b = block(BlockKind::Paragraph, Some(x), Some(Slot::Left), 2000.0);
        let left_a = block(BlockKind::Paragraph, Some(x), Some(Slot::Left), 1000.0);
        let footer = block(BlockKind::Button, None, None, 3000.0);

        let expected = vec![
            (0, title.id),
            (0, cols.id),
            (1, left_a.id),
            (1, left_b.id),
            (1, right.id),
            (0, footer.id),
        ];
        // Shuffled input.
        let tree = PageTree::build(vec![right, footer, left_b, cols, title, left_a]);

        let seen: Vec<(usize, BlockId)> = tree.iter_dfs().map(|n| (n.depth, n.block.id)).collect();
        assert_eq!(seen, expected);
        assert_eq!(tree.roots().count(), 3);
        assert_eq!(tree.children(x, Slot::Left).count(), 2);
    }

    #[test]
    fn test_nested_columns_render() {
        let outer = block(BlockKind::Columns, None, None, 1000.0);
        let inner = block(BlockKind::Columns, Some(outer.id), Some(Slot::Right), 1000.0);
        let deep = block(BlockKind::Paragraph, Some(inner.id), Some(Slot::Left), 1000.0);
        let deep_id = deep.id;
        let inner_container = ContainerId::Column { parent_id: inner.id, slot: Slot::Left };
        let tree = PageTree::build(vec![outer, inner, deep]);

        let node = tree.iter_dfs().find(|n| n.block.id == deep_id).unwrap();
        assert_eq!(node.depth, 2);
        assert_eq!(node.container, inner_container);
    }

    #[test]
    fn test_orphans_are_not_rendered() {
        let root = block(BlockKind::Paragraph, None, None, 1000.0);
        let orphan = block(BlockKind::Paragraph, Some(BlockId::new()), Some(Slot::Left), 1000.0);
        // Child of a paragraph: the parent is not a container.
        let bad_child = block(BlockKind::Paragraph, Some(root.id), Some(Slot::Left), 1000.0);
        let orphan_id = orphan.id;
        let bad_id = bad_child.id;
        let tree = PageTree::build(vec![root, orphan, bad_child]);

        assert_eq!(tree.iter_dfs().count(), 1);
        let mut orphans: Vec<BlockId> = tree.orphans().iter().map(|b| b.id).collect();
        orphans.sort();
        let mut expected = vec![orphan_id, bad_id];
        expected.sort();
        assert_eq!(orphans, expected);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut a = block(BlockKind::Columns, None, None, 1000.0);
        let b = block(BlockKind::Columns, Some(a.id), Some(Slot::Left), 1000.0);
        // a claims to live inside b: neither is a root, so neither renders.
        a.parent_id = Some(b.id);
        a.slot = Some(Slot::Left);
        let tree = PageTree::build(vec![a, b]);

        assert_eq!(tree.iter_dfs().count(), 0);
        assert_eq!(tree.orphans().len(), 2);
    }

    #[test]
    fn test_depth_is_capped() {
        let mut blocks = vec![block(BlockKind::Columns, None, None, 1000.0)];
        for _ in 0..(MAX_TREE_DEPTH + 10) {
            let parent = blocks.last().unwrap().id;
            blocks.push(block(BlockKind::Columns, Some(parent), Some(Slot::Left), 1000.0));
        }
        let tree = PageTree::build(blocks);

        let nodes: Vec<TreeNode<'_>> = tree.iter_dfs().collect();
        assert_eq!(nodes.len(), MAX_TREE_DEPTH);
        assert!(nodes.iter().all(|n| n.depth < MAX_TREE_DEPTH));
    }
}
