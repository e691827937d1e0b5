//! Containers: the unit of sibling grouping and drop targeting.
//!
//! A block lives in exactly one container: the page root, or one slot of a
//! `columns` block. [`ContainerId`] folds `(parent_id, slot)` into a single
//! key so "move into the left column of X" and "move to the page root" are the
//! same operation: move to container C at index i.
//!
//! The text form is `root` or `col:<left|right>:<parent uuid>`. Parent ids are
//! unique, so the form works at any nesting depth without chaining.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use folio_types::{Block, BlockId, Slot};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::position::append_after;

const ROOT: &str = "root";
const COLUMN_PREFIX: &str = "col";

/// Where a block sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerId {
    Root,
    Column { parent_id: BlockId, slot: Slot },
}

impl ContainerId {
    /// Build from the structural fields of a block or row.
    ///
    /// A parent without a slot lands in the left slot. A slot without a parent
    /// is ignored. Both are invariant violations and are logged.
    pub fn from_placement(parent_id: Option<BlockId>, slot: Option<Slot>) -> Self {
        match (parent_id, slot) {
            (None, None) => ContainerId::Root,
            (Some(parent_id), Some(slot)) => ContainerId::Column { parent_id, slot },
            (Some(parent_id), None) => {
                tracing::warn!(parent = %parent_id, "block has a parent but no slot, assuming left");
                ContainerId::Column {
                    parent_id,
                    slot: Slot::Left,
                }
            }
            (None, Some(slot)) => {
                tracing::warn!(%slot, "block has a slot but no parent, treating as root");
                ContainerId::Root
            }
        }
    }

    /// Split back into `(parent_id, slot)`.
    pub fn placement(&self) -> (Option<BlockId>, Option<Slot>) {
        match self {
            ContainerId::Root => (None, None),
            ContainerId::Column { parent_id, slot } => (Some(*parent_id), Some(*slot)),
        }
    }

    pub fn parent_id(&self) -> Option<BlockId> {
        self.placement().0
    }

    pub fn is_root(&self) -> bool {
        matches!(self, ContainerId::Root)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerId::Root => f.write_str(ROOT),
            ContainerId::Column { parent_id, slot } => {
                write!(f, "{COLUMN_PREFIX}:{slot}:{parent_id}")
            }
        }
    }
}

impl FromStr for ContainerId {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ROOT {
            return Ok(ContainerId::Root);
        }

        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(COLUMN_PREFIX), Some(slot), Some(parent)) => {
                let slot = Slot::from_str(slot).ok_or_else(|| ResolveError::UnknownSlot {
                    raw: s.to_string(),
                    slot: slot.to_string(),
                })?;
                let parent_id =
                    BlockId::parse(parent).map_err(|_| ResolveError::InvalidParent(s.to_string()))?;
                Ok(ContainerId::Column { parent_id, slot })
            }
            _ => Err(ResolveError::MalformedContainer(s.to_string())),
        }
    }
}

/// The container a block currently sits in.
pub fn container_of(block: &Block) -> ContainerId {
    ContainerId::from_placement(block.parent_id, block.slot)
}

/// Parse a container id string into `(parent_id, slot)`.
pub fn parse_container(id: &str) -> Result<(Option<BlockId>, Option<Slot>), ResolveError> {
    id.parse::<ContainerId>().map(|c| c.placement())
}

/// Sort siblings by position; ties break on id so grouping is deterministic.
pub fn sort_siblings(siblings: &mut [&Block]) {
    siblings.sort_by(|a, b| a.position.total_cmp(&b.position).then(a.id.cmp(&b.id)));
}

/// Blocks partitioned by container, each group sorted by position.
///
/// The root group always exists, possibly empty, so a drop on the page root
/// always resolves.
#[derive(Debug, Clone)]
pub struct ContainerMap<'a> {
    groups: HashMap<ContainerId, Vec<&'a Block>>,
}

impl<'a> ContainerMap<'a> {
    /// Siblings in a container, empty if the container has none.
    pub fn siblings(&self, container: &ContainerId) -> &[&'a Block] {
        self.groups.get(container).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Index of a block among its container's siblings.
    pub fn index_of(&self, container: &ContainerId, id: &BlockId) -> Option<usize> {
        self.siblings(container).iter().position(|b| b.id == *id)
    }

    /// Position for a new block appended to the end of `container`.
    pub fn append_position(&self, container: &ContainerId) -> f64 {
        append_after(self.siblings(container).last().map(|b| b.position))
    }

    /// Whether the container has an entry (root always does).
    pub fn contains(&self, container: &ContainerId) -> bool {
        self.groups.contains_key(container)
    }

    /// All containers that have an entry.
    pub fn containers(&self) -> impl Iterator<Item = &ContainerId> {
        self.groups.keys()
    }

    /// Iterate `(container, siblings)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ContainerId, &[&'a Block])> {
        self.groups.iter().map(|(c, v)| (c, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Partition a flat block list into per-container, position-sorted groups.
pub fn group_by_container(blocks: &[Block]) -> ContainerMap<'_> {
    let mut groups: HashMap<ContainerId, Vec<&Block>> = HashMap::new();
    groups.insert(ContainerId::Root, Vec::new());

    for block in blocks {
        groups.entry(container_of(block)).or_default().push(block);
    }
    for siblings in groups.values_mut() {
        sort_siblings(siblings);
    }

    ContainerMap { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::{BlockKind, PageId, Payload};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn block(parent_id: Option<BlockId>, slot: Option<Slot>, position: f64) -> Block {
        Block {
            id: BlockId::new(),
            page_id: PageId::nil(),
            parent_id,
            slot,
            position,
            payload: Payload::default_for(BlockKind::Paragraph),
        }
    }

    #[test]
    fn test_root_display_and_parse() {
        assert_eq!(ContainerId::Root.to_string(), "root");
        assert_eq!("root".parse::<ContainerId>().unwrap(), ContainerId::Root);
        assert_eq!(parse_container("root").unwrap(), (None, None));
    }

    #[test]
    fn test_column_display_shape() {
        let parent = BlockId::new();
        let id = ContainerId::Column { parent_id: parent, slot: Slot::Right };
        assert_eq!(id.to_string(), format!("col:right:{parent}"));
    }

    #[test]
    fn test_roundtrip_all_placements() {
        for _ in 0..50 {
            let parent = BlockId::new();
            for slot in [Slot::Left, Slot::Right] {
                let container = ContainerId::from_placement(Some(parent), Some(slot));
                let parsed = parse_container(&container.to_string()).unwrap();
                assert_eq!(parsed, (Some(parent), Some(slot)));
            }
        }
        let root = ContainerId::from_placement(None, None);
        assert_eq!(parse_container(&root.to_string()).unwrap(), (None, None));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "nope".parse::<ContainerId>(),
            Err(ResolveError::MalformedContainer(_))
        ));
        assert!(matches!(
            format!("col:middle:{}", BlockId::new()).parse::<ContainerId>(),
            Err(ResolveError::UnknownSlot { .. })
        ));
        assert!(matches!(
            "col:left:not-a-uuid".parse::<ContainerId>(),
            Err(ResolveError::InvalidParent(_))
        ));
        assert!("ROOT".parse::<ContainerId>().is_err());
    }

    #[test]
    fn test_inconsistent_placement_is_coerced() {
        let parent = BlockId::new();
        assert_eq!(
            ContainerId::from_placement(Some(parent), None),
            ContainerId::Column { parent_id: parent, slot: Slot::Left }
        );
        assert_eq!(ContainerId::from_placement(None, Some(Slot::Right)), ContainerId::Root);
    }

    #[test]
    fn test_root_always_present() {
        let map = group_by_container(&[]);
        assert!(map.contains(&ContainerId::Root));
        assert!(map.siblings(&ContainerId::Root).is_empty());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_groups_by_container() {
        let columns = BlockId::new();
        let blocks = vec![
            block(None, None, 2000.0),
            block(Some(columns), Some(Slot::Left), 1000.0),
            block(None, None, 1000.0),
            block(Some(columns), Some(Slot::Right), 1000.0),
            block(Some(columns), Some(Slot::Left), 500.0),
        ];
        let map = group_by_container(&blocks);
        assert_eq!(map.len(), 3);

        let root: Vec<f64> = map.siblings(&ContainerId::Root).iter().map(|b| b.position).collect();
        assert_eq!(root, vec![1000.0, 2000.0]);

        let left = ContainerId::Column { parent_id: columns, slot: Slot::Left };
        let left: Vec<f64> = map.siblings(&left).iter().map(|b| b.position).collect();
        assert_eq!(left, vec![500.0, 1000.0]);
    }

    #[test]
    fn test_every_group_sorted_random() {
        let mut rng = StdRng::seed_from_u64(42);
        let parents: Vec<BlockId> = (0..3).map(|_| BlockId::new()).collect();

        for _ in 0..100 {
            let mut blocks: Vec<Block> = (0..rng.gen_range(0..40))
                .map(|_| {
                    let position = rng.gen_range(-5000.0..5000.0);
                    if rng.gen_bool(0.5) {
                        block(None, None, position)
                    } else {
                        let parent = *parents.choose(&mut rng).unwrap();
                        let slot = if rng.gen_bool(0.5) { Slot::Left } else { Slot::Right };
                        block(Some(parent), Some(slot), position)
                    }
                })
                .collect();
            blocks.shuffle(&mut rng);

            let map = group_by_container(&blocks);
            let total: usize = map.iter().map(|(_, s)| s.len()).sum();
            assert_eq!(total, blocks.len());
            for (container, siblings) in map.iter() {
                assert!(
                    siblings.windows(2).all(|w| w[0].position <= w[1].position),
                    "{container} not sorted"
                );
                assert!(siblings.iter().all(|b| container_of(b) == *container));
            }
        }
    }

    #[test]
    fn test_append_position() {
        let blocks = vec![block(None, None, 2000.0), block(None, None, 1000.0)];
        let map = group_by_container(&blocks);
        assert_eq!(map.append_position(&ContainerId::Root), 3000.0);

        let empty = ContainerId::Column { parent_id: BlockId::new(), slot: Slot::Left };
        assert_eq!(map.append_position(&empty), 1000.0);
    }

    #[test]
    fn test_index_of() {
        let blocks = vec![block(None, None, 3.0), block(None, None, 1.0)];
        let map = group_by_container(&blocks);
        assert_eq!(map.index_of(&ContainerId::Root, &blocks[1].id), Some(0));
        assert_eq!(map.index_of(&ContainerId::Root, &blocks[0].id), Some(1));
        assert_eq!(map.index_of(&ContainerId::Root, &BlockId::new()), None);
    }
}
