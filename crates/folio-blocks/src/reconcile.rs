//! Drag reconciliation: turn a finished drag gesture into one block move.
//!
//! The editor reports the dragged block and whatever it was released over.
//! [`reconcile`] resolves that to a destination container and index, picks a
//! fractional position between the new neighbors, and returns a [`MovePlan`].
//! Nothing here mutates; callers apply the plan to their own state with
//! [`apply_plan`] and persist it.
//!
//! Resolution is fail-open. A target that cannot be resolved sends the block to
//! the end of the page root rather than dropping the gesture.

use std::fmt;

use folio_types::{Block, BlockId, Slot};
use serde::{Deserialize, Serialize};

use crate::container::{ContainerId, container_of, group_by_container};
use crate::position::{spread, try_allocate};

/// Prefix of the empty drop-zone markers the editor renders per container.
pub const ZONE_PREFIX: &str = "zone:";

/// What a block was released over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropTarget {
    /// Another block; the dragged block takes its index.
    Block(BlockId),
    /// A container or its empty drop zone; the dragged block is appended.
    Container(ContainerId),
    /// A target id nothing could make sense of.
    Unresolved(String),
}

impl DropTarget {
    /// Classify a raw target id from the editor.
    ///
    /// Accepts `zone:<container>`, a bare container id, or a block uuid.
    pub fn parse(raw: &str) -> Self {
        if let Some(container) = raw.strip_prefix(ZONE_PREFIX) {
            return match container.parse::<ContainerId>() {
                Ok(c) => DropTarget::Container(c),
                Err(_) => DropTarget::Unresolved(raw.to_string()),
            };
        }
        if let Ok(c) = raw.parse::<ContainerId>() {
            return DropTarget::Container(c);
        }
        match BlockId::parse(raw) {
            Ok(id) => DropTarget::Block(id),
            Err(_) => DropTarget::Unresolved(raw.to_string()),
        }
    }

    /// The drop-zone marker for a container.
    pub fn zone_id(container: &ContainerId) -> String {
        format!("{ZONE_PREFIX}{container}")
    }
}

/// A completed drag: the block picked up and where it was released.
///
/// `target: None` means the drag was cancelled or released outside every
/// recognized zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragGesture {
    pub source: BlockId,
    pub target: Option<DropTarget>,
}

impl DragGesture {
    pub fn new(source: BlockId, target: Option<DropTarget>) -> Self {
        Self { source, target }
    }

    /// Build from raw editor ids.
    pub fn from_raw(source: BlockId, over: Option<&str>) -> Self {
        Self::new(source, over.map(DropTarget::parse))
    }
}

/// Why a gesture produced no mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    Cancelled,
    SelfDrop,
    UnknownSource,
    SamePosition,
    NestedColumns,
}

impl fmt::Display for NoOpReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoOpReason::Cancelled => "drag cancelled",
            NoOpReason::SelfDrop => "dropped onto itself",
            NoOpReason::UnknownSource => "dragged block not on page",
            NoOpReason::SamePosition => "already at that position",
            NoOpReason::NestedColumns => "columns cannot be nested",
        };
        f.write_str(s)
    }
}

/// A sibling whose position is rewritten by a rebalance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub block_id: BlockId,
    pub position: f64,
}

/// The mutation a gesture resolves to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovePlan {
    pub block_id: BlockId,
    pub from: ContainerId,
    pub to: ContainerId,
    pub position: f64,
    pub parent_id: Option<BlockId>,
    pub slot: Option<Slot>,
    /// Other siblings of `to` that must move because the gap ran out.
    /// Empty on the normal path.
    pub renumbered: Vec<PositionUpdate>,
}

impl MovePlan {
    pub fn is_cross_container(&self) -> bool {
        self.from != self.to
    }

    /// Number of rows this plan writes.
    pub fn write_count(&self) -> usize {
        1 + self.renumbered.len()
    }
}

/// Outcome of reconciling one gesture.
#[derive(Clone, Debug, PartialEq)]
pub enum Reconciliation {
    NoOp(NoOpReason),
    Move(MovePlan),
}

impl Reconciliation {
    pub fn plan(&self) -> Option<&MovePlan> {
        match self {
            Reconciliation::Move(plan) => Some(plan),
            Reconciliation::NoOp(_) => None,
        }
    }

    pub fn into_plan(self) -> Option<MovePlan> {
        match self {
            Reconciliation::Move(plan) => Some(plan),
            Reconciliation::NoOp(_) => None,
        }
    }
}

/// Whether blocks can be dropped into `container` on this page.
///
/// The root always accepts. A slot accepts only when its parent is a live
/// `columns` block.
pub fn accepts_drop(blocks: &[Block], container: &ContainerId) -> bool {
    match container.parent_id() {
        None => true,
        Some(parent_id) => blocks
            .iter()
            .any(|b| b.id == parent_id && b.is_columns()),
    }
}

/// Resolve a drop target to `(container, block dropped on)`.
///
/// Unknown blocks, malformed ids, and slots of anything that is not a live
/// `columns` block all fall back to the page root.
pub fn resolve_target(blocks: &[Block], target: &DropTarget) -> (ContainerId, Option<BlockId>) {
    let (container, over) = match target {
        DropTarget::Block(id) => match blocks.iter().find(|b| b.id == *id) {
            Some(over) => (container_of(over), Some(over.id)),
            None => {
                tracing::warn!(target = %id, "drop target block not on page, appending to root");
                return (ContainerId::Root, None);
            }
        },
        DropTarget::Container(container) => (*container, None),
        DropTarget::Unresolved(raw) => {
            tracing::warn!(target = %raw, "unresolved drop target, appending to root");
            return (ContainerId::Root, None);
        }
    };

    if accepts_drop(blocks, &container) {
        (container, over)
    } else {
        tracing::warn!(%container, "drop container has no columns parent, appending to root");
        (ContainerId::Root, None)
    }
}

/// Reconcile a gesture against the current block list.
pub fn reconcile(blocks: &[Block], gesture: &DragGesture) -> Reconciliation {
    let Some(target) = &gesture.target else {
        return Reconciliation::NoOp(NoOpReason::Cancelled);
    };
    if *target == DropTarget::Block(gesture.source) {
        return Reconciliation::NoOp(NoOpReason::SelfDrop);
    }
    let Some(source) = blocks.iter().find(|b| b.id == gesture.source) else {
        tracing::warn!(block = %gesture.source, "dragged block not on page");
        return Reconciliation::NoOp(NoOpReason::UnknownSource);
    };

    let from = container_of(source);
    let (to, over) = resolve_target(blocks, target);

    if source.is_columns() && !to.is_root() && to != from {
        tracing::warn!(block = %source.id, container = %to, "refusing to nest columns");
        return Reconciliation::NoOp(NoOpReason::NestedColumns);
    }

    let map = group_by_container(blocks);
    let target_siblings = map.siblings(&to);
    let to_index = over
        .and_then(|id| map.index_of(&to, &id))
        .unwrap_or(target_siblings.len());

    let order: Vec<&Block> = if from == to {
        let Some(from_index) = map.index_of(&from, &source.id) else {
            return Reconciliation::NoOp(NoOpReason::UnknownSource);
        };
        let dest = to_index.min(target_siblings.len().saturating_sub(1));
        if dest == from_index {
            return Reconciliation::NoOp(NoOpReason::SamePosition);
        }
        array_move(target_siblings, from_index, dest)
    } else {
        let mut order = target_siblings.to_vec();
        order.insert(to_index, source);
        order
    };

    plan_in_order(source, from, to, &order)
}

/// Move the element at `from` to `to`, shifting the rest.
fn array_move<'a>(items: &[&'a Block], from: usize, to: usize) -> Vec<&'a Block> {
    let mut out = items.to_vec();
    let moved = out.remove(from);
    out.insert(to, moved);
    out
}

/// Position `source` within `order` (the destination's final sibling order).
fn plan_in_order(
    source: &Block,
    from: ContainerId,
    to: ContainerId,
    order: &[&Block],
) -> Reconciliation {
    let Some(index) = order.iter().position(|b| b.id == source.id) else {
        return Reconciliation::NoOp(NoOpReason::UnknownSource);
    };
    let prev = index.checked_sub(1).map(|i| order[i].position);
    let next = order.get(index + 1).map(|b| b.position);
    let (parent_id, slot) = to.placement();

    let (position, renumbered) = match try_allocate(prev, next) {
        Ok(position) => (position, Vec::new()),
        Err(exhausted) => {
            tracing::warn!(
                container = %to,
                prev = exhausted.prev,
                next = exhausted.next,
                siblings = order.len(),
                "position gap exhausted, rebalancing container"
            );
            rebalance(source.id, order)
        }
    };

    Reconciliation::Move(MovePlan {
        block_id: source.id,
        from,
        to,
        position,
        parent_id,
        slot,
        renumbered,
    })
}

/// Evenly respread `order`, returning the moved block's new position and the
/// siblings whose positions actually change.
fn rebalance(moved: BlockId, order: &[&Block]) -> (f64, Vec<PositionUpdate>) {
    let mut position = 0.0;
    let mut updates = Vec::new();
    for (block, new_position) in order.iter().zip(spread(order.len())) {
        if block.id == moved {
            position = new_position;
        } else if block.position != new_position {
            updates.push(PositionUpdate {
                block_id: block.id,
                position: new_position,
            });
        }
    }
    (position, updates)
}

/// Apply a plan to an owned block list. Returns false if the moved block is
/// missing.
pub fn apply_plan(blocks: &mut [Block], plan: &MovePlan) -> bool {
    let mut found = false;
    for block in blocks.iter_mut() {
        if block.id == plan.block_id {
            block.position = plan.position;
            block.parent_id = plan.parent_id;
            block.slot = plan.slot;
            found = true;
        } else if let Some(update) = plan.renumbered.iter().find(|u| u.block_id == block.id) {
            block.position = update.position;
        }
    }
    found
}
