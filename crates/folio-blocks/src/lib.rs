//! Block-tree ordering for folio pages.
//!
//! Pure logic over `folio_types::Block` lists. Nothing here does I/O; the
//! editor session in `folio-store` owns the blocks and persists the results.
//!
//! | Module        | Role                                                     |
//! |---------------|----------------------------------------------------------|
//! | [`position`]  | Fractional sort keys between two neighbors               |
//! | [`container`] | `(parent_id, slot)` ⇔ container id, sibling grouping     |
//! | [`reconcile`] | Drag gesture → single-row [`MovePlan`]                   |
//! | [`tree`]      | Depth-first render order for the public page             |

pub mod container;
pub mod error;
pub mod position;
pub mod reconcile;
pub mod tree;

pub use container::{
    ContainerId, ContainerMap, container_of, group_by_container, parse_container, sort_siblings,
};
pub use error::ResolveError;
pub use position::{
    Exhausted, MIN_POSITION_GAP, POSITION_BASE, POSITION_STEP, allocate, append_after, is_between,
    spread, try_allocate,
};
pub use reconcile::{
    DragGesture, DropTarget, MovePlan, NoOpReason, PositionUpdate, Reconciliation, ZONE_PREFIX,
    accepts_drop, apply_plan, reconcile, resolve_target,
};
pub use tree::{MAX_TREE_DEPTH, PageTree, TreeNode};
