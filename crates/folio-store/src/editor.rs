//! Editor session: the authoritative block list for one page.
//!
//! A [`BlockStore`] is owned by exactly one editing session. Every mutation
//! goes through `&mut self`, lands in memory synchronously, and then persists
//! on the Tokio runtime without blocking the caller.
//!
//! Each session owns one writer task. Row writes queue to it in mutation
//! order, so two quick edits of the same block reach storage in the order
//! they were made.
//!
//! # Write model
//!
//! - Inserts are awaited because the record store assigns the id. A failed
//!   insert leaves memory untouched.
//! - Updates, moves, and deletes are optimistic. They return a
//!   [`PendingWrite`] that resolves to a [`MutationOutcome`]. Dropping the
//!   handle does not cancel the write. A failed write is logged and broadcast
//!   as [`BlockEvent::PersistFailed`]; memory is not rolled back, so the
//!   caller chooses between retry, [`BlockStore::reload`], or accepting drift.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use folio_blocks::{
    ContainerId, DragGesture, MovePlan, PageTree, Reconciliation, append_after, apply_plan,
    group_by_container, reconcile,
};
use folio_types::{Block, BlockId, BlockKind, PageId, Payload, Slot};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::Instrument;

use crate::debounce::{DebounceConfig, PayloadDebouncer};
use crate::error::{EditError, StoreError};
use crate::record::{BlockPatch, NewBlockRecord, SharedRecordStore, records_to_blocks};

/// Capacity of the change-event channel.
const EVENT_CAPACITY: usize = 256;

/// What the caller is allowed to do with a page.
///
/// Session checks happen upstream; the editor only refuses to open for a
/// viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Admin,
    Viewer,
}

/// What happens to the children of a deleted `columns` block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Leave the children in storage pointing at the deleted parent.
    #[default]
    Orphan,
    /// Delete the children (and their descendants) as well.
    Cascade,
    /// Append the children to the page root, left slot first.
    ReparentToRoot,
}

impl DeletePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletePolicy::Orphan => "orphan",
            DeletePolicy::Cascade => "cascade",
            DeletePolicy::ReparentToRoot => "reparent_to_root",
        }
    }
}

impl std::fmt::Display for DeletePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-session behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditorSettings {
    pub delete_policy: DeletePolicy,
    pub debounce: DebounceConfig,
}

impl EditorSettings {
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }
}

/// Changes broadcast to subscribers of a session.
#[derive(Clone, Debug)]
pub enum BlockEvent {
    Created { block: Block },
    PayloadUpdated { block_id: BlockId, payload: Payload },
    Moved { plan: MovePlan },
    Deleted { block_id: BlockId },
    /// A write for this block did not persist. Memory still shows it.
    PersistFailed { block_id: BlockId, reason: String },
}

/// How an optimistic mutation ended up in the record store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    Persisted,
    PersistFailed(String),
}

impl MutationOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, MutationOutcome::Persisted)
    }
}

/// Handle to a queued write.
#[derive(Debug)]
pub struct PendingWrite {
    rx: oneshot::Receiver<MutationOutcome>,
}

impl PendingWrite {
    /// Wait for the write to finish.
    pub async fn wait(self) -> MutationOutcome {
        self.rx.await.unwrap_or_else(|_| {
            tracing::error!("block writer stopped before the write finished");
            MutationOutcome::PersistFailed("block writer stopped".to_string())
        })
    }
}

/// One row write.
#[derive(Clone, Debug)]
enum RowWrite {
    Update(BlockId, BlockPatch),
    Delete(BlockId),
}

impl RowWrite {
    fn block_id(&self) -> BlockId {
        match self {
            RowWrite::Update(id, _) | RowWrite::Delete(id) => *id,
        }
    }
}

/// Rows for one mutation and where to report the result.
struct WriteJob {
    writes: Vec<RowWrite>,
    done: oneshot::Sender<MutationOutcome>,
}

/// The editing session for one page.
pub struct BlockStore {
    store: SharedRecordStore,
    page_id: PageId,
    blocks: Vec<Block>,
    settings: EditorSettings,
    debouncer: PayloadDebouncer,
    write_tx: mpsc::UnboundedSender<WriteJob>,
    event_tx: broadcast::Sender<BlockEvent>,
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore")
            .field("page_id", &self.page_id)
            .field("blocks", &self.blocks.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl BlockStore {
    /// Open a session by loading the page's blocks.
    #[tracing::instrument(name = "editor.hydrate", skip(store, settings), fields(page = %page_id))]
    pub async fn hydrate(
        store: SharedRecordStore,
        page_id: PageId,
        access: Access,
        settings: EditorSettings,
    ) -> Result<Self, EditError> {
        if access != Access::Admin {
            tracing::warn!(page = %page_id, "refusing editor session without admin access");
            return Err(EditError::Forbidden);
        }

        let blocks = records_to_blocks(store.select_blocks(page_id).await?);
        tracing::info!(page = %page_id, blocks = blocks.len(), "editor session opened");

        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(
            Arc::clone(&store),
            page_id,
            event_tx.clone(),
            write_rx,
        ));
        Ok(Self {
            store,
            page_id,
            blocks,
            settings,
            debouncer: PayloadDebouncer::new(settings.debounce),
            write_tx,
            event_tx,
        })
    }

    /// Replace memory with what the record store currently holds.
    ///
    /// Pending debounced edits are dropped.
    pub async fn reload(&mut self) -> Result<(), EditError> {
        let blocks = records_to_blocks(self.store.select_blocks(self.page_id).await?);
        let dropped = self.debouncer.drain_all().len();
        if dropped > 0 {
            tracing::warn!(page = %self.page_id, dropped, "reload dropped pending edits");
        }
        self.blocks = blocks;
        Ok(())
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Current blocks, unordered.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == *id)
    }

    /// Siblings of a container in position order.
    pub fn siblings(&self, container: &ContainerId) -> Vec<&Block> {
        group_by_container(&self.blocks).siblings(container).to_vec()
    }

    /// Snapshot of the current blocks as a render tree.
    pub fn tree(&self) -> PageTree {
        PageTree::build(self.blocks.clone())
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<BlockEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: BlockEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn index_of(&self, id: &BlockId) -> Result<usize, EditError> {
        self.blocks
            .iter()
            .position(|b| b.id == *id)
            .ok_or(EditError::UnknownBlock(*id))
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Append a new block of `kind` to the page root.
    pub async fn add_root(&mut self, kind: BlockKind) -> Result<Block, EditError> {
        self.insert(kind, ContainerId::Root).await
    }

    /// Append a new block of `kind` to one slot of a `columns` block.
    pub async fn add_child(
        &mut self,
        parent_id: BlockId,
        slot: Slot,
        kind: BlockKind,
    ) -> Result<Block, EditError> {
        let parent = self.get(&parent_id).ok_or(EditError::UnknownBlock(parent_id))?;
        if !parent.is_columns() {
            return Err(EditError::NotAContainer(parent_id));
        }
        if kind.is_container() {
            return Err(EditError::NestedColumns);
        }
        self.insert(kind, ContainerId::Column { parent_id, slot }).await
    }

    async fn insert(&mut self, kind: BlockKind, container: ContainerId) -> Result<Block, EditError> {
        let position = group_by_container(&self.blocks).append_position(&container);
        let new = NewBlockRecord::with_default_payload(self.page_id, kind, container, position)?;

        let record = self.store.insert_block(new).await.inspect_err(|e| {
            tracing::error!(page = %self.page_id, %kind, error = %e, "block insert failed");
        })?;

        let (parent_id, slot) = container.placement();
        let block = Block {
            id: record.id,
            page_id: self.page_id,
            parent_id,
            slot,
            position: record.position,
            payload: Payload::default_for(kind),
        };
        tracing::debug!(block = %block.id, %kind, %container, position, "block created");

        self.blocks.push(block.clone());
        self.emit(BlockEvent::Created {
            block: block.clone(),
        });
        Ok(block)
    }

    // ========================================================================
    // Payload edits
    // ========================================================================

    /// Check an edit and apply it to memory.
    fn apply_payload(&mut self, id: BlockId, payload: &Payload) -> Result<(), EditError> {
        let idx = self.index_of(&id)?;
        let expected = self.blocks[idx].kind();
        if payload.kind() != expected {
            return Err(EditError::KindMismatch {
                expected,
                actual: payload.kind(),
            });
        }
        self.blocks[idx].payload = payload.clone();
        self.emit(BlockEvent::PayloadUpdated {
            block_id: id,
            payload: payload.clone(),
        });
        Ok(())
    }

    /// Replace a block's payload and persist it now.
    pub fn update_payload(&mut self, id: BlockId, payload: Payload) -> Result<PendingWrite, EditError> {
        let data = payload.to_data()?;
        self.apply_payload(id, &payload)?;
        self.debouncer.discard(&id);
        Ok(self.queue_writes(vec![RowWrite::Update(id, BlockPatch::data(data))]))
    }

    /// Replace a block's payload now and persist it once edits settle.
    ///
    /// Returns true if an earlier unsaved edit was superseded.
    pub fn queue_payload(
        &mut self,
        id: BlockId,
        payload: Payload,
        now: Instant,
    ) -> Result<bool, EditError> {
        self.apply_payload(id, &payload)?;
        Ok(self.debouncer.push(id, payload, now))
    }

    /// Persist queued edits that are due at `now`.
    pub fn flush_debounced(&mut self, now: Instant) -> Vec<PendingWrite> {
        let due = self.debouncer.take_due(now);
        self.persist_payloads(due)
    }

    /// Persist every queued edit (session close).
    pub fn flush_all(&mut self) -> Vec<PendingWrite> {
        let all = self.debouncer.drain_all();
        self.persist_payloads(all)
    }

    /// When the next queued edit becomes due.
    pub fn next_flush(&self) -> Option<Instant> {
        self.debouncer.next_deadline()
    }

    fn persist_payloads(&mut self, edits: Vec<(BlockId, Payload)>) -> Vec<PendingWrite> {
        edits
            .into_iter()
            .filter_map(|(id, payload)| match payload.to_data() {
                Ok(data) => Some(self.queue_writes(vec![RowWrite::Update(id, BlockPatch::data(data))])),
                Err(e) => {
                    tracing::error!(block = %id, error = %e, "dropping unencodable payload edit");
                    None
                }
            })
            .collect()
    }

    // ========================================================================
    // Moves
    // ========================================================================

    /// Reconcile a drag gesture and apply it.
    ///
    /// Returns `None` when the gesture resolves to no change; nothing is
    /// written in that case.
    pub fn apply_drag(&mut self, gesture: &DragGesture) -> Option<PendingWrite> {
        match reconcile(&self.blocks, gesture) {
            Reconciliation::NoOp(reason) => {
                tracing::debug!(block = %gesture.source, %reason, "drag is a no-op");
                None
            }
            Reconciliation::Move(plan) => match self.move_block(plan) {
                Ok(pending) => Some(pending),
                Err(e) => {
                    tracing::warn!(block = %gesture.source, error = %e, "drag plan not applied");
                    None
                }
            },
        }
    }

    /// Apply a move plan to memory and persist it.
    ///
    /// The moved block's position, parent, and slot are one row write. A plan
    /// that rebalanced its container adds one position write per renumbered
    /// sibling.
    pub fn move_block(&mut self, plan: MovePlan) -> Result<PendingWrite, EditError> {
        if !apply_plan(&mut self.blocks, &plan) {
            return Err(EditError::UnknownBlock(plan.block_id));
        }
        tracing::debug!(
            block = %plan.block_id,
            from = %plan.from,
            to = %plan.to,
            position = plan.position,
            renumbered = plan.renumbered.len(),
            "block moved"
        );

        let mut writes = vec![RowWrite::Update(
            plan.block_id,
            BlockPatch::placement(plan.position, plan.parent_id, plan.slot),
        )];
        writes.extend(
            plan.renumbered
                .iter()
                .map(|u| RowWrite::Update(u.block_id, BlockPatch::position(u.position))),
        );

        let pending = self.queue_writes(writes);
        self.emit(BlockEvent::Moved { plan });
        Ok(pending)
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Remove a block. Children of a `columns` block are handled per the
    /// session's [`DeletePolicy`].
    pub fn delete(&mut self, id: BlockId) -> Result<PendingWrite, EditError> {
        let idx = self.index_of(&id)?;
        let removed = self.blocks.remove(idx);
        self.debouncer.discard(&id);
        self.emit(BlockEvent::Deleted { block_id: id });

        let policy = self.settings.delete_policy;
        let mut writes = vec![RowWrite::Delete(id)];
        if removed.is_columns() {
            match policy {
                DeletePolicy::Orphan => {}
                DeletePolicy::Cascade => writes.extend(self.remove_descendants(id)),
                DeletePolicy::ReparentToRoot => writes.extend(self.reparent_children(id)),
            }
        }
        tracing::debug!(block = %id, ?policy, writes = writes.len(), "block deleted");

        Ok(self.queue_writes(writes))
    }

    /// Drop every block below `root` from memory and return their deletes.
    fn remove_descendants(&mut self, root: BlockId) -> Vec<RowWrite> {
        let mut doomed = HashSet::new();
        let mut stack = vec![root];
        while let Some(parent) = stack.pop() {
            for block in &self.blocks {
                if block.parent_id == Some(parent) && doomed.insert(block.id) {
                    stack.push(block.id);
                }
            }
        }

        let mut writes = Vec::new();
        self.blocks.retain(|b| {
            if doomed.contains(&b.id) {
                writes.push(RowWrite::Delete(b.id));
                false
            } else {
                true
            }
        });
        for write in &writes {
            self.debouncer.discard(&write.block_id());
            self.emit(BlockEvent::Deleted {
                block_id: write.block_id(),
            });
        }
        writes
    }

    /// Append the direct children of `parent` to the root, left slot first.
    fn reparent_children(&mut self, parent: BlockId) -> Vec<RowWrite> {
        let (children, mut last) = {
            let map = group_by_container(&self.blocks);
            let children: Vec<(ContainerId, BlockId)> = [Slot::Left, Slot::Right]
                .into_iter()
                .flat_map(|slot| {
                    let container = ContainerId::Column {
                        parent_id: parent,
                        slot,
                    };
                    map.siblings(&container)
                        .iter()
                        .map(move |b| (container, b.id))
                        .collect::<Vec<_>>()
                })
                .collect();
            let last = map.siblings(&ContainerId::Root).last().map(|b| b.position);
            (children, last)
        };

        let mut writes = Vec::new();
        for (from, block_id) in children {
            let position = append_after(last);
            last = Some(position);
            let plan = MovePlan {
                block_id,
                from,
                to: ContainerId::Root,
                position,
                parent_id: None,
                slot: None,
                renumbered: Vec::new(),
            };
            apply_plan(&mut self.blocks, &plan);
            writes.push(RowWrite::Update(
                block_id,
                BlockPatch::placement(position, None, None),
            ));
            self.emit(BlockEvent::Moved { plan });
        }
        writes
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Queue row writes behind every earlier mutation of this session.
    fn queue_writes(&self, writes: Vec<RowWrite>) -> PendingWrite {
        let (done, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(job)) = self.write_tx.send(WriteJob { writes, done }) {
            tracing::error!(page = %self.page_id, rows = job.writes.len(), "block writer is gone");
            let _ = job
                .done
                .send(MutationOutcome::PersistFailed("block writer stopped".to_string()));
        }
        PendingWrite { rx }
    }
}

/// Drain write jobs one at a time until the session is dropped.
///
/// Rows inside a job are independent; a failure does not stop the ones after
/// it.
async fn run_writer(
    store: SharedRecordStore,
    page_id: PageId,
    event_tx: broadcast::Sender<BlockEvent>,
    mut rx: mpsc::UnboundedReceiver<WriteJob>,
) {
    while let Some(WriteJob { writes, done }) = rx.recv().await {
        let span = tracing::info_span!("store.write", page = %page_id, rows = writes.len());
        let outcome = async {
            let mut first_failure: Option<StoreError> = None;
            for write in writes {
                let block_id = write.block_id();
                let result = match write {
                    RowWrite::Update(id, patch) => store.update_block(id, patch).await,
                    RowWrite::Delete(id) => store.delete_block(id).await,
                };
                if let Err(e) = result {
                    tracing::error!(page = %page_id, block = %block_id, error = %e, "block write failed");
                    let _ = event_tx.send(BlockEvent::PersistFailed {
                        block_id,
                        reason: e.to_string(),
                    });
                    first_failure.get_or_insert(e);
                }
            }
            match first_failure {
                None => MutationOutcome::Persisted,
                Some(e) => MutationOutcome::PersistFailed(e.to_string()),
            }
        }
        .instrument(span)
        .await;
        // The caller may have dropped its handle.
        let _ = done.send(outcome);
    }
    tracing::debug!(page = %page_id, "block writer stopped");
}
