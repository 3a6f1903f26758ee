//! Append-only, branching snapshot history.
//!
//! Snapshots are immutable once committed and are handed out as
//! `Arc<Snapshot>`, so readers holding one never observe a change. Ids are
//! assigned 1, 2, 3, ... in commit order; because a parent must already be
//! committed, every parent id is smaller than its child's and the history
//! order is a valid topological order of the tree.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::UiNode;

/// Snapshot identifier. The first snapshot of a session is 1.
pub type SnapshotId = u64;

/// An immutable generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    /// Base snapshot this one was generated from; `None` means "from nothing".
    pub parent_id: Option<SnapshotId>,
    pub prompt: String,
    pub code: String,
    pub plan: Option<Vec<UiNode>>,
    /// Model rationale for the change.
    pub explanation: String,
    pub created_at: DateTime<Local>,
}

impl Snapshot {
    /// Creation time in session-local `HH:MM:SS` form.
    pub fn created_at_display(&self) -> String {
        self.created_at.format("%H:%M:%S").to_string()
    }
}

/// Inputs to [`SnapshotStore::commit`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub parent_id: Option<SnapshotId>,
    pub prompt: String,
    pub code: String,
    pub plan: Option<Vec<UiNode>>,
    pub explanation: String,
}

/// Errors from store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("snapshot {0} not found")]
    NotFound(SnapshotId),
}

/// The version tree plus the active pointer.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    /// Commit order.
    history: Vec<Arc<Snapshot>>,
    /// id -> index into `history`.
    index: HashMap<SnapshotId, usize>,
    active: Option<SnapshotId>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new snapshot with the next id.
    ///
    /// Returns [`StoreError::NotFound`] if `parent_id` names a snapshot that
    /// was never committed. Does not move the active pointer.
    pub fn commit(&mut self, new: NewSnapshot) -> Result<Arc<Snapshot>, StoreError> {
        if let Some(parent) = new.parent_id {
            if !self.index.contains_key(&parent) {
                return Err(StoreError::NotFound(parent));
            }
        }

        let id = self.next_id();
        let snapshot = Arc::new(Snapshot {
            id,
            parent_id: new.parent_id,
            prompt: new.prompt,
            code: new.code,
            plan: new.plan,
            explanation: new.explanation,
            created_at: Local::now(),
        });

        self.index.insert(id, self.history.len());
        self.history.push(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// The id the next commit will receive.
    pub fn next_id(&self) -> SnapshotId {
        self.history.len() as SnapshotId + 1
    }

    pub fn get(&self, id: SnapshotId) -> Option<&Arc<Snapshot>> {
        self.index.get(&id).map(|&i| &self.history[i])
    }

    /// Point future generations at `id`, or at nothing with `None`.
    pub fn set_active(&mut self, id: Option<SnapshotId>) -> Result<(), StoreError> {
        if let Some(id) = id {
            if !self.index.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
        }
        self.active = id;
        Ok(())
    }

    pub fn active_id(&self) -> Option<SnapshotId> {
        self.active
    }

    pub fn active(&self) -> Option<&Arc<Snapshot>> {
        self.active.and_then(|id| self.get(id))
    }

    /// Every committed snapshot, in commit order.
    pub fn history(&self) -> &[Arc<Snapshot>] {
        &self.history
    }

    /// Direct children of `id`, in commit order. More than one means a fork.
    pub fn children(&self, id: SnapshotId) -> Vec<&Arc<Snapshot>> {
        self.history
            .iter()
            .filter(|s| s.parent_id == Some(id))
            .collect()
    }

    /// Snapshots with no parent, in commit order.
    pub fn roots(&self) -> Vec<&Arc<Snapshot>> {
        self.history.iter().filter(|s| s.parent_id.is_none()).collect()
    }

    /// The chain from the root down to `id`, inclusive.
    pub fn lineage(&self, id: SnapshotId) -> Result<Vec<&Arc<Snapshot>>, StoreError> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let snapshot = self.get(current).ok_or(StoreError::NotFound(current))?;
            chain.push(snapshot);
            cursor = snapshot.parent_id;
        }
        chain.reverse();
        Ok(chain)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
