/// Current selection, shared with background readers
///
/// The facade owns the write side. Anyone else (a control-plane thread, for
/// instance) gets a cloned `SelectionHandle` and reads whole snapshots.

use crate::model::{AssetRecord, TaskRecord};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Selected asset and task as plain records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub asset: Option<AssetRecord>,
    pub task: Option<TaskRecord>,
}

/// Read handle on the selection
#[derive(Debug, Clone, Default)]
pub struct SelectionHandle {
    inner: Arc<RwLock<SelectionSnapshot>>,
}

impl SelectionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.inner.read().clone()
    }

    pub fn asset(&self) -> Option<AssetRecord> {
        self.inner.read().asset.clone()
    }

    pub fn task(&self) -> Option<TaskRecord> {
        self.inner.read().task.clone()
    }

    pub(crate) fn publish_asset(&self, asset: Option<AssetRecord>) {
        self.inner.write().asset = asset;
    }

    pub(crate) fn publish_task(&self, task: Option<TaskRecord>) {
        self.inner.write().task = task;
    }

    pub(crate) fn clear(&self) {
        *self.inner.write() = SelectionSnapshot::default();
    }
}
