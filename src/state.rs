use parking_lot::RwLock;
use std::sync::Arc;

use crate::types::Snapshot;

/// Single-slot cell holding the latest [`Snapshot`].
///
/// Writers replace the whole snapshot; readers get a shared handle to an
/// immutable value, so a reader never observes a half-written state.
#[derive(Clone, Default)]
pub struct SnapshotCell {
    slot: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        *self.slot.write() = next;
    }

    pub fn load(&self) -> Arc<Snapshot> {
        self.slot.read().clone()
    }
}
