use super::{DisplaySink, RenderPolicy};
use crate::error::{ProviderError, TransportError};
use crate::state::SnapshotCell;
use crate::types::{PlaybackState, Snapshot};

/// Publishes every observation into the cell the HTTP layer reads.
#[derive(Clone)]
pub struct WebSink {
    cell: SnapshotCell,
}

impl WebSink {
    pub fn new(cell: SnapshotCell) -> Self {
        Self { cell }
    }
}

impl DisplaySink for WebSink {
    fn name(&self) -> &'static str {
        "web"
    }

    fn policy(&self) -> RenderPolicy {
        // The page polls on its own and needs fresh progress values
        RenderPolicy::EveryTick
    }

    fn render(&mut self, state: Option<&PlaybackState>) -> Result<(), TransportError> {
        self.cell.store(Snapshot::from_state(state));
        Ok(())
    }

    fn record_failure(&mut self, err: &ProviderError) {
        self.cell.store(Snapshot::Failed(err.to_string()));
    }
}
