use std::time::Duration;

use purge_core::{DeletionOutcome, ItemHandle, Partition, ProgressView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Every partition was exhausted.
    Complete,
    /// The operator stopped the run.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(ProgressView),
    RateLimited { wait: Duration },
    PartitionCompleted(Partition),
    ItemFinished {
        handle: ItemHandle,
        outcome: DeletionOutcome,
    },
    ItemRetrying {
        handle: ItemHandle,
        attempt: u32,
        message: String,
    },
    Finished(RunEnd),
}

/// Receives engine events for presentation.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Drops every event.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}
