use std::time::Duration;

use crate::{DeletionOutcome, Partition, Phase};

/// Running totals for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunCounters {
    pub deleted: u64,
    pub preserved: u64,
    pub skipped: u64,
    pub failed: u64,
    pub pages: u64,
}

impl RunCounters {
    pub fn record(&mut self, outcome: DeletionOutcome) {
        match outcome {
            DeletionOutcome::Deleted => self.deleted += 1,
            DeletionOutcome::Skipped(_) => self.skipped += 1,
            DeletionOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn absorb(&mut self, other: RunCounters) {
        self.deleted += other.deleted;
        self.preserved += other.preserved;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.pages += other.pages;
    }
}

/// What the control surface shows while a run is going.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressView {
    pub phase: Phase,
    pub partition: Option<Partition>,
    pub completed_partitions: usize,
    pub total_partitions: usize,
    pub counters: RunCounters,
    pub rate_limited: bool,
    pub wait_remaining: Option<Duration>,
}
