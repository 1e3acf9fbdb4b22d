use std::collections::BTreeSet;
use std::time::Duration;

use crate::{Partition, PartitionPlan};

/// Progress of a single run, owned and mutated only by the controller.
///
/// `current_partition_index` always points at the first partition of the plan
/// that is not in `completed_partitions`; when every partition is done it
/// equals the plan length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub running: bool,
    pub current_partition_index: usize,
    pub preserve_window: Duration,
    pub completed_partitions: BTreeSet<Partition>,
}

impl RunState {
    pub fn start(preserve_window: Duration) -> Self {
        Self {
            running: true,
            current_partition_index: 0,
            preserve_window,
            completed_partitions: BTreeSet::new(),
        }
    }

    /// Rebuilds a running state positioned at `index`; every partition ordered
    /// before it counts as completed.
    pub fn resume(plan: &PartitionPlan, index: usize, preserve_window: Duration) -> Self {
        let index = index.min(plan.len());
        Self {
            running: true,
            current_partition_index: index,
            preserve_window,
            completed_partitions: plan.iter().take(index).collect(),
        }
    }

    pub fn current_partition(&self, plan: &PartitionPlan) -> Option<Partition> {
        plan.get(self.current_partition_index)
    }

    pub fn is_complete(&self, plan: &PartitionPlan) -> bool {
        plan.iter().all(|p| self.completed_partitions.contains(&p))
    }

    /// Marks the current partition done and moves to the next one not yet
    /// completed. Returns the partition that was marked.
    pub fn mark_current_completed(&mut self, plan: &PartitionPlan) -> Option<Partition> {
        let current = self.current_partition(plan)?;
        self.completed_partitions.insert(current);
        self.current_partition_index = plan
            .iter()
            .position(|p| !self.completed_partitions.contains(&p))
            .unwrap_or(plan.len());
        Some(current)
    }
}
