use crate::view_model::{ProgressView, RunCounters};
use crate::{Partition, PartitionPlan, RunState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Entering(Partition),
    Processing(Partition),
    Complete,
    Stopped,
}

impl Phase {
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Entering(_) | Phase::Processing(_))
    }
}

/// Controller state: the partition plan plus the run in progress, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    plan: PartitionPlan,
    run: Option<RunState>,
    phase: Phase,
}

impl Session {
    pub fn new(plan: PartitionPlan) -> Self {
        Self {
            plan,
            run: None,
            phase: Phase::Idle,
        }
    }

    pub fn plan(&self) -> &PartitionPlan {
        &self.plan
    }

    pub fn run(&self) -> Option<&RunState> {
        self.run.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn view(&self) -> ProgressView {
        let partition = match self.phase {
            Phase::Entering(p) | Phase::Processing(p) => Some(p),
            _ => None,
        };
        let completed = self
            .run
            .as_ref()
            .map_or(0, |run| run.completed_partitions.len());
        ProgressView {
            phase: self.phase,
            partition,
            completed_partitions: completed,
            total_partitions: self.plan.len(),
            counters: RunCounters::default(),
            rate_limited: false,
            wait_remaining: None,
        }
    }

    pub(crate) fn begin(&mut self, run: RunState) -> Option<Partition> {
        let current = run.current_partition(&self.plan);
        self.phase = current.map_or(Phase::Complete, Phase::Entering);
        self.run = current.map(|_| run);
        current
    }

    pub(crate) fn enter_processing(&mut self) -> Option<Partition> {
        match self.phase {
            Phase::Entering(p) => {
                self.phase = Phase::Processing(p);
                Some(p)
            }
            _ => None,
        }
    }

    /// Completes the partition being processed. Returns it together with the
    /// next partition to enter, if any remain.
    pub(crate) fn complete_current(&mut self) -> Option<(Partition, Option<Partition>)> {
        let Phase::Processing(_) = self.phase else {
            return None;
        };
        let run = self.run.as_mut()?;
        let done = run.mark_current_completed(&self.plan)?;
        let next = run.current_partition(&self.plan);
        match next {
            Some(p) => self.phase = Phase::Entering(p),
            None => {
                self.phase = Phase::Complete;
                self.run = None;
            }
        }
        Some((done, next))
    }

    pub(crate) fn halt(&mut self) {
        self.run = None;
        self.phase = Phase::Stopped;
    }
}
