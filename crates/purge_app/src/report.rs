//! Turns engine events into the lines the operator sees.

use std::time::Duration;

use purge_core::{DeletionOutcome, Partition, PartitionPlan, Phase, ProgressView, RunState};
use purge_engine::{EngineEvent, RunEnd};

/// Remembers what was last shown so progress is only printed when it changes.
#[derive(Debug, Default)]
pub struct Reporter {
    last_partition: Option<Partition>,
    last_view: ProgressView,
}

impl Reporter {
    pub fn line_for(&mut self, event: &EngineEvent) -> Option<String> {
        match event {
            EngineEvent::Progress(view) => {
                let line = self.progress_line(view);
                self.last_view = view.clone();
                line
            }
            EngineEvent::RateLimited { wait } => {
                Some(format!("rate limited, waiting {}", human(*wait)))
            }
            EngineEvent::PartitionCompleted(partition) => Some(format!(
                "partition {partition} done ({} deleted so far)",
                self.last_view.counters.deleted
            )),
            EngineEvent::ItemFinished { handle, outcome } => match outcome {
                DeletionOutcome::Deleted => None,
                other => Some(format!("{handle}: {other}")),
            },
            EngineEvent::ItemRetrying {
                handle,
                attempt,
                message,
            } => Some(format!("{handle}: attempt {attempt} failed ({message}), retrying")),
            EngineEvent::Finished(end) => Some(self.summary(*end)),
        }
    }

    fn progress_line(&mut self, view: &ProgressView) -> Option<String> {
        let Phase::Processing(partition) = view.phase else {
            return None;
        };
        if self.last_partition == Some(partition) {
            return None;
        }
        self.last_partition = Some(partition);
        Some(format!(
            "working on {partition} ({}/{})",
            view.completed_partitions + 1,
            view.total_partitions
        ))
    }

    fn summary(&self, end: RunEnd) -> String {
        let c = self.last_view.counters;
        let verdict = match end {
            RunEnd::Complete => "run complete",
            RunEnd::Stopped => "run stopped",
        };
        format!(
            "{verdict}: {} deleted, {} preserved, {} skipped, {} pages",
            c.deleted, c.preserved, c.skipped, c.pages
        )
    }
}

/// One-line description of a persisted cursor for `purge status`.
pub fn describe_cursor(state: Option<&RunState>, plan: &PartitionPlan) -> String {
    let Some(state) = state else {
        return "no run in progress".to_string();
    };
    if state.is_complete(plan) {
        return "previous run finished every partition".to_string();
    }
    let days = state.preserve_window.as_secs_f64() / 86_400.0;
    match state.current_partition(plan) {
        Some(partition) if state.running => format!(
            "run in progress at {partition} ({} of {} partitions done), preserving the last {days} days",
            state.completed_partitions.len(),
            plan.len()
        ),
        _ => "no run in progress (stale cursor)".to_string(),
    }
}

fn human(wait: Duration) -> String {
    let secs = wait.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
