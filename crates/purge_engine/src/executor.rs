use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use purge_core::{Candidate, DeletionOutcome, FailReason, SkipReason};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pace::{jitter, pause, Cancelled};
use crate::{DeletionActions, EngineConfig, EngineEvent, Governor, ProgressSink, TransportError};

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

#[derive(Debug, Clone, Copy)]
struct ExecutorTiming {
    confirm_delay: Duration,
    cooldown_min: Duration,
    cooldown_max: Duration,
}

/// Drives the begin → confirm protocol for one candidate.
///
/// This is the only place a destructive request is issued. It trusts the
/// caller to have filtered out protected candidates.
pub struct DeletionExecutor {
    actions: Arc<dyn DeletionActions>,
    governor: Governor,
    sink: Arc<dyn ProgressSink>,
    timing: ExecutorTiming,
}

impl DeletionExecutor {
    pub fn new(
        actions: Arc<dyn DeletionActions>,
        governor: Governor,
        sink: Arc<dyn ProgressSink>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            actions,
            governor,
            sink,
            timing: ExecutorTiming {
                confirm_delay: config.confirm_delay,
                cooldown_min: config.retry_cooldown_min,
                cooldown_max: config.retry_cooldown_max,
            },
        }
    }

    /// Retries through transport faults until the item is deleted, turns out
    /// not to be deletable, or the run is stopped.
    pub async fn execute(&self, candidate: &Candidate, cancel: &CancellationToken) -> DeletionOutcome {
        let mut attempt: u32 = 0;
        let outcome = loop {
            attempt += 1;
            match self.attempt(candidate, cancel).await {
                Ok(outcome) => break outcome,
                Err(AttemptError::Cancelled(_)) => break DeletionOutcome::Failed(FailReason::Stopped),
                Err(AttemptError::Transport(err))
                    if err.is_throttled() && self.governor.snapshot().active =>
                {
                    // The next attempt starts at the gate, which holds until the wait is over.
                    engine_debug!("delete of {} throttled on attempt {attempt}", candidate.handle);
                }
                Err(AttemptError::Transport(err)) => {
                    let cooldown = jitter(self.timing.cooldown_min, self.timing.cooldown_max);
                    engine_warn!(
                        "delete of {} failed on attempt {attempt}: {err}; retrying in {cooldown:?}",
                        candidate.handle
                    );
                    self.sink.emit(EngineEvent::ItemRetrying {
                        handle: candidate.handle.clone(),
                        attempt,
                        message: err.to_string(),
                    });
                    if pause(cooldown, cancel).await.is_err() {
                        break DeletionOutcome::Failed(FailReason::Stopped);
                    }
                }
            }
        };

        match outcome {
            DeletionOutcome::Deleted => engine_debug!("deleted {}", candidate.handle),
            other => engine_info!("{}: {other}", candidate.handle),
        }
        self.sink.emit(EngineEvent::ItemFinished {
            handle: candidate.handle.clone(),
            outcome,
        });
        outcome
    }

    async fn attempt(
        &self,
        candidate: &Candidate,
        cancel: &CancellationToken,
    ) -> Result<DeletionOutcome, AttemptError> {
        self.governor.gate(cancel).await?;
        let Some(confirmation) = self.actions.begin_delete(candidate).await? else {
            return Ok(DeletionOutcome::Skipped(SkipReason::NoConfirmation));
        };
        self.actions.confirm_delete(candidate, confirmation).await?;
        // Already deleted remotely; a stop during the pacing delay changes nothing.
        let _ = pause(self.timing.confirm_delay, cancel).await;
        Ok(DeletionOutcome::Deleted)
    }
}
