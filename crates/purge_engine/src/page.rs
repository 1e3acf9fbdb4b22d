use std::collections::HashSet;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use purge_core::{
    Candidate, DeletionOutcome, EligibilityFilter, ItemHandle, MarkerRule, RunCounters, Verdict,
};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Clock;
use crate::pace::{draw_count, jitter, pause, Cancelled};
use crate::{ContentSource, DeletionExecutor, EngineConfig, Governor, SourceError};

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Result of one pass over the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageReport {
    /// A deletion or a pagination step happened.
    pub advanced: bool,
    pub found: usize,
    pub counters: RunCounters,
}

#[derive(Debug, Clone, Copy)]
struct PageTiming {
    load_timeout: Duration,
    load_poll: Duration,
    burst_min: u32,
    burst_max: u32,
    burst_pause_min: Duration,
    burst_pause_max: Duration,
}

/// Works through the current page of the current partition.
///
/// Besides the reactive governor it takes a long randomized pause after
/// every few deletions, since short bursts are what remote limiters punish.
pub struct PageProcessor {
    executor: DeletionExecutor,
    governor: Governor,
    filter: EligibilityFilter,
    preserve_window: Duration,
    clock: Clock,
    timing: PageTiming,
    /// Protected items already counted; they reappear on every pass.
    preserved: HashSet<ItemHandle>,
    /// Items that offered no confirmation; not worth asking again this run.
    skipped: HashSet<ItemHandle>,
    since_pause: u32,
    pause_after: u32,
}

impl PageProcessor {
    pub fn new(
        executor: DeletionExecutor,
        governor: Governor,
        preserve_window: Duration,
        config: &EngineConfig,
    ) -> Self {
        let mut filter = EligibilityFilter::new(preserve_window);
        if !config.markers.is_empty() {
            filter = filter.with_rule(MarkerRule::new(&config.markers));
        }
        Self {
            executor,
            governor,
            filter,
            preserve_window,
            clock: config.clock.clone(),
            timing: PageTiming {
                load_timeout: config.page_load_timeout,
                load_poll: config.page_load_poll,
                burst_min: config.burst_min,
                burst_max: config.burst_max,
                burst_pause_min: config.burst_pause_min,
                burst_pause_max: config.burst_pause_max,
            },
            preserved: HashSet::new(),
            skipped: HashSet::new(),
            since_pause: 0,
            pause_after: draw_count(config.burst_min, config.burst_max),
        }
    }

    pub fn preserve_window(&self) -> Duration {
        self.preserve_window
    }

    /// One pass over the current page. Counts are added to `totals` as they
    /// happen, including those of a pass cut short by a stop or a fault.
    pub async fn process_one_page(
        &mut self,
        source: &mut dyn ContentSource,
        totals: &mut RunCounters,
        cancel: &CancellationToken,
    ) -> Result<PageReport, PageError> {
        let mut report = PageReport::default();
        let result = self.pass(source, &mut report, cancel).await;
        totals.absorb(report.counters);
        result.map(|()| report)
    }

    async fn pass(
        &mut self,
        source: &mut dyn ContentSource,
        report: &mut PageReport,
        cancel: &CancellationToken,
    ) -> Result<(), PageError> {
        self.governor.gate(cancel).await?;
        let candidates = self.wait_for_candidates(source, cancel).await?;

        report.found = candidates.len();
        let now = (self.clock)();
        let mut eligible = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.skipped.contains(&candidate.handle) {
                continue;
            }
            match self.filter.evaluate(&candidate, now) {
                Verdict::Eligible => eligible.push(candidate),
                Verdict::Protected { rule } => {
                    if self.preserved.insert(candidate.handle.clone()) {
                        engine_debug!("preserving {} ({rule})", candidate.handle);
                        report.counters.preserved += 1;
                    }
                }
            }
        }

        for candidate in &eligible {
            self.governor.gate(cancel).await?;
            let outcome = self.executor.execute(candidate, cancel).await;
            report.counters.record(outcome);
            match outcome {
                DeletionOutcome::Deleted => self.after_deletion(cancel).await?,
                DeletionOutcome::Failed(_) => return Err(Cancelled.into()),
                DeletionOutcome::Skipped(_) => {
                    self.skipped.insert(candidate.handle.clone());
                }
            }
        }

        self.governor.gate(cancel).await?;
        let paginated = if source.has_next_page().await {
            source.go_to_next_page().await?;
            true
        } else if source.has_more_to_load().await {
            source.load_more().await?;
            true
        } else {
            false
        };
        if paginated {
            report.counters.pages += 1;
        }

        report.advanced = paginated || report.counters.deleted > 0;
        engine_debug!(
            "page pass: found={} deleted={} preserved={} skipped={} paginated={paginated}",
            report.found,
            report.counters.deleted,
            report.counters.preserved,
            report.counters.skipped
        );
        Ok(())
    }

    /// An empty page may only mean rendering lags behind navigation, so keep
    /// looking while the source says it is loading, up to the load timeout.
    async fn wait_for_candidates(
        &self,
        source: &mut dyn ContentSource,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>, PageError> {
        let mut candidates = self.list_when_allowed(source, cancel).await?;
        let deadline = Instant::now() + self.timing.load_timeout;
        while candidates.is_empty() && source.is_loading().await && Instant::now() < deadline {
            pause(self.timing.load_poll, cancel).await?;
            candidates = self.list_when_allowed(source, cancel).await?;
        }
        Ok(candidates)
    }

    /// A throttled listing is not a fault: wait on the gate and ask again.
    /// Without an active limiter there is nothing to wait for, and the
    /// refusal goes to the caller like any other source error.
    async fn list_when_allowed(
        &self,
        source: &mut dyn ContentSource,
        cancel: &CancellationToken,
    ) -> Result<Vec<Candidate>, PageError> {
        loop {
            match source.list_candidates().await {
                Err(SourceError::Throttled) if self.governor.snapshot().active => {
                    engine_debug!("listing throttled, waiting on the rate limit");
                    self.governor.gate(cancel).await?;
                }
                result => return Ok(result?),
            }
        }
    }

    async fn after_deletion(&mut self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        self.since_pause += 1;
        if self.since_pause < self.pause_after {
            return Ok(());
        }
        let rest = jitter(self.timing.burst_pause_min, self.timing.burst_pause_max);
        engine_info!("{} deletions in a row, resting {rest:?}", self.since_pause);
        self.since_pause = 0;
        self.pause_after = draw_count(self.timing.burst_min, self.timing.burst_max);
        pause(rest, cancel).await
    }
}
