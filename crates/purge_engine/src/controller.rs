use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_error, engine_info, engine_warn};
use purge_core::{update, Effect, Msg, PartitionPlan, RunCounters, Session};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::pace::{pause, Cancelled};

/// How often a failed cursor cleanup is retried after the run has ended.
const CLEANUP_ATTEMPTS: u32 = 5;
use crate::page::PageError;
use crate::{
    ContentSource, CursorStore, DeletionActions, DeletionExecutor, EngineConfig, EngineEvent,
    Governor, Navigation, PageProcessor, PersistError, ProgressSink, RunEnd, SourceError,
};

/// Anything that interrupts a controller step.
#[derive(Debug, Error)]
pub enum EngineFault {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl From<PageError> for EngineFault {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Source(err) => EngineFault::Source(err),
            PageError::Cancelled(err) => EngineFault::Cancelled(err),
        }
    }
}

/// Collaborators the controller drives.
pub struct EngineParts {
    pub plan: PartitionPlan,
    pub source: Box<dyn ContentSource>,
    pub actions: Arc<dyn DeletionActions>,
    pub store: Box<dyn CursorStore>,
    pub governor: Governor,
    pub config: EngineConfig,
}

/// Top-level state machine. Cycles through every partition of the plan,
/// processing pages until each one is exhausted, and persists the cursor on
/// every transition.
///
/// Transitions come from [`purge_core::update`]; this type only carries out
/// the resulting effects. Faults never end a run: they are logged, followed
/// by a cooldown, and the failed step is retried. Only cancellation stops it.
pub struct Controller {
    session: Session,
    source: Box<dyn ContentSource>,
    actions: Arc<dyn DeletionActions>,
    store: Box<dyn CursorStore>,
    governor: Governor,
    sink: Arc<dyn ProgressSink>,
    config: EngineConfig,
    processor: Option<PageProcessor>,
    queue: VecDeque<Effect>,
    counters: RunCounters,
}

impl Controller {
    pub fn new(parts: EngineParts, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            session: Session::new(parts.plan),
            source: parts.source,
            actions: parts.actions,
            store: parts.store,
            governor: parts.governor,
            sink,
            config: parts.config,
            processor: None,
            queue: VecDeque::new(),
            counters: RunCounters::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    /// Resumes the persisted run if the cursor says one is in progress,
    /// otherwise starts a fresh run with `preserve_window`. Returns once every
    /// partition is done or `cancel` fires.
    pub async fn run(&mut self, preserve_window: Duration, cancel: &CancellationToken) -> RunEnd {
        self.counters = RunCounters::default();
        self.processor = None;
        self.queue.clear();

        let first = match self.store.load() {
            Ok(Some(state)) if state.running => Msg::Resume(state),
            Ok(_) => Msg::StartRequested { preserve_window },
            Err(err) => {
                engine_warn!("ignoring unreadable cursor: {err}");
                Msg::StartRequested { preserve_window }
            }
        };
        self.dispatch(first);

        let mut cleanup_failures = 0;
        loop {
            if cancel.is_cancelled() && self.session.phase().is_active() {
                self.request_stop();
            }
            let Some(effect) = self.queue.pop_front() else {
                engine_warn!("controller has nothing left to do");
                return self.finish(RunEnd::Stopped);
            };
            match self.apply(&effect, cancel).await {
                Ok(Some(end)) => return self.finish(end),
                Ok(None) => {}
                Err(EngineFault::Cancelled(_)) => self.request_stop(),
                Err(fault) => {
                    engine_error!("{fault} while handling {effect:?}");
                    if !self.session.phase().is_active() {
                        // Complete or stopped: only the cursor cleanup is left.
                        cleanup_failures += 1;
                        self.retry_cleanup(effect, cleanup_failures).await;
                        continue;
                    }
                    engine_info!("cooling down {:?} before retrying", self.config.fault_cooldown);
                    if pause(self.config.fault_cooldown, cancel).await.is_err() {
                        self.request_stop();
                        continue;
                    }
                    self.queue.push_front(effect);
                }
            }
        }
    }

    /// A stopped or finished run must not leave a running cursor behind, so
    /// cursor writes are retried even though the stop token has fired. The
    /// wait therefore ignores cancellation.
    async fn retry_cleanup(&mut self, effect: Effect, failures: u32) {
        if !matches!(effect, Effect::ClearCursor | Effect::PersistCursor(_)) {
            return;
        }
        if failures >= CLEANUP_ATTEMPTS {
            engine_error!("giving up on {effect:?} after {failures} attempts; the cursor may still say running");
            return;
        }
        engine_info!("retrying {effect:?} in {:?}", self.config.fault_cooldown);
        tokio::time::sleep(self.config.fault_cooldown).await;
        self.queue.push_front(effect);
    }

    fn dispatch(&mut self, msg: Msg) {
        let (session, effects) = update(self.session.clone(), msg);
        self.session = session;
        self.queue.extend(effects);
        self.emit_progress();
    }

    fn request_stop(&mut self) {
        if self.session.phase().is_active() {
            engine_info!("stop requested, abandoning current partition");
            self.queue.clear();
        }
        self.dispatch(Msg::StopRequested);
    }

    fn finish(&mut self, end: RunEnd) -> RunEnd {
        engine_info!(
            "run finished: {end:?} deleted={} preserved={} skipped={}",
            self.counters.deleted,
            self.counters.preserved,
            self.counters.skipped
        );
        self.sink.emit(EngineEvent::Finished(end));
        end
    }

    fn emit_progress(&self) {
        let mut view = self.session.view();
        let limiter = self.governor.snapshot();
        view.counters = self.counters;
        view.rate_limited = limiter.active;
        view.wait_remaining = limiter.remaining;
        self.sink.emit(EngineEvent::Progress(view));
    }

    async fn apply(
        &mut self,
        effect: &Effect,
        cancel: &CancellationToken,
    ) -> Result<Option<RunEnd>, EngineFault> {
        match effect {
            Effect::PersistCursor(run) => self.store.save(run)?,
            Effect::ClearCursor => self.store.clear()?,
            Effect::NavigateTo(partition) => {
                self.governor.gate(cancel).await?;
                if self.source.current_partition().await == Some(*partition) {
                    self.dispatch(Msg::Positioned);
                } else {
                    engine_info!("navigating to partition {partition}");
                    match self.source.navigate_to(*partition).await? {
                        Navigation::Positioned => self.dispatch(Msg::Positioned),
                        Navigation::Reloaded => self.rederive_after_reload()?,
                    }
                }
            }
            Effect::ProcessPartition(partition) => {
                self.process_partition(cancel).await?;
                engine_info!("partition {partition} exhausted");
                self.dispatch(Msg::PartitionExhausted);
            }
            Effect::PartitionDone(partition) => {
                self.sink.emit(EngineEvent::PartitionCompleted(*partition));
            }
            Effect::RunComplete => return Ok(Some(RunEnd::Complete)),
            Effect::Halted => return Ok(Some(RunEnd::Stopped)),
        }
        Ok(None)
    }

    /// A reload may mean this is effectively a new process: trust only the
    /// persisted cursor.
    fn rederive_after_reload(&mut self) -> Result<(), EngineFault> {
        self.processor = None;
        match self.store.load()? {
            Some(state) if state.running => {
                engine_info!("source reloaded, resuming from persisted cursor");
                self.dispatch(Msg::Resume(state));
            }
            _ => {
                engine_warn!("source reloaded and no running cursor remains, stopping");
                self.request_stop();
            }
        }
        Ok(())
    }

    async fn process_partition(&mut self, cancel: &CancellationToken) -> Result<(), EngineFault> {
        let Some(window) = self.session.run().map(|run| run.preserve_window) else {
            return Ok(());
        };
        if self.processor.as_ref().map(PageProcessor::preserve_window) != Some(window) {
            let executor = DeletionExecutor::new(
                self.actions.clone(),
                self.governor.clone(),
                self.sink.clone(),
                &self.config,
            );
            self.processor = Some(PageProcessor::new(
                executor,
                self.governor.clone(),
                window,
                &self.config,
            ));
        }

        loop {
            let report = match self.processor.as_mut() {
                Some(processor) => {
                    processor
                        .process_one_page(self.source.as_mut(), &mut self.counters, cancel)
                        .await?
                }
                None => return Ok(()),
            };
            self.emit_progress();
            if !report.advanced {
                return Ok(());
            }
            pause(self.config.page_delay, cancel).await?;
        }
    }
}
