use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use purge_core::{RateLimitPolicy, RateLimitState, Signal};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::pace::{pause, Cancelled};
use crate::{EngineEvent, NullSink, ProgressSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub active: bool,
    pub multiplier: u32,
    pub remaining: Option<Duration>,
}

/// Gates every outbound action behind the shared throttling state.
///
/// Clones share state, so the transport decorator and the executor observe
/// the same limiter.
#[derive(Clone)]
pub struct Governor {
    state: Arc<Mutex<RateLimitState>>,
    sink: Arc<dyn ProgressSink>,
}

impl Governor {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimitState::new(policy))),
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    fn now() -> std::time::Instant {
        Instant::now().into_std()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn observe(&self, signal: Signal) {
        let mut state = self.lock();
        state.observe(signal, Self::now());
        if signal == Signal::Throttled {
            engine_warn!(
                "throttled by remote, multiplier={} wait={:?}",
                state.multiplier(),
                state.effective_wait()
            );
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        let state = self.lock();
        RateLimitSnapshot {
            active: state.is_active(),
            multiplier: state.multiplier(),
            remaining: state.remaining(Self::now()),
        }
    }

    /// Suspends until the current backoff has elapsed, re-checking on the
    /// policy's polling interval. Returns `Err(Cancelled)` as soon as the run
    /// is stopped.
    pub async fn gate(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let mut announced = false;
        loop {
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }
            let (remaining, poll) = {
                let mut state = self.lock();
                let now = Self::now();
                let remaining = state.remaining(now);
                if remaining.is_none() {
                    if state.is_active() {
                        engine_info!("rate limit wait elapsed, resuming");
                    }
                    state.try_clear(now);
                    return Ok(());
                }
                (remaining, state.policy().poll_interval)
            };
            if !announced {
                if let Some(wait) = remaining {
                    engine_debug!("gate holding for {wait:?}");
                    self.sink.emit(EngineEvent::RateLimited { wait });
                }
                announced = true;
            }
            pause(poll, cancel).await?;
        }
    }
}
