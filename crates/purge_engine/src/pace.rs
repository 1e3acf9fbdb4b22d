use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// The run was stopped while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run stopped")]
pub struct Cancelled;

/// Suspends for `duration` unless the run is stopped first. The token is
/// checked both before and after suspending.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(duration) => {
            if cancel.is_cancelled() {
                Err(Cancelled)
            } else {
                Ok(())
            }
        }
    }
}

/// Uniformly random duration in `[min, max]` at millisecond resolution.
pub fn jitter(min: Duration, max: Duration) -> Duration {
    let lo = min.as_millis() as u64;
    let hi = max.as_millis() as u64;
    if hi <= lo {
        return min;
    }
    Duration::from_millis(fastrand::u64(lo..=hi))
}

/// Uniformly random count in `[min, max]`, never below 1.
pub fn draw_count(min: u32, max: u32) -> u32 {
    let lo = min.max(1);
    if max <= lo {
        return lo;
    }
    fastrand::u32(lo..=max)
}
