use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use purge_core::RateLimitPolicy;

/// Wall-clock source used to judge item age.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct EngineConfig {
    pub rate_limit: RateLimitPolicy,
    /// How long an empty page may still be loading before it counts as empty.
    pub page_load_timeout: Duration,
    pub page_load_poll: Duration,
    /// Pause after each confirmed deletion.
    pub confirm_delay: Duration,
    pub retry_cooldown_min: Duration,
    pub retry_cooldown_max: Duration,
    /// A long pause is taken after a random number of deletions in this range.
    pub burst_min: u32,
    pub burst_max: u32,
    pub burst_pause_min: Duration,
    pub burst_pause_max: Duration,
    /// Delay between consecutive page passes over one partition.
    pub page_delay: Duration,
    /// Cooldown after an unexpected fault before the same step is retried.
    pub fault_cooldown: Duration,
    /// Items whose text contains any of these markers are never deleted.
    pub markers: Vec<String>,
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitPolicy::default(),
            page_load_timeout: Duration::from_secs(8),
            page_load_poll: Duration::from_millis(500),
            confirm_delay: Duration::from_secs(1),
            retry_cooldown_min: Duration::from_secs(5),
            retry_cooldown_max: Duration::from_secs(30),
            burst_min: 10,
            burst_max: 20,
            burst_pause_min: Duration::from_secs(10),
            burst_pause_max: Duration::from_secs(15),
            page_delay: Duration::from_secs(2),
            fault_cooldown: Duration::from_secs(10),
            markers: Vec::new(),
            clock: Arc::new(Utc::now),
        }
    }
}
