//! `purge.ron`: everything the binary needs to build an engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use engine_logging::engine_info;
use purge_core::{Partition, PartitionPlan, PlanError, RateLimitPolicy};
use purge_engine::{EngineConfig, TransportSettings};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "purge.ron";

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub listing_path: String,
    pub items_path: String,
    pub page_size: Option<u32>,
    pub partitions: Vec<Partition>,
    pub preserve_days: u32,
    pub cursor_path: PathBuf,
    /// Items whose text contains any of these are never deleted.
    pub markers: Vec<String>,
    pub timings: Timings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: TransportSettings::default().base_url,
            listing_path: "listing".to_string(),
            items_path: "items".to_string(),
            page_size: None,
            partitions: Partition::ALL.to_vec(),
            preserve_days: 10,
            cursor_path: PathBuf::from(".purge.cursor"),
            markers: Vec::new(),
            timings: Timings::default(),
        }
    }
}

/// Every delay in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub rate_limit_base_ms: u64,
    pub rate_limit_max_ms: u64,
    pub rate_limit_poll_ms: u64,
    pub page_load_timeout_ms: u64,
    pub page_load_poll_ms: u64,
    pub confirm_delay_ms: u64,
    pub retry_cooldown_min_ms: u64,
    pub retry_cooldown_max_ms: u64,
    pub burst_min: u32,
    pub burst_max: u32,
    pub burst_pause_min_ms: u64,
    pub burst_pause_max_ms: u64,
    pub page_delay_ms: u64,
    pub fault_cooldown_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

fn ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl Default for Timings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        let transport = TransportSettings::default();
        Self {
            rate_limit_base_ms: ms(engine.rate_limit.base_wait),
            rate_limit_max_ms: ms(engine.rate_limit.max_wait),
            rate_limit_poll_ms: ms(engine.rate_limit.poll_interval),
            page_load_timeout_ms: ms(engine.page_load_timeout),
            page_load_poll_ms: ms(engine.page_load_poll),
            confirm_delay_ms: ms(engine.confirm_delay),
            retry_cooldown_min_ms: ms(engine.retry_cooldown_min),
            retry_cooldown_max_ms: ms(engine.retry_cooldown_max),
            burst_min: engine.burst_min,
            burst_max: engine.burst_max,
            burst_pause_min_ms: ms(engine.burst_pause_min),
            burst_pause_max_ms: ms(engine.burst_pause_max),
            page_delay_ms: ms(engine.page_delay),
            fault_cooldown_ms: ms(engine.fault_cooldown),
            connect_timeout_ms: ms(transport.connect_timeout),
            request_timeout_ms: ms(transport.request_timeout),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or `purge.ron` in the working directory when no path is
    /// given. Only the implicit file may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = ron::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        engine_info!("loaded config from {:?}", path);
        Ok(config)
    }

    pub fn plan(&self) -> Result<PartitionPlan, PlanError> {
        PartitionPlan::new(self.partitions.clone())
    }

    pub fn preserve_window(&self) -> Duration {
        Duration::from_secs(u64::from(self.preserve_days) * SECONDS_PER_DAY)
    }

    pub fn engine_config(&self) -> EngineConfig {
        let t = &self.timings;
        EngineConfig {
            rate_limit: RateLimitPolicy {
                base_wait: Duration::from_millis(t.rate_limit_base_ms),
                max_wait: Duration::from_millis(t.rate_limit_max_ms),
                poll_interval: Duration::from_millis(t.rate_limit_poll_ms),
            },
            page_load_timeout: Duration::from_millis(t.page_load_timeout_ms),
            page_load_poll: Duration::from_millis(t.page_load_poll_ms),
            confirm_delay: Duration::from_millis(t.confirm_delay_ms),
            retry_cooldown_min: Duration::from_millis(t.retry_cooldown_min_ms),
            retry_cooldown_max: Duration::from_millis(t.retry_cooldown_max_ms),
            burst_min: t.burst_min,
            burst_max: t.burst_max,
            burst_pause_min: Duration::from_millis(t.burst_pause_min_ms),
            burst_pause_max: Duration::from_millis(t.burst_pause_max_ms),
            page_delay: Duration::from_millis(t.page_delay_ms),
            fault_cooldown: Duration::from_millis(t.fault_cooldown_ms),
            markers: self.markers.clone(),
            ..EngineConfig::default()
        }
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_millis(self.timings.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.timings.request_timeout_ms),
            ..TransportSettings::default()
        }
    }
}
