#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use purge_core::{Candidate, Partition, RateLimitPolicy, Signal};
use purge_engine::{
    Confirmation, ContentSource, DeletionActions, EngineConfig, EngineEvent, Governor,
    Navigation, ProgressSink, SourceError, TransportError, TransportErrorKind, THROTTLED_STATUS,
};
use tokio_util::sync::CancellationToken;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn aged(id: &str, days: i64) -> Candidate {
    let created = now() - ChronoDuration::days(days);
    Candidate::new(id, Some(&created.to_rfc3339()))
}

pub const TEN_DAYS: Duration = Duration::from_secs(10 * 86_400);

/// Short timings and a frozen clock. Tests run on paused tokio time, so the
/// absolute values only matter for ordering.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        rate_limit: RateLimitPolicy {
            base_wait: Duration::from_secs(60),
            max_wait: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
        },
        page_load_timeout: Duration::from_secs(8),
        page_load_poll: Duration::from_millis(500),
        confirm_delay: Duration::from_millis(100),
        retry_cooldown_min: Duration::from_secs(5),
        retry_cooldown_max: Duration::from_secs(30),
        burst_min: 10,
        burst_max: 20,
        burst_pause_min: Duration::from_secs(10),
        burst_pause_max: Duration::from_secs(15),
        page_delay: Duration::from_millis(200),
        fault_cooldown: Duration::from_secs(10),
        markers: Vec::new(),
        clock: Arc::new(now),
    }
}

/// The remote account as the fakes see it. Every partition is a different
/// view of the same items, so deleting removes an item from all of them.
#[derive(Default)]
pub struct World {
    pub pages: BTreeMap<Partition, Vec<Vec<Candidate>>>,
    pub undeletable: HashSet<String>,
    pub begin_calls: Vec<String>,
    pub deleted: Vec<String>,
    pub navigations: Vec<Partition>,
    pub list_calls: usize,
    pub begin_faults: u32,
    pub list_faults: u32,
    pub reload_next_navigation: bool,
    /// Pages report "loading" and empty for this many list calls.
    pub loading_lists: u32,
    last_list_was_loading: bool,
    pub stop_after_deletions: Option<(usize, CancellationToken)>,
    /// The limiter a remote refusal is reported to, as the governed
    /// transport would.
    pub governor: Option<Governor>,
    pub throttled_lists: u32,
    pub throttled_begins: u32,
}

impl World {
    fn throttle(&self) {
        if let Some(governor) = &self.governor {
            governor.observe(Signal::Throttled);
        }
    }
}

pub type SharedWorld = Arc<Mutex<World>>;

pub fn world() -> SharedWorld {
    Arc::new(Mutex::new(World::default()))
}

pub fn put_page(world: &SharedWorld, partition: Partition, items: Vec<Candidate>) {
    world
        .lock()
        .unwrap()
        .pages
        .entry(partition)
        .or_default()
        .push(items);
}

pub struct FakeSource {
    world: SharedWorld,
    current: Option<Partition>,
    page: usize,
}

impl FakeSource {
    pub fn new(world: SharedWorld) -> Self {
        Self {
            world,
            current: None,
            page: 0,
        }
    }
}

#[async_trait::async_trait]
impl ContentSource for FakeSource {
    async fn current_partition(&self) -> Option<Partition> {
        self.current
    }

    async fn navigate_to(&mut self, partition: Partition) -> Result<Navigation, SourceError> {
        let mut world = self.world.lock().unwrap();
        world.navigations.push(partition);
        self.current = Some(partition);
        self.page = 0;
        if std::mem::take(&mut world.reload_next_navigation) {
            return Ok(Navigation::Reloaded);
        }
        Ok(Navigation::Positioned)
    }

    async fn list_candidates(&mut self) -> Result<Vec<Candidate>, SourceError> {
        let mut world = self.world.lock().unwrap();
        world.list_calls += 1;
        if world.list_faults > 0 {
            world.list_faults -= 1;
            return Err(SourceError::Transport(TransportError::new(
                TransportErrorKind::Network,
                "listing unavailable",
            )));
        }
        if world.throttled_lists > 0 {
            world.throttled_lists -= 1;
            world.throttle();
            return Err(SourceError::Throttled);
        }
        world.last_list_was_loading = world.loading_lists > 0;
        if world.loading_lists > 0 {
            world.loading_lists -= 1;
            return Ok(Vec::new());
        }
        let Some(partition) = self.current else {
            return Err(SourceError::NotPositioned);
        };
        Ok(world
            .pages
            .get(&partition)
            .and_then(|pages| pages.get(self.page))
            .cloned()
            .unwrap_or_default())
    }

    async fn is_loading(&self) -> bool {
        self.world.lock().unwrap().last_list_was_loading
    }

    async fn has_next_page(&self) -> bool {
        let world = self.world.lock().unwrap();
        self.current
            .and_then(|p| world.pages.get(&p))
            .is_some_and(|pages| self.page + 1 < pages.len())
    }

    async fn go_to_next_page(&mut self) -> Result<(), SourceError> {
        self.page += 1;
        Ok(())
    }

    async fn has_more_to_load(&self) -> bool {
        false
    }

    async fn load_more(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

pub struct FakeActions {
    world: SharedWorld,
}

impl FakeActions {
    pub fn new(world: SharedWorld) -> Self {
        Self { world }
    }
}

#[async_trait::async_trait]
impl DeletionActions for FakeActions {
    async fn begin_delete(
        &self,
        candidate: &Candidate,
    ) -> Result<Option<Confirmation>, TransportError> {
        let mut world = self.world.lock().unwrap();
        let id = candidate.handle.0.clone();
        world.begin_calls.push(id.clone());
        if world.throttled_begins > 0 {
            world.throttled_begins -= 1;
            world.throttle();
            return Err(TransportError::new(
                TransportErrorKind::HttpStatus(THROTTLED_STATUS),
                "too many requests",
            ));
        }
        if world.begin_faults > 0 {
            world.begin_faults -= 1;
            return Err(TransportError::new(TransportErrorKind::Timeout, "slow remote"));
        }
        if world.undeletable.contains(&id) {
            return Ok(None);
        }
        Ok(Some(Confirmation(format!("confirm-{id}"))))
    }

    async fn confirm_delete(
        &self,
        candidate: &Candidate,
        confirmation: Confirmation,
    ) -> Result<(), TransportError> {
        let mut world = self.world.lock().unwrap();
        let id = candidate.handle.0.clone();
        assert_eq!(confirmation.0, format!("confirm-{id}"));
        for pages in world.pages.values_mut() {
            for page in pages.iter_mut() {
                page.retain(|c| c.handle != candidate.handle);
            }
        }
        world.deleted.push(id);
        let deleted = world.deleted.len();
        if let Some((limit, token)) = &world.stop_after_deletions {
            if deleted >= *limit {
                token.cancel();
            }
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn completed_partitions(&self) -> Vec<Partition> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::PartitionCompleted(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}
