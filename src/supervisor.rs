//! The top-level task that keeps the pipeline alive: ticks the performance
//! watcher, respawns a dead feeder/filter task, tops up both worker pools to
//! their floors, and reports queue/pool gauges.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::client::ApiClientPool;
use crate::feeder::{run_feeder, Feeder};
use crate::filter::run_filter;
use crate::item::ResourceItem;
use crate::queue::PriorityQueue;
use crate::storage::Storage;
use crate::watcher::PerformanceWatcher;
use crate::worker::WorkerPool;

/// Owns the feeder task and the means to respawn it if it dies.
struct FeederSlot {
    handle: JoinHandle<()>,
    feeder: Arc<dyn Feeder>,
    input_queue: Arc<PriorityQueue<ResourceItem>>,
}

impl FeederSlot {
    fn spawn(feeder: Arc<dyn Feeder>, input_queue: Arc<PriorityQueue<ResourceItem>>) -> Self {
        let handle = tokio::spawn(run_feeder(feeder.clone(), input_queue.clone()));
        Self {
            handle,
            feeder,
            input_queue,
        }
    }

    fn respawn_if_dead(&mut self) {
        if self.handle.is_finished() {
            error!("feeder task terminated, respawning");
            self.handle = tokio::spawn(run_feeder(self.feeder.clone(), self.input_queue.clone()));
        }
    }
}

/// Owns the filter task and the means to respawn it. Absent entirely when no
/// filter plugin is configured (the bridge aliases `main := input` instead).
struct FilterSlot {
    handle: JoinHandle<()>,
    input_queue: Arc<PriorityQueue<ResourceItem>>,
    main_queue: Arc<PriorityQueue<ResourceItem>>,
    storage: Arc<dyn Storage>,
}

impl FilterSlot {
    fn spawn(
        input_queue: Arc<PriorityQueue<ResourceItem>>,
        main_queue: Arc<PriorityQueue<ResourceItem>>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let handle = tokio::spawn(run_filter(input_queue.clone(), main_queue.clone(), storage.clone()));
        Self {
            handle,
            input_queue,
            main_queue,
            storage,
        }
    }

    fn respawn_if_dead(&mut self) {
        if self.handle.is_finished() {
            error!("filter task terminated, respawning");
            self.handle = tokio::spawn(run_filter(
                self.input_queue.clone(),
                self.main_queue.clone(),
                self.storage.clone(),
            ));
        }
    }
}

/// Gauges emitted once per supervisor tick, mirroring the source's
/// `extra={...}` logging fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolGauges {
    pub main_queue_fill_percent: f64,
    /// Preserves the source's retry-gauge bug: divided by `100 * capacity`
    /// instead of `capacity / 100` (see Open Questions in `SPEC_FULL.md`).
    pub retry_queue_fill_percent: f64,
    pub live_client_count: usize,
}

fn main_fill_percent(qsize: usize, capacity: Option<usize>) -> f64 {
    match capacity {
        Some(cap) if cap > 0 => qsize as f64 / (cap as f64 / 100.0),
        _ => 0.0,
    }
}

fn retry_fill_percent_buggy(qsize: usize, capacity: Option<usize>) -> f64 {
    match capacity {
        Some(cap) if cap > 0 => qsize as f64 / (100.0 * cap as f64),
        _ => 0.0,
    }
}

pub struct Supervisor {
    watcher: PerformanceWatcher,
    client_pool: Arc<ApiClientPool>,
    main_queue: Arc<PriorityQueue<ResourceItem>>,
    retry_queue: Arc<PriorityQueue<ResourceItem>>,
    feeder: FeederSlot,
    filter: Option<FilterSlot>,
    workers_min: usize,
    retry_workers_min: usize,
    watch_interval: Duration,
}

impl Supervisor {
    pub fn new(
        watcher: PerformanceWatcher,
        client_pool: Arc<ApiClientPool>,
        main_queue: Arc<PriorityQueue<ResourceItem>>,
        retry_queue: Arc<PriorityQueue<ResourceItem>>,
        input_queue: Arc<PriorityQueue<ResourceItem>>,
        feeder: Arc<dyn Feeder>,
        filter_storage: Option<Arc<dyn Storage>>,
        workers_min: usize,
        retry_workers_min: usize,
        watch_interval: Duration,
    ) -> Self {
        let feeder_slot = FeederSlot::spawn(feeder, input_queue.clone());
        let filter_slot = filter_storage
            .map(|storage| FilterSlot::spawn(input_queue, main_queue.clone(), storage));
        Self {
            watcher,
            client_pool,
            main_queue,
            retry_queue,
            feeder: feeder_slot,
            filter: filter_slot,
            workers_min,
            retry_workers_min,
            watch_interval,
        }
    }

    /// Runs one supervision pass: watcher tick, task-death detection and
    /// respawn, main- and retry-pool top-up, gauge reporting. `main_pool` is
    /// shared with the controller's scale decisions, mirroring the source's
    /// `queues_controller` and `gevent_watcher` greenlets both mutating one
    /// `workers_pool`; `retry_pool` is owned here since nothing else scales
    /// it elastically.
    pub async fn tick(&mut self, main_pool: &Mutex<WorkerPool>, retry_pool: &mut WorkerPool) -> PoolGauges {
        self.watcher.tick(&self.client_pool.health);

        self.feeder.respawn_if_dead();
        if let Some(filter) = &mut self.filter {
            filter.respawn_if_dead();
        }

        {
            let mut main_pool = main_pool.lock().await;
            while main_pool.size() < self.workers_min {
                self.client_pool.create().await;
                main_pool.spawn_one();
            }
        }
        while retry_pool.size() < self.retry_workers_min {
            self.client_pool.create().await;
            retry_pool.spawn_one();
        }

        let gauges = PoolGauges {
            main_queue_fill_percent: main_fill_percent(
                self.main_queue.qsize().await,
                self.main_queue.capacity(),
            ),
            retry_queue_fill_percent: retry_fill_percent_buggy(
                self.retry_queue.qsize().await,
                self.retry_queue.capacity(),
            ),
            live_client_count: self.client_pool.size().await,
        };

        info!(
            main_queue_fill_percent = gauges.main_queue_fill_percent,
            retry_queue_fill_percent = gauges.retry_queue_fill_percent,
            live_client_count = gauges.live_client_count,
            "supervisor tick"
        );

        gauges
    }

    /// Runs `tick` forever, sleeping `watch_interval` seconds between passes.
    pub async fn run(&mut self, main_pool: &Mutex<WorkerPool>, retry_pool: &mut WorkerPool) {
        loop {
            tokio::time::sleep(self.watch_interval).await;
            self.tick(main_pool, retry_pool).await;
        }
    }
}
