//! The main-pool sizing controller: grows or shrinks the worker pool on a
//! tick, based on how full the main queue is.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;

use crate::client::ApiClientPool;
use crate::config::MainConfig;
use crate::item::ResourceItem;
use crate::queue::PriorityQueue;
use crate::worker::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScaleDecision {
    Up,
    Down,
    Steady,
}

/// Drives `WorkerPool` sizing for the main pool. Retry-pool top-up is the
/// supervisor's job (it has no elastic scaling, only a floor).
pub struct QueueController {
    main_queue: Arc<PriorityQueue<ResourceItem>>,
    client_pool: Arc<ApiClientPool>,
    workers_min: usize,
    workers_max: usize,
    inc_threshold: f64,
    dec_threshold: f64,
    tick_interval: Duration,
}

impl QueueController {
    pub fn new(
        main_queue: Arc<PriorityQueue<ResourceItem>>,
        client_pool: Arc<ApiClientPool>,
        config: &MainConfig,
    ) -> Self {
        Self {
            main_queue,
            client_pool,
            workers_min: config.workers_min,
            workers_max: config.workers_max,
            inc_threshold: config.workers_inc_threshold,
            dec_threshold: config.workers_dec_threshold,
            tick_interval: Duration::from_secs(config.queues_controller_timeout),
        }
    }

    /// Main-queue fill percentage. `None` capacity (unbounded) never
    /// triggers scale-up, matching the source's reliance on a configured cap.
    fn fill_percent(&self, qsize: usize) -> f64 {
        match self.main_queue.capacity() {
            Some(capacity) if capacity > 0 => (qsize as f64) / (capacity as f64 / 100.0),
            _ => 0.0,
        }
    }

    /// The scale decision for a given fill percentage and current pool size,
    /// isolated from I/O so it can be tested without a live client pool.
    fn decide(&self, fill: f64, pool_size: usize) -> ScaleDecision {
        if pool_size < self.workers_max && fill > self.inc_threshold {
            ScaleDecision::Up
        } else if fill < self.dec_threshold && pool_size > self.workers_min {
            ScaleDecision::Down
        } else {
            ScaleDecision::Steady
        }
    }

    /// Runs one scale decision. At most one client is created/retired and
    /// one worker spawned/stopped per call. `pool` is shared with the
    /// supervisor's own top-up step, mirroring the source's two greenlets
    /// (`queues_controller` and `gevent_watcher`) both mutating one
    /// `workers_pool`.
    pub async fn tick(&self, pool: &Mutex<WorkerPool>) {
        let qsize = self.main_queue.qsize().await;
        let fill = self.fill_percent(qsize);
        let mut pool = pool.lock().await;
        let pool_size = pool.size();

        match self.decide(fill, pool_size) {
            ScaleDecision::Up => {
                self.client_pool.create().await;
                pool.spawn_one();
                info!(fill, pool_size = pool_size + 1, "queue_controller: scaled up");
            }
            ScaleDecision::Down => {
                pool.shutdown_one().await;
                self.client_pool.retire().await;
                info!(fill, pool_size = pool_size - 1, "queue_controller: scaled down");
            }
            ScaleDecision::Steady => {}
        }
    }

    /// Runs `tick` forever, sleeping `queues_controller_timeout` seconds
    /// between decisions.
    pub async fn run(&self, pool: &Mutex<WorkerPool>) {
        loop {
            tokio::time::sleep(self.tick_interval).await;
            self.tick(pool).await;
        }
    }
}
