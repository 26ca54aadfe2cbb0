//! Wires the dispatch core's components together from a loaded [`Config`]
//! plus the pluggable collaborators (storage, feeder, handlers) a deployment
//! supplies, and drives the pipeline forever.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;
use url::Url;

use crate::client::ApiClientPool;
use crate::config::Config;
use crate::controller::QueueController;
use crate::error::ClientConstructionError;
use crate::feeder::Feeder;
use crate::fetch::{HttpResourceFetcher, ResourceFetcher};
use crate::handler::HandlerRegistry;
use crate::identity::BridgeIdentity;
use crate::item::ResourceItem;
use crate::queue::PriorityQueue;
use crate::storage::Storage;
use crate::supervisor::Supervisor;
use crate::watcher::PerformanceWatcher;
use crate::worker::{WorkerContext, WorkerPool};

/// Builds the `{base}/{version}/{resource}/` URL each worker joins an item id
/// onto, ensuring a trailing slash so `Url::join` appends instead of
/// replacing the final path segment.
fn resource_base_url(config: &Config) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(&config.main.resources_api_server)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!(
        "{}/{}/",
        config.main.resources_api_version, config.main.resource
    ))
}

/// The assembled, ready-to-run pipeline: queues, client pool, and the worker
/// pools the controller/supervisor scale. Construction creates the initial
/// `workers_min` + `retry_workers_min` clients, which requires the upstream
/// to be reachable.
pub struct Bridge {
    config: Config,
    client_pool: Arc<ApiClientPool>,
    input_queue: Arc<PriorityQueue<ResourceItem>>,
    main_queue: Arc<PriorityQueue<ResourceItem>>,
    retry_queue: Arc<PriorityQueue<ResourceItem>>,
    main_pool: Mutex<WorkerPool>,
    retry_pool: WorkerPool,
    controller: QueueController,
    supervisor: Supervisor,
}

impl Bridge {
    /// Assembles the pipeline. `fetcher` is normally `None`, which selects
    /// the production `HttpResourceFetcher` bound to the configured resource
    /// URL; tests substitute a scripted fetcher.
    pub async fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        feeder: Arc<dyn Feeder>,
        handlers: Arc<HandlerRegistry>,
        fetcher: Option<Arc<dyn ResourceFetcher>>,
    ) -> Result<Self, ClientConstructionError> {
        let base = resource_base_url(&config)
            .map_err(|e| ClientConstructionError::Transport(e.to_string()))?;
        let identity = BridgeIdentity::generate();
        let user_agent = identity.user_agent(&config.main.user_agent);

        let client_pool = Arc::new(ApiClientPool::new(base.clone(), user_agent));
        for _ in 0..config.main.workers_min {
            client_pool.create().await;
        }
        for _ in 0..config.main.retry_workers_min {
            client_pool.create().await;
        }

        let input_queue = Arc::new(PriorityQueue::new(config.main.input_queue_size.0));
        let retry_queue = Arc::new(PriorityQueue::new(
            config.main.retry_resource_items_queue_size.0,
        ));
        // No filter plugin configured -> main queue is the input queue
        // itself; the filter task is never spawned (see SPEC_FULL.md 4.E).
        let main_queue = if config.main.filter_config.filter_type.is_some() {
            Arc::new(PriorityQueue::new(
                config.main.resource_items_queue_size.0,
            ))
        } else {
            input_queue.clone()
        };

        let fetcher: Arc<dyn ResourceFetcher> =
            fetcher.unwrap_or_else(|| Arc::new(HttpResourceFetcher::new(base)));

        let main_ctx = Arc::new(WorkerContext {
            client_pool: client_pool.clone(),
            storage: storage.clone(),
            handlers: handlers.clone(),
            retry_queue: retry_queue.clone(),
            fetcher: fetcher.clone(),
        });
        let mut main_pool = WorkerPool::new(main_queue.clone(), main_ctx);
        for _ in 0..config.main.workers_min {
            main_pool.spawn_one();
        }

        let retry_ctx = Arc::new(WorkerContext {
            client_pool: client_pool.clone(),
            storage: storage.clone(),
            handlers,
            retry_queue: retry_queue.clone(),
            fetcher,
        });
        let mut retry_pool = WorkerPool::new(retry_queue.clone(), retry_ctx);
        for _ in 0..config.main.retry_workers_min {
            retry_pool.spawn_one();
        }

        let controller = QueueController::new(main_queue.clone(), client_pool.clone(), &config.main);

        let filter_storage = if config.main.filter_config.filter_type.is_some() {
            Some(storage.clone())
        } else {
            None
        };
        let watcher = PerformanceWatcher::new(
            Duration::from_secs(config.main.performance_window),
            Duration::from_secs(config.main.watch_interval),
        );
        let supervisor = Supervisor::new(
            watcher,
            client_pool.clone(),
            main_queue.clone(),
            retry_queue.clone(),
            input_queue.clone(),
            feeder,
            filter_storage,
            config.main.workers_min,
            config.main.retry_workers_min,
            Duration::from_secs(config.main.watch_interval),
        );

        Ok(Self {
            config,
            client_pool,
            input_queue,
            main_queue,
            retry_queue,
            main_pool: Mutex::new(main_pool),
            retry_pool,
            controller,
            supervisor,
        })
    }

    /// Runs the control loop and the supervisor loop concurrently. Neither
    /// returns under normal operation; this future only completes if the
    /// process is killed mid-`.await` (there is no graceful top-level stop).
    pub async fn run(self) {
        info!(
            resource = %self.config.main.resource,
            workers_min = self.config.main.workers_min,
            workers_max = self.config.main.workers_max,
            "bridge starting"
        );
        let Bridge {
            main_pool,
            mut retry_pool,
            controller,
            mut supervisor,
            ..
        } = self;
        tokio::join!(
            controller.run(&main_pool),
            supervisor.run(&main_pool, &mut retry_pool),
        );
    }

    pub fn main_queue(&self) -> Arc<PriorityQueue<ResourceItem>> {
        self.main_queue.clone()
    }

    pub fn input_queue(&self) -> Arc<PriorityQueue<ResourceItem>> {
        self.input_queue.clone()
    }

    pub fn retry_queue(&self) -> Arc<PriorityQueue<ResourceItem>> {
        self.retry_queue.clone()
    }

    pub fn client_pool(&self) -> Arc<ApiClientPool> {
        self.client_pool.clone()
    }
}
