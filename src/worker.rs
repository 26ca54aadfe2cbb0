//! The main and retry worker pools. Both share one loop — `run_worker` — the
//! only difference is which queue a given spawn drains and re-enqueues into.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::client::ApiClientPool;
use crate::error::RequestFailure;
use crate::fetch::ResourceFetcher;
use crate::handler::HandlerRegistry;
use crate::item::ResourceItem;
use crate::queue::PriorityQueue;
use crate::storage::Storage;

const MIN_BACKOFF_SECS: f64 = 1.0;
const MAX_BACKOFF_SECS: f64 = 60.0;

/// Everything a worker needs besides the queue it drains. Shared by every
/// worker in both the main pool and the retry pool.
pub struct WorkerContext {
    pub client_pool: Arc<ApiClientPool>,
    pub storage: Arc<dyn Storage>,
    pub handlers: Arc<HandlerRegistry>,
    pub retry_queue: Arc<PriorityQueue<ResourceItem>>,
    pub fetcher: Arc<dyn ResourceFetcher>,
}

/// Pops items from `queue` until `shutdown` is signaled, acquiring a client
/// for each one and dispatching to the handler registry on success.
///
/// Mirrors `BasicDataBridge`'s worker state machine: `Idle -> Busy(acquired)
/// -> Requesting -> {Success -> Handling -> Idle} | {Retryable ->
/// EnqueueRetry -> Idle} | {Fatal -> Drop -> Idle}`. Shutdown is checked only
/// between items — an in-flight request always finishes.
pub async fn run_worker(
    queue: Arc<PriorityQueue<ResourceItem>>,
    ctx: Arc<WorkerContext>,
    shutdown: CancellationToken,
) {
    loop {
        let (priority, item) = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            popped = queue.get() => popped,
        };

        let mut client = ctx.client_pool.acquire().await;

        if let Some(mut health) = ctx.client_pool.health.get_mut(&client.id) {
            if health.drop_cookies {
                if let Err(e) = client.rotate_session() {
                    error!(client_id = %client.id, error = %e, "failed to rotate session");
                }
                health.drop_cookies = false;
            }
        }

        if client.request_interval > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(client.request_interval)).await;
        }

        let start = Utc::now();
        let result = ctx.fetcher.fetch(&client.session, &item.id).await;
        let duration = (Utc::now() - start).num_milliseconds().max(0) as f64 / 1000.0;

        if let Some(mut health) = ctx.client_pool.health.get_mut(&client.id) {
            health.request_durations.insert(start, duration);
        }

        match result {
            Ok(()) => {
                client.request_interval = 0.0;
                if let Some(mut health) = ctx.client_pool.health.get_mut(&client.id) {
                    health.request_interval = 0.0;
                }
                ctx.client_pool.release(client).await;

                let handler = ctx.handlers.resolve(item.procurement_method_type.as_deref());
                handler.handle(item, ctx.storage.as_ref()).await;
            }
            Err(RequestFailure::Transient(reason)) => {
                client.request_interval =
                    (client.request_interval * 2.0).clamp(MIN_BACKOFF_SECS, MAX_BACKOFF_SECS);
                if let Some(mut health) = ctx.client_pool.health.get_mut(&client.id) {
                    health.request_interval = client.request_interval;
                }
                warn!(item_id = %item.id, reason, "transient request failure, re-enqueuing to retry");
                ctx.client_pool.release(client).await;
                ctx.retry_queue.put(priority, item).await;
            }
            Err(RequestFailure::Permanent { status, message }) => {
                error!(item_id = %item.id, status, message, "permanent request failure, dropping item");
                ctx.client_pool.release(client).await;
            }
        }
    }
}

/// Manages the lifetime of a set of `run_worker` tasks draining one queue.
/// Used for both the main pool and the retry pool; the controller only ever
/// drives the main pool, the supervisor tops up both.
pub struct WorkerPool {
    queue: Arc<PriorityQueue<ResourceItem>>,
    ctx: Arc<WorkerContext>,
    workers: Vec<(CancellationToken, tokio::task::JoinHandle<()>)>,
}

impl WorkerPool {
    pub fn new(queue: Arc<PriorityQueue<ResourceItem>>, ctx: Arc<WorkerContext>) -> Self {
        Self {
            queue,
            ctx,
            workers: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Spawns one more worker against the shared queue and context.
    pub fn spawn_one(&mut self) {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            self.queue.clone(),
            self.ctx.clone(),
            shutdown.clone(),
        ));
        self.workers.push((shutdown, handle));
    }

    /// Cooperatively stops one worker: cancels it and waits for it to drain
    /// its current item (if any) and exit. Does nothing if the pool is empty.
    pub async fn shutdown_one(&mut self) {
        if let Some((shutdown, handle)) = self.workers.pop() {
            shutdown.cancel();
            let _ = handle.await;
        }
    }
}
