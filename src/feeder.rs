//! The upstream feeder: out of scope per the bridge's design, modeled here as
//! a trait producing a lazy, possibly infinite, prioritized stream, plus the
//! task that drains it into the input queue.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use crate::item::{PrioritizedItem, ResourceItem};
use crate::queue::PriorityQueue;

/// Produces `(priority, item)` pairs. A real plugin wraps the upstream sync
/// protocol; [`StaticFeeder`] replays a fixed list for tests and examples.
pub trait Feeder: Send + Sync {
    fn stream(&self) -> BoxStream<'static, PrioritizedItem>;
}

/// Replays a fixed `Vec<(priority, item)>`, once or cycling forever.
pub struct StaticFeeder {
    items: Vec<PrioritizedItem>,
    cycle: bool,
}

impl StaticFeeder {
    pub fn once(items: Vec<PrioritizedItem>) -> Self {
        Self {
            items,
            cycle: false,
        }
    }

    pub fn cycling(items: Vec<PrioritizedItem>) -> Self {
        Self { items, cycle: true }
    }
}

impl Feeder for StaticFeeder {
    fn stream(&self) -> BoxStream<'static, PrioritizedItem> {
        let items = self.items.clone();
        if self.cycle {
            if items.is_empty() {
                return stream::empty().boxed();
            }
            stream::iter(items).cycle().boxed()
        } else {
            stream::iter(items).boxed()
        }
    }
}

/// Drains `feeder` into `input_queue`, blocking on backpressure. Returns once
/// the feeder's stream is exhausted — the supervisor treats that as task
/// death and respawns it.
pub async fn run_feeder(feeder: Arc<dyn Feeder>, input_queue: Arc<PriorityQueue<ResourceItem>>) {
    let mut items = feeder.stream();
    while let Some(PrioritizedItem { priority, item }) = items.next().await {
        debug!(item_id = %item.id, priority, "received from feeder");
        input_queue.put(priority, item).await;
    }
}
