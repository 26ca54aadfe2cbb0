//! The filter plugin: pops items from `input`, consults storage for
//! pass/drop, and forwards survivors to `main`. If no filter plugin is
//! configured, the supervisor aliases `main := input` and this stage is
//! skipped entirely.

use std::sync::Arc;

use tracing::debug;

use crate::item::ResourceItem;
use crate::queue::PriorityQueue;
use crate::storage::Storage;

/// Runs forever, pulling one item at a time from `input`, and forwarding it
/// to `main` only if `storage.filter` keeps it. Terminates only on panic; the
/// supervisor respawns it when that happens.
pub async fn run_filter(
    input_queue: Arc<PriorityQueue<ResourceItem>>,
    main_queue: Arc<PriorityQueue<ResourceItem>>,
    storage: Arc<dyn Storage>,
) {
    loop {
        let (priority, item) = input_queue.get().await;
        let mut survivors = storage.filter(vec![item]).await;
        if let Some(item) = survivors.pop() {
            debug!(item_id = %item.id, priority, "filter: forwarding to main queue");
            main_queue.put(priority, item).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono::Utc;

    #[tokio::test]
    async fn forwards_new_items_and_drops_stale_ones() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        storage
            .upsert(ResourceItem::new("seen", Utc::now()))
            .await;

        let input = Arc::new(PriorityQueue::new(None));
        let main = Arc::new(PriorityQueue::new(None));

        input.put(0, ResourceItem::new("fresh", Utc::now())).await;
        input
            .put(0, ResourceItem::new("seen", Utc::now() - chrono::Duration::minutes(5)))
            .await;
        input.put(0, ResourceItem::new("fresh", Utc::now())).await;

        let handle = tokio::spawn(run_filter(input.clone(), main.clone(), storage.clone()));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(main.qsize().await, 2);
    }
}
