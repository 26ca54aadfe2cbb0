//! Handler plugins: resource-type-specific processors invoked by workers,
//! keyed by `procurement_method_type`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::item::ResourceItem;
use crate::storage::Storage;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, item: ResourceItem, storage: &dyn Storage);
}

/// Populated once at startup, read-only thereafter; handed to every worker by
/// reference rather than via process-wide mutable state.
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
    default: Arc<dyn Handler>,
}

impl HandlerRegistry {
    pub fn new(default: Arc<dyn Handler>) -> Self {
        Self {
            handlers: HashMap::new(),
            default,
        }
    }

    /// Registers a handler under its `procurement_method_type` name. If
    /// `allow_list` is non-empty, names outside it are silently skipped,
    /// matching the source's `handlers:` config key.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
        allow_list: &[String],
    ) {
        let name = name.into();
        if allow_list.is_empty() || allow_list.contains(&name) {
            self.handlers.insert(name, handler);
        }
    }

    pub fn resolve(&self, procurement_method_type: Option<&str>) -> Arc<dyn Handler> {
        procurement_method_type
            .and_then(|name| self.handlers.get(name))
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Reference handler: persists the item and logs. The default entry for any
/// `procurement_method_type` with no registered plugin.
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, item: ResourceItem, storage: &dyn Storage) {
        debug!(item_id = %item.id, "handling item");
        storage.upsert(item).await;
    }
}
