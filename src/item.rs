//! The record carried through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque upstream record (e.g. a tender) to be synchronized.
///
/// Fields beyond `id`/`date_modified`/`procurement_method_type` are resource-type
/// specific and are not interpreted by the dispatch core; they are carried in
/// `extra` for handler plugins to read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceItem {
    pub id: String,
    pub date_modified: DateTime<Utc>,
    /// Keys the handler registry; `None` routes to the default handler.
    pub procurement_method_type: Option<String>,
    #[serde(default, flatten)]
    pub extra: std::collections::BTreeMap<String, Value>,
}

impl ResourceItem {
    pub fn new(id: impl Into<String>, date_modified: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            date_modified,
            procurement_method_type: None,
            extra: Default::default(),
        }
    }

    pub fn with_method_type(mut self, method_type: impl Into<String>) -> Self {
        self.procurement_method_type = Some(method_type.into());
        self
    }
}

/// An item paired with its dispatch priority (lower = sooner).
#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizedItem {
    pub priority: i64,
    pub item: ResourceItem,
}

impl PrioritizedItem {
    pub fn new(priority: i64, item: ResourceItem) -> Self {
        Self { priority, item }
    }
}
