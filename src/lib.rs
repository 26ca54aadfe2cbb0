//! Procurement data bridge: a long-running process that pulls a feed of
//! resource items from an upstream HTTP API, filters them against a storage
//! backend, and dispatches survivors to pluggable handlers.
//!
//! The concurrent dispatch core -- queue topology, elastic worker pools,
//! API-client lifecycle with health tracking, and the performance watcher --
//! lives in this crate. Feeders, handlers, filters, and storage backends are
//! traits; only in-memory reference implementations ship here.

pub mod bridge;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod feeder;
pub mod fetch;
pub mod filter;
pub mod handler;
pub mod identity;
pub mod item;
pub mod queue;
pub mod storage;
pub mod supervisor;
pub mod watcher;
pub mod worker;

pub use bridge::Bridge;
pub use client::{ApiClient, ApiClientPool, ClientHealth};
pub use config::{Cli, Config, MainConfig};
pub use controller::QueueController;
pub use error::{ClientConstructionError, ConfigError, RequestFailure};
pub use feeder::{Feeder, StaticFeeder};
pub use fetch::{HttpResourceFetcher, ResourceFetcher};
pub use handler::{EchoHandler, Handler, HandlerRegistry};
pub use identity::BridgeIdentity;
pub use item::{PrioritizedItem, ResourceItem};
pub use queue::{PriorityQueue, QueueSet};
pub use storage::{InMemoryStorage, Storage};
pub use supervisor::{PoolGauges, Supervisor};
pub use watcher::{PerformanceWatcher, WatcherGauges};
pub use worker::{run_worker, WorkerContext, WorkerPool};
