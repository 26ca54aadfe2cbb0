//! `ApiClient` lifecycle and the pool that owns a set of them.
//!
//! An `ApiClient` wraps one `reqwest::Client` bound to a persistent cookie
//! jar. Clients are never shared between concurrent users: a worker
//! `acquire`s one, uses it for exactly one request, then `release`s it.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use reqwest::Url;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info};

use crate::error::ClientConstructionError;

fn random_hex_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A handle bound to one upstream HTTP session.
pub struct ApiClient {
    pub id: String,
    pub session: reqwest::Client,
    pub user_agent: String,
    /// Seconds to sleep before this client's next use; a backoff hint set by
    /// workers on 429/5xx.
    pub request_interval: f64,
    /// Consecutive "resource unchanged" responses. Never consulted by the
    /// core; carried for handler use (see Open Questions in `SPEC_FULL.md`).
    pub not_actual_count: u64,
}

impl ApiClient {
    /// Rotates the session's cookie jar, used when `ClientHealth::drop_cookies`
    /// is set. Building a fresh `reqwest::Client` is the idiomatic way to drop
    /// an accumulated `reqwest::cookie::Jar`.
    pub fn rotate_session(&mut self) -> Result<(), ClientConstructionError> {
        self.session = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| ClientConstructionError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// One per `ApiClient`, keyed by `id` in `ApiClientPool::health`.
#[derive(Debug, Clone)]
pub struct ClientHealth {
    pub drop_cookies: bool,
    /// Sliding window of recent request latencies, keyed by request start time.
    pub request_durations: BTreeMap<DateTime<Utc>, f64>,
    pub request_interval: f64,
    pub avg_duration: f64,
    /// `true` once the oldest retained sample is at least `performance_window` old.
    pub grown: bool,
}

impl Default for ClientHealth {
    fn default() -> Self {
        Self {
            drop_cookies: false,
            request_durations: BTreeMap::new(),
            request_interval: 0.0,
            avg_duration: 0.0,
            grown: false,
        }
    }
}

/// Owns a FIFO set of HTTP clients plus their health metadata.
pub struct ApiClientPool {
    clients: Mutex<VecDeque<ApiClient>>,
    not_empty: Notify,
    pub health: DashMap<String, ClientHealth>,
    base_url: Url,
    user_agent: String,
}

impl ApiClientPool {
    pub fn new(base_url: Url, user_agent: String) -> Self {
        Self {
            clients: Mutex::new(VecDeque::new()),
            not_empty: Notify::new(),
            health: DashMap::new(),
            base_url,
            user_agent,
        }
    }

    async fn build_and_handshake(&self) -> Result<reqwest::Client, ClientConstructionError> {
        let session = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| ClientConstructionError::Transport(e.to_string()))?;

        let response = session
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|e| ClientConstructionError::Transport(e.to_string()))?;

        if response.status().is_client_error() || response.status().is_server_error() {
            return Err(ClientConstructionError::Status(response.status().as_u16()));
        }
        Ok(session)
    }

    /// Builds a new client, retrying forever with exponential backoff
    /// (starting at 0.1s, doubling each attempt) on failure. On success,
    /// inserts the client into the pool and creates its health entry.
    pub async fn create(&self) -> String {
        let mut backoff = Duration::from_millis(100);
        loop {
            match self.build_and_handshake().await {
                Ok(session) => {
                    let id = random_hex_id();
                    info!(client_id = %id, user_agent = %self.user_agent, "started api_client");
                    self.health.insert(id.clone(), ClientHealth::default());
                    let client = ApiClient {
                        id: id.clone(),
                        session,
                        user_agent: self.user_agent.clone(),
                        request_interval: 0.0,
                        not_actual_count: 0,
                    };
                    let mut guard = self.clients.lock().await;
                    guard.push_back(client);
                    drop(guard);
                    self.not_empty.notify_one();
                    return id;
                }
                Err(e) => {
                    error!(error = %e, "failed to start api_client, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    /// Blocks until a client is available, then removes it from the pool.
    pub async fn acquire(&self) -> ApiClient {
        loop {
            let notified = self.not_empty.notified();
            {
                let mut guard = self.clients.lock().await;
                if let Some(client) = guard.pop_front() {
                    return client;
                }
            }
            notified.await;
        }
    }

    /// Returns a client to the tail of the pool, ready for reuse. If its
    /// health entry is flagged `drop_cookies`, rotates the session first and
    /// clears the flag.
    pub async fn release(&self, mut client: ApiClient) {
        if let Some(mut health) = self.health.get_mut(&client.id) {
            if health.drop_cookies {
                if let Err(e) = client.rotate_session() {
                    error!(client_id = %client.id, error = %e, "failed to rotate session");
                }
                health.drop_cookies = false;
            }
        }
        let mut guard = self.clients.lock().await;
        guard.push_back(client);
        drop(guard);
        self.not_empty.notify_one();
    }

    /// Pops one client from the pool (blocking until one is available) and
    /// deletes its health entry. Which client is retired is not tracked
    /// against any particular shutdown worker (see Open Questions).
    pub async fn retire(&self) -> ApiClient {
        let client = self.acquire().await;
        self.health.remove(&client.id);
        client
    }

    pub async fn size(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_health_defaults_are_zeroed() {
        let health = ClientHealth::default();
        assert!(!health.drop_cookies);
        assert!(health.request_durations.is_empty());
        assert_eq!(health.avg_duration, 0.0);
        assert!(!health.grown);
    }

    #[test]
    fn random_hex_id_is_32_chars() {
        let id = random_hex_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    fn test_pool() -> ApiClientPool {
        ApiClientPool::new(
            Url::parse("http://example.invalid").unwrap(),
            "test-agent".to_string(),
        )
    }

    fn fake_client(id: &str) -> ApiClient {
        ApiClient {
            id: id.to_string(),
            session: reqwest::Client::new(),
            user_agent: "test-agent".to_string(),
            request_interval: 0.0,
            not_actual_count: 0,
        }
    }

    async fn seed(pool: &ApiClientPool, id: &str) {
        pool.health.insert(id.to_string(), ClientHealth::default());
        pool.clients.lock().await.push_back(fake_client(id));
    }

    #[tokio::test]
    async fn acquire_and_release_round_trips_through_pool() {
        let pool = test_pool();
        seed(&pool, "client-a").await;
        assert_eq!(pool.size().await, 1);

        let client = pool.acquire().await;
        assert_eq!(client.id, "client-a");
        assert_eq!(pool.size().await, 0);

        pool.release(client).await;
        assert_eq!(pool.size().await, 1);
    }

    #[tokio::test]
    async fn retire_removes_both_pool_entry_and_health_entry() {
        let pool = test_pool();
        seed(&pool, "client-a").await;

        pool.retire().await;

        assert_eq!(pool.size().await, 0);
        assert!(!pool.health.contains_key("client-a"));
    }

    #[tokio::test]
    async fn release_rotates_session_when_drop_cookies_is_set() {
        let pool = test_pool();
        seed(&pool, "client-a").await;
        pool.health.get_mut("client-a").unwrap().drop_cookies = true;

        let client = pool.acquire().await;
        pool.release(client).await;

        assert!(!pool.health.get("client-a").unwrap().drop_cookies);
    }

    #[tokio::test]
    async fn acquire_blocks_until_a_client_is_created() {
        let pool = std::sync::Arc::new(test_pool());
        let pool2 = pool.clone();
        let acquirer = tokio::spawn(async move { pool2.acquire().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!acquirer.is_finished());

        seed(&pool, "client-a").await;
        pool.not_empty.notify_one();

        let client = acquirer.await.unwrap();
        assert_eq!(client.id, "client-a");
    }
}
