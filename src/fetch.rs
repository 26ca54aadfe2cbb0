//! The GET-one-resource-item HTTP call each worker issues, abstracted behind
//! a trait so the dispatch logic in `worker.rs` can be exercised without a
//! live upstream.

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use crate::error::RequestFailure;

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Issues one GET for `item_id` using `session`. Success discards the
    /// response body; the core only cares whether the fetch succeeded, since
    /// persistence is the handler's job.
    async fn fetch(&self, session: &reqwest::Client, item_id: &str) -> Result<(), RequestFailure>;
}

/// Production fetcher: `GET {base}/{item_id}`.
pub struct HttpResourceFetcher {
    pub base: Url,
}

impl HttpResourceFetcher {
    pub fn new(base: Url) -> Self {
        Self { base }
    }
}

#[async_trait]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self, session: &reqwest::Client, item_id: &str) -> Result<(), RequestFailure> {
        let url = self
            .base
            .join(item_id)
            .map_err(|e| RequestFailure::Permanent {
                status: 0,
                message: e.to_string(),
            })?;

        let response = session
            .get(url)
            .send()
            .await
            .map_err(|e| RequestFailure::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(RequestFailure::Transient(format!(
                "status {}",
                status.as_u16()
            )));
        }
        Err(RequestFailure::Permanent {
            status: status.as_u16(),
            message: status.to_string(),
        })
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes, one per call; the last outcome
    /// repeats once the script is exhausted.
    pub struct ScriptedFetcher {
        script: Vec<Result<(), RequestFailure>>,
        calls: AtomicUsize,
        seen_ids: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn new(script: Vec<Result<(), RequestFailure>>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
                seen_ids: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn seen_ids(&self) -> Vec<String> {
            self.seen_ids.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            _session: &reqwest::Client,
            item_id: &str,
        ) -> Result<(), RequestFailure> {
            self.seen_ids.lock().unwrap().push(item_id.to_string());
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = call.min(self.script.len().saturating_sub(1));
            match &self.script[idx] {
                Ok(()) => Ok(()),
                Err(RequestFailure::Transient(msg)) => Err(RequestFailure::Transient(msg.clone())),
                Err(RequestFailure::Permanent { status, message }) => {
                    Err(RequestFailure::Permanent {
                        status: *status,
                        message: message.clone(),
                    })
                }
            }
        }
    }
}
