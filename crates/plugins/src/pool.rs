//! Shared connection resources.
//!
//! One [`ResourcePool`] is built at bootstrap and handed to every plugin that
//! needs a connection. Clients are created lazily, keyed by their connection
//! settings, and never duplicated. [`ResourcePool::close`] drops every client;
//! later requests fail with a fetch error.

use std::collections::HashMap;
use std::time::Duration;

use pipeline::{FetchError, SourceKind};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct PoolState {
    closed: bool,
    /// HTTP clients keyed by request timeout in milliseconds.
    http: HashMap<u64, reqwest::Client>,
}

/// Lazily populated, explicitly closed pool of connection handles.
#[derive(Debug, Default)]
pub struct ResourcePool {
    state: RwLock<PoolState>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the HTTP client for `timeout_ms`, creating it on first use.
    pub async fn http_client(&self, timeout_ms: u64) -> Result<reqwest::Client, FetchError> {
        {
            let state = self.state.read().await;
            if state.closed {
                return Err(closed());
            }
            if let Some(client) = state.http.get(&timeout_ms) {
                return Ok(client.clone());
            }
        }

        let mut state = self.state.write().await;
        if state.closed {
            return Err(closed());
        }
        // Another task may have created it while we waited for the write lock.
        if let Some(client) = state.http.get(&timeout_ms) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| FetchError::failed(SourceKind::Http, format!("cannot build client: {e}")))?;
        debug!(timeout_ms, "Created HTTP client");
        state.http.insert(timeout_ms, client.clone());
        Ok(client)
    }

    /// Number of live HTTP clients.
    pub async fn http_clients(&self) -> usize {
        self.state.read().await.http.len()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    /// Releases every client. Idempotent.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if state.closed {
            return;
        }
        let released = state.http.len();
        state.http.clear();
        state.closed = true;
        info!(http_clients = released, "Resource pool closed");
    }
}

fn closed() -> FetchError {
    FetchError::failed(SourceKind::Http, "resource pool is closed")
}
