//! Origin-keyed client pool.

use crate::config::ProcessorConfig;
use crate::transport::client::{Origin, OriginClient, TransportFailure};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

struct PoolEntry {
    client: OriginClient,
    last_used: Instant,
    consecutive_failures: u32,
}

/// Pool of per-origin clients with LRU eviction and failure-based
/// retirement.
///
/// Owned by the reactor; all mutation happens on the reactor thread. Entries
/// are released when idle past `connection_idle_timeout`, when the pool
/// exceeds `max_clients` (least-recently-used first), or after
/// `client_failure_threshold` consecutive transport failures.
pub struct ClientPool {
    entries: HashMap<Origin, PoolEntry>,
    config: ProcessorConfig,
    max_clients: usize,
    idle_timeout: Duration,
    failure_threshold: u32,
}

impl ClientPool {
    /// Create an empty pool using `config` for client construction.
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            entries: HashMap::new(),
            max_clients: config.max_clients.max(1),
            idle_timeout: config.connection_idle_timeout,
            failure_threshold: config.client_failure_threshold.max(1),
            config: config.clone(),
        }
    }

    /// Client for `origin`, building and caching one on first use.
    pub(crate) fn acquire(&mut self, origin: &Origin) -> Result<OriginClient, TransportFailure> {
        let now = Instant::now();
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_used) < self.idle_timeout);

        if let Some(entry) = self.entries.get_mut(origin) {
            entry.last_used = now;
            return Ok(entry.client.clone());
        }

        let client = OriginClient::new(origin.clone(), &self.config)?;
        if self.entries.len() >= self.max_clients {
            self.evict_lru();
        }
        self.entries.insert(
            origin.clone(),
            PoolEntry {
                client: client.clone(),
                last_used: now,
                consecutive_failures: 0,
            },
        );
        debug!(origin = %origin, clients = self.entries.len(), "origin client created");
        Ok(client)
    }

    /// Record a successful exchange, resetting the failure streak.
    pub(crate) fn report_success(&mut self, origin: &Origin) {
        if let Some(entry) = self.entries.get_mut(origin) {
            entry.consecutive_failures = 0;
        }
    }

    /// Record a transport failure; the client is retired once the streak
    /// reaches the configured threshold.
    pub(crate) fn report_failure(&mut self, origin: &Origin) {
        let retire = match self.entries.get_mut(origin) {
            Some(entry) => {
                entry.consecutive_failures += 1;
                entry.consecutive_failures >= self.failure_threshold
            }
            None => false,
        };
        if retire {
            self.entries.remove(origin);
            debug!(origin = %origin, "origin client retired after repeated failures");
        }
    }

    /// Number of retained clients.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no clients.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every retained client.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_lru(&mut self) {
        if let Some(origin) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(origin, _)| origin.clone())
        {
            self.entries.remove(&origin);
            debug!(origin = %origin, "origin client evicted (pool full)");
        }
    }
}
