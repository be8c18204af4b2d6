//! Per-pool state cache with in-flight de-duplication.
//!
//! At most one fetch per pool id is outstanding at any time. Callers that
//! arrive while a fetch is running subscribe to its outcome instead of
//! issuing their own. Failed fetches are handed to every waiter and never
//! stored.

use anyhow::{Context, Result};
use oolong_domain::{FetchError, PoolId, PoolState};
use oolong_protocols::PoolStateProvider;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

/// Default deadline for a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

type FetchOutcome = Result<Arc<PoolState>, FetchError>;

/// Configuration for the pool state cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age of a cached state served by `get`. `None` keeps entries
    /// until a refresh is forced.
    pub ttl: Option<Duration>,
    /// Deadline after which a fetch fails with [`FetchError::Timeout`].
    pub fetch_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

impl CacheConfig {
    /// Reads the optional `POOL_CACHE_TTL_SECS` and `POOL_FETCH_TIMEOUT_MS`.
    ///
    /// # Errors
    /// Returns an error if a variable is set but not an integer.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(secs) = env::var("POOL_CACHE_TTL_SECS") {
            let secs: u64 = secs.parse().context("POOL_CACHE_TTL_SECS must be an integer")?;
            config.ttl = Some(Duration::from_secs(secs));
        }
        if let Ok(ms) = env::var("POOL_FETCH_TIMEOUT_MS") {
            let ms: u64 = ms.parse().context("POOL_FETCH_TIMEOUT_MS must be an integer")?;
            config.fetch_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

enum Slot {
    Cached(Arc<PoolState>),
    InFlight(watch::Receiver<Option<FetchOutcome>>),
}

/// Caches pool state keyed by pool id.
pub struct PoolStateCache {
    provider: Arc<dyn PoolStateProvider>,
    config: CacheConfig,
    slots: Arc<Mutex<HashMap<PoolId, Slot>>>,
    fetches: Arc<AtomicU64>,
}

impl PoolStateCache {
    /// Creates a new cache over the given provider.
    pub fn new(provider: Arc<dyn PoolStateProvider>, config: CacheConfig) -> Self {
        Self {
            provider,
            config,
            slots: Arc::new(Mutex::new(HashMap::new())),
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the cached state if it is within the TTL, otherwise fetches.
    ///
    /// # Errors
    /// Returns the [`FetchError`] of the underlying fetch.
    pub async fn get(&self, pool_id: &PoolId) -> Result<Arc<PoolState>, FetchError> {
        self.load(pool_id, false).await
    }

    /// Fetches fresh state regardless of the cached entry, joining a fetch
    /// that is already running.
    ///
    /// # Errors
    /// Returns the [`FetchError`] of the underlying fetch.
    pub async fn refresh(&self, pool_id: &PoolId) -> Result<Arc<PoolState>, FetchError> {
        self.load(pool_id, true).await
    }

    /// Returns the cached state without fetching.
    pub async fn cached(&self, pool_id: &PoolId) -> Option<Arc<PoolState>> {
        match self.slots.lock().await.get(pool_id) {
            Some(Slot::Cached(state)) => Some(Arc::clone(state)),
            _ => None,
        }
    }

    /// Drops a cached entry. A running fetch is left alone.
    pub async fn invalidate(&self, pool_id: &PoolId) {
        let mut slots = self.slots.lock().await;
        if matches!(slots.get(pool_id), Some(Slot::Cached(_))) {
            slots.remove(pool_id);
            debug!(pool_id = %pool_id, "Invalidated cached pool state");
        }
    }

    /// Number of provider fetches issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn load(&self, pool_id: &PoolId, force: bool) -> Result<Arc<PoolState>, FetchError> {
        let mut rx = {
            let mut slots = self.slots.lock().await;
            let joined = match slots.get(pool_id) {
                Some(Slot::Cached(state)) if !force && self.is_fresh(state) => {
                    debug!(pool_id = %pool_id, "Pool state cache hit");
                    return Ok(Arc::clone(state));
                }
                Some(Slot::InFlight(rx)) => {
                    debug!(pool_id = %pool_id, "Joining in-flight pool state fetch");
                    Some(rx.clone())
                }
                _ => None,
            };
            match joined {
                Some(rx) => rx,
                None => self.start_fetch(*pool_id, &mut slots),
            }
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };
        match outcome {
            Some(outcome) => outcome,
            None => {
                self.clear_abandoned(pool_id, &rx).await;
                Err(FetchError::network("pool state fetch was abandoned"))
            }
        }
    }

    /// Drops an in-flight slot whose fetch task ended without an outcome,
    /// so the next call starts a new fetch.
    async fn clear_abandoned(
        &self,
        pool_id: &PoolId,
        rx: &watch::Receiver<Option<FetchOutcome>>,
    ) {
        let mut slots = self.slots.lock().await;
        if matches!(slots.get(pool_id), Some(Slot::InFlight(current)) if current.same_channel(rx)) {
            slots.remove(pool_id);
            warn!(pool_id = %pool_id, "Cleared abandoned pool state fetch");
        }
    }

    /// Registers an in-flight slot and spawns the fetch. Runs under the slots lock.
    fn start_fetch(
        &self,
        pool_id: PoolId,
        slots: &mut HashMap<PoolId, Slot>,
    ) -> watch::Receiver<Option<FetchOutcome>> {
        let (tx, rx) = watch::channel(None);
        slots.insert(pool_id, Slot::InFlight(rx.clone()));
        self.fetches.fetch_add(1, Ordering::SeqCst);
        debug!(pool_id = %pool_id, "Fetching pool state");

        let provider = Arc::clone(&self.provider);
        let slots = Arc::clone(&self.slots);
        let deadline = self.config.fetch_timeout;

        // Spawned so a caller dropping its future cannot strand other waiters.
        // The provider call gets its own task so a panic surfaces as a
        // JoinError here and the slot is still settled.
        tokio::spawn(async move {
            let mut fetch = tokio::spawn(async move { provider.fetch_pool_state(&pool_id).await });
            let outcome = match tokio::time::timeout(deadline, &mut fetch).await {
                Ok(Ok(Ok(state))) => Ok(Arc::new(state)),
                Ok(Ok(Err(e))) => Err(e),
                Ok(Err(e)) => Err(FetchError::network(format!("pool state fetch failed: {e}"))),
                Err(_) => {
                    fetch.abort();
                    Err(FetchError::Timeout(deadline))
                }
            };

            {
                let mut slots = slots.lock().await;
                match &outcome {
                    Ok(state) => {
                        slots.insert(pool_id, Slot::Cached(Arc::clone(state)));
                    }
                    Err(e) => {
                        warn!(pool_id = %pool_id, error = %e, "Pool state fetch failed");
                        slots.remove(&pool_id);
                    }
                }
            }
            let _ = tx.send(Some(outcome));
        });

        rx
    }

    fn is_fresh(&self, state: &PoolState) -> bool {
        match self.config.ttl {
            None => true,
            Some(ttl) => state.age().to_std().map(|age| age < ttl).unwrap_or(true),
        }
    }
}
