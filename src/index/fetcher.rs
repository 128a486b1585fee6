//! Periodic conditional refresh of the cached index

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};

use crate::config::{Config, RefreshConfig};
use crate::index::IndexProvider;
use crate::index::disk::{self, IndexStore};
use crate::index::error::{FetchError, IndexError};
use crate::index::listeners::{Listener, Listeners, Subscription};
use crate::index::source::{FetchResponse, HttpIndexSource, IndexSource};

/// What a successful refresh attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New content was stored and listeners were notified.
    Updated,
    /// The cached copy is current; nothing was written.
    NotModified,
}

/// Bookkeeping of the refresh loop, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshState {
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub next_retry: Option<DateTime<Utc>>,
}

/// Keeps the on-disk index in sync with the remote one and tells listeners when it changes.
pub struct IndexFetcher {
    store: IndexStore,
    source: Arc<dyn IndexSource>,
    refresh: RefreshConfig,
    listeners: Listeners,
    state: Mutex<RefreshState>,
}

impl IndexFetcher {
    pub fn new(store: IndexStore, source: Arc<dyn IndexSource>, refresh: RefreshConfig) -> Self {
        Self {
            store,
            source,
            refresh,
            listeners: Listeners::default(),
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Builds a fetcher downloading `config.index_url` into `config.cache_dir()`.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let source = HttpIndexSource::new(&config.index_url.0, config.refresh.fetch_timeout())?;
        let cache_dir = config.cache_dir();
        info!("Using index cache at {:?}", cache_dir);
        Ok(Self::new(
            IndexStore::new(&cache_dir),
            Arc::new(source),
            config.refresh.clone(),
        ))
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Best-known index content: the cached copy, or the bundled one before the first
    /// successful download.
    pub fn load_index_from_disk(&self) -> Result<Vec<u8>, IndexError> {
        self.store.load()
    }

    /// Registers `listener` to run after every content change. It stays registered
    /// for as long as the returned [`Subscription`] is alive.
    pub fn add_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.listeners.add(Arc::new(listener))
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Performs one conditional fetch. The cache is only written on a 200 response
    /// carrying a complete JSON document.
    pub async fn refresh(&self) -> Result<RefreshOutcome, FetchError> {
        let etag = self.store.etag();
        if etag.is_none() {
            debug!("No cached validator, fetching index unconditionally");
        }

        let result = match self.source.fetch(etag).await {
            Ok(FetchResponse::NotModified) => Ok(RefreshOutcome::NotModified),
            Ok(FetchResponse::Modified { body, etag }) => disk::validate(&body)
                .map_err(FetchError::Corrupt)
                .and_then(|()| {
                    self.store
                        .store(&body, etag.as_deref())
                        .map_err(FetchError::from)
                })
                .map(|()| RefreshOutcome::Updated),
            Err(e) => Err(e),
        };

        {
            let mut state = self.lock_state();
            match &result {
                Ok(_) => {
                    state.last_success = Some(Utc::now());
                    state.consecutive_failures = 0;
                    state.next_retry = None;
                }
                Err(_) => state.consecutive_failures += 1,
            }
        }

        match &result {
            Ok(RefreshOutcome::Updated) => {
                info!("Index updated, notifying {} listeners", self.listeners.len());
                self.listeners.notify();
            }
            Ok(RefreshOutcome::NotModified) => info!("Index is up to date"),
            Err(e) => warn!("Index refresh failed: {}", e),
        }

        result
    }

    /// One scheduled cycle: an attempt followed by at most `max_retries` retries with
    /// exponential backoff. Returns `None` if every attempt failed.
    pub async fn refresh_with_retries(&self) -> Option<RefreshOutcome> {
        let mut attempt = 0;
        loop {
            match self.refresh().await {
                Ok(outcome) => return Some(outcome),
                Err(_) if attempt < self.refresh.max_retries => {
                    let delay = self.refresh.backoff(attempt);
                    self.lock_state().next_retry = chrono::Duration::from_std(delay)
                        .ok()
                        .map(|delay| Utc::now() + delay);
                    debug!("Retrying index refresh in {:?}", delay);
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Index refresh failed {} times, waiting for next period: {}",
                        attempt + 1,
                        e
                    );
                    self.lock_state().next_retry = None;
                    return None;
                }
            }
        }
    }

    /// Spawns the refresh loop: one cycle immediately, then one per configured interval.
    /// Cycles never overlap. The loop stops when the returned task is dropped.
    pub fn start(self: &Arc<Self>) -> RefreshTask {
        let fetcher = Arc::clone(self);
        let period = self.refresh.interval().max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                fetcher.refresh_with_retries().await;
            }
        });

        info!("Started index refresh every {:?}", period);
        RefreshTask { handle }
    }
}

impl IndexProvider for IndexFetcher {
    fn load_index(&self) -> Result<Vec<u8>, IndexError> {
        self.load_index_from_disk()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.listeners.add(listener)
    }
}

/// Handle to the background refresh loop; aborts it on drop.
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("Stopped index refresh");
    }
}
