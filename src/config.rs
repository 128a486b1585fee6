use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default refresh interval in milliseconds (24 hours)
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Timeout for a single index download in milliseconds (30 seconds)
pub const FETCH_TIMEOUT_MS: u64 = 30_000;

/// Retries after a failed attempt, per refresh period
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry in milliseconds (1 minute)
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 60_000;

/// Upper bound for the retry delay in milliseconds (30 minutes)
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30 * 60 * 1000;

// =============================================================================
// Index location
// =============================================================================

/// Published Google Maven class index
pub const DEFAULT_INDEX_URL: &str =
    "https://dl.google.com/android/studio/gmaven/index/release/v0.1/classes-v0.1.json.gz";

/// Path of the cached (decompressed) index, relative to the cache directory
pub const INDEX_RELATIVE_PATH: &str = "v0.1/classes-v0.1.json";

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub index_url: IndexUrl,
    pub cache_dir: Option<PathBuf>,
    pub refresh: RefreshConfig,
}

/// URL of the remote index document
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct IndexUrl(pub String);

impl Default for IndexUrl {
    fn default() -> Self {
        Self(DEFAULT_INDEX_URL.to_string())
    }
}

/// Refresh schedule configuration. Durations are in milliseconds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RefreshConfig {
    pub interval: u64,
    pub max_retries: u32,
    pub initial_backoff: u64,
    pub max_backoff: u64,
    pub fetch_timeout: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REFRESH_INTERVAL_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff: DEFAULT_MAX_BACKOFF_MS,
            fetch_timeout: FETCH_TIMEOUT_MS,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout)
    }

    /// Delay before retry number `attempt` (0-based), doubling each time up to `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.initial_backoff.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff))
    }
}

impl Config {
    /// Loads configuration from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Directory holding the cached index files.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| DataPaths::from_env().cache_dir())
    }
}

/// Locations of everything gmaven-index keeps on the local machine.
///
/// The root is `$XDG_DATA_HOME/gmaven-index`, else `~/.local/share/gmaven-index`,
/// else `./gmaven-index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn from_env() -> Self {
        Self::resolve(std::env::var_os("XDG_DATA_HOME"), dirs::home_dir())
    }

    fn resolve(xdg_data_home: Option<OsString>, home_dir: Option<PathBuf>) -> Self {
        let base = xdg_data_home
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| home_dir.map(|home| home.join(".local/share")))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            root: base.join("gmaven-index"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default cache directory when the config does not name one.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("gmaven-index.log")
    }
}
