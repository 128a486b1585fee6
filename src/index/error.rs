use thiserror::Error;

/// Errors from a single refresh attempt. All of them are recovered by the refresh loop.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    UnexpectedStatus(u16),

    #[error("Failed to decompress index: {0}")]
    Decompress(std::io::Error),

    #[error("Downloaded index is not valid JSON: {0}")]
    Corrupt(serde_json::Error),

    #[error("Failed to store index: {0}")]
    Storage(#[from] IndexError),
}

/// Errors from the local index store.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No cached index at {0} and no bundled fallback")]
    NoIndexAvailable(String),
}
