use thiserror::Error;

/// Failure of a registry build, delivered to every caller waiting on that build
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Failed to load index: {0}")]
    Load(String),

    #[error("Registry build did not complete: {0}")]
    Aborted(String),
}
