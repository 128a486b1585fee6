//! Remote index fetching and durable local caching
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Source    │────▶│   Fetcher   │────▶│    Store    │
//! │ (HTTP GET)  │     │ (schedule)  │     │ (disk files)│
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │  Listeners  │
//!                     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`source`]: `IndexSource` trait and the HTTP implementation
//! - [`disk`]: content file + `.properties` sidecar, atomic replacement
//! - [`fetcher`]: conditional refresh, retry with backoff, periodic loop
//! - [`listeners`]: change listeners scoped to a `Subscription`
//! - [`error`]: error types for fetching and local storage

pub mod disk;
pub mod error;
pub mod fetcher;
pub mod listeners;
pub mod source;

use crate::index::error::IndexError;
use crate::index::listeners::{Listener, Subscription};

/// Read side of the index as seen by registry builders
pub trait IndexProvider: Send + Sync + 'static {
    /// Current best-known index bytes.
    fn load_index(&self) -> Result<Vec<u8>, IndexError>;

    /// Registers a listener called after each content change.
    fn subscribe(&self, listener: Listener) -> Subscription;
}
