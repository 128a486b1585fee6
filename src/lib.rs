pub mod config;
pub mod index;
pub mod logging;
pub mod registry;
