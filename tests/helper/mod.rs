#![allow(dead_code)]

pub mod index;
pub mod registry;

pub use index::*;
pub use registry::*;
