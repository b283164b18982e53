//! Schema module - Configuration types for capture runs.

mod config;

pub use config::*;
