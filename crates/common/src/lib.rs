//! MediaShrink Common Utilities
//!
//! Shared infrastructure for all MediaShrink crates:
//! - Error taxonomy and result alias
//! - Human-readable size/time formatting
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod format;
pub mod logging;

pub use config::*;
pub use error::*;
pub use format::*;
