//! Trackport Common Library
//!
//! Ambient pieces shared by trackport crates:
//!
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Errors**: [`CommonError`] for configuration, logging and filesystem failures
//! - **Filesystem**: directory bootstrap, YAML loading

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod fs;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
