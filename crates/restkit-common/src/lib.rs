//! Restkit Common Library
//!
//! Shared error type and logging setup for the restkit workspace.
//!
//! # Example
//!
//! ```no_run
//! use restkit_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{RestkitError, Result};
