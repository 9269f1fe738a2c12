//! Movies ETL Common Library
//!
//! Shared infrastructure for the movies-etl workspace:
//!
//! - **Logging**: centralized tracing setup with env-based configuration
//! - **Error Handling**: shared error and result types
//!
//! # Example
//!
//! ```no_run
//! use movies_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
