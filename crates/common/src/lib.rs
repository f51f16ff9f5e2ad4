//! Common utilities and shared types for qaboard.
//!
//! This crate provides foundational components used across all qaboard crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`BoardError`] and [`BoardResult`]
//!
//! # Example
//!
//! ```no_run
//! use qaboard_common::{BoardResult, Config};
//!
//! fn example() -> BoardResult<()> {
//!     let config = Config::load()?;
//!     config.validate()?;
//!     println!("Polling every {:?}", config.polling.interval());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;

pub use config::{BoardConfig, ColumnsConfig, Config, PollingConfig, SheetConfig};
pub use error::{BoardError, BoardResult};
