//! # XVAL Common Library
//!
//! Shared code for the XVAL crates:
//! - Error and result types
//! - TOML configuration (engine thresholds, penalties, logging)
//! - Tracing subscriber bootstrap

pub mod config;
pub mod error;
pub mod logging;

pub use config::TomlConfig;
pub use error::{Error, Result};
