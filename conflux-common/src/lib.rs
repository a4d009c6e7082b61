//! # Conflux Common Library
//!
//! Shared code for the Conflux crates:
//! - Error type and result alias
//! - TOML configuration (matching thresholds, logging) and config-file resolution
//! - Identifier minting

pub mod config;
pub mod error;
pub mod uuid_utils;

pub use config::{LoggingConfig, MatchingConfig, TomlConfig};
pub use error::{Error, Result};
