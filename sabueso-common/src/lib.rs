//! # sabueso common library
//!
//! Shared code for the sabueso tagging tools:
//! - Error taxonomy and result type
//! - Configuration and credentials loading

pub mod config;
pub mod error;

pub use config::{ConnectionParams, LoggingConfig, Normalization, TomlConfig};
pub use error::{Error, Result};
