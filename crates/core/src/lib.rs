//! Core types and configuration for the tickbar system.
//!
//! This crate provides shared types used across all other crates:
//! - Tick and bar-trigger types
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{BackfillConfig, Config, FilterConfig, ThresholdConfig};
pub use error::{Error, Result};
pub use types::*;
