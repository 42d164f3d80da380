//! Mindshare Common - Shared types, utilities, and configuration for the
//! stance and mindshare pipeline.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers
//! - Small utility functions (duration parsing, truncation)

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    BurstConfig, Config, FlipConfig, LexiconConfig, ObservabilityConfig, PipelineConfig,
    ScorerConfig, StanceMeasure,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};
