//! tokengate CLI library
//!
//! Command implementations behind the `tokengate` binary, exposed as a
//! library so they can be driven from tests.

#![forbid(unsafe_code)]

pub mod commands;

use std::path::Path;

use anyhow::{Context, Result};
use tokengate::config::TokengateConfig;

/// Service name used for the layered configuration lookup
pub const SERVICE_NAME: &str = "tokengate";

/// Load configuration from `path`, or from the layered lookup when absent
///
/// # Errors
///
/// Returns an error if a configuration source cannot be parsed.
pub fn load_config(path: Option<&Path>) -> Result<TokengateConfig> {
    match path {
        Some(path) => TokengateConfig::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => TokengateConfig::load_for_service(SERVICE_NAME)
            .context("Failed to load configuration"),
    }
}
