//! # Cartomantes Common
//!
//! Logging configuration and diagnostic helpers shared by the worker library and
//! its tooling.
//!
//! ## Features
//!
//! - `tracing` subscriber setup with pretty, compact and JSON output
//! - Diagnostic boundary helpers that turn failed results into log records

use std::fmt::Display;

pub mod logging;

pub use logging::{try_init_logging, LogConfig, LogFormat};

/// Extension trait for results whose failure must be observed but never propagated.
pub trait DiagnosticExt<T> {
    /// Log the error at `warn` with `context` and discard it.
    fn or_warn(self, context: &str) -> Option<T>;

    /// Log the error at `debug` with `context` and discard it.
    fn or_debug(self, context: &str) -> Option<T>;
}

impl<T, E: Display> DiagnosticExt<T> for Result<T, E> {
    fn or_warn(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(%error, "{context}");
                None
            }
        }
    }

    fn or_debug(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::debug!(%error, "{context}");
                None
            }
        }
    }
}
