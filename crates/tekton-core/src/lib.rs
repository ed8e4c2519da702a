//! Tekton Core Library
//!
//! Shared functionality for the Tekton native helper programs:
//! - Environment contract published to launched children
//! - Tracing/logging initialization
//! - Common error types

pub mod env;
pub mod error;
pub mod tracing_init;

pub use error::{Error, Result};
