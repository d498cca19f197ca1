//! # dvxr-common
//!
//! Shared types, configuration, and error handling used across all dvxr crates.
//! This is the foundation layer: no orchestration, just primitives and contracts.

pub mod config;
pub mod error;
pub mod models;

pub use error::{DvError, DvResult};
