//! triage-core: Shared types, configuration, and error handling for host triage.
//!
//! This crate provides the foundational types used across all triage components:
//! - Subnet prefixes and liveness results for the host sweep
//! - The persisted triage report
//! - Layered configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use error::{PrefixError, TriageError};
