//! Error types for the triage-sweep crate.

use thiserror::Error;
use triage_core::PrefixError;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid subnet prefix: {0}")]
    InvalidPrefix(#[from] PrefixError),

    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("Invalid scan settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, SweepError>;
