//! Error types for the triage-agent crate.

use thiserror::Error;
use triage_core::TriageError;
use triage_sweep::SweepError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Core(#[from] TriageError),

    #[error(transparent)]
    Sweep(#[from] SweepError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
