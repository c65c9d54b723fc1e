use thiserror::Error;

/// Top-level error type for the triage workspace.
#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid subnet prefix: {0}")]
    InvalidPrefix(#[from] PrefixError),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

/// Why a subnet prefix string was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrefixError {
    #[error("'{input}' has {found} dot-separated fields, expected 3")]
    FieldCount { input: String, found: usize },

    #[error("'{input}' contains invalid octet '{octet}' (must be 0-255)")]
    InvalidOctet { input: String, octet: String },
}
