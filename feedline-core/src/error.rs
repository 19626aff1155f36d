use thiserror::Error;

/// Errors surfaced by every client operation.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Stored or supplied key material could not be parsed
    #[error("Key format error: {0}")]
    KeyFormat(String),

    /// RSA key generation failed or was given an unusable size
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing was requested before any key pair exists
    #[error("No keypair available; generate or import one first")]
    NoKeypair,

    /// A public key could not be resolved to a profile
    #[error("Could not resolve {pubkey}: {reason}")]
    Resolution { pubkey: String, reason: String },

    /// Transport failure, non-2xx status, or a body we could not decode
    #[error("Network error: {0}")]
    Network(String),

    /// Rejected user input (empty draft, bad URL, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    pub fn resolution(pubkey: &str, reason: impl Into<String>) -> Self {
        FeedError::Resolution {
            pubkey: pubkey.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        FeedError::Network(e.to_string())
    }
}

impl From<garde::Report> for FeedError {
    fn from(report: garde::Report) -> Self {
        FeedError::Validation(report.to_string())
    }
}

/// Result type alias for client operations
pub type FeedResult<T> = Result<T, FeedError>;
