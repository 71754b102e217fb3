use thiserror::Error;

/// Engine-wide error types for Homestead.
#[derive(Debug, Error)]
pub enum HomesteadError {
    /// Object storage or local persistence error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network error talking to an external collaborator.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed submission or listing data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Cross-validator agreement fell below the fallback threshold.
    /// Weight publication for the epoch must be withheld.
    #[error("Consensus failed for {epoch_id}: rate {agreement_rate:.3}, outliers {outliers:?}")]
    ConsensusFailed {
        epoch_id: String,
        agreement_rate: f64,
        outliers: Vec<String>,
    },

    /// An operation did not finish within its time bound.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for HomesteadError {
    fn from(e: serde_json::Error) -> Self {
        HomesteadError::Serialization(e.to_string())
    }
}
