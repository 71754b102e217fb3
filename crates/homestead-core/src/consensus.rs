// crates/homestead-core/src/consensus.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::results::EpochScoreSet;

/// One validator's declaration for an epoch, exchanged through object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub validator_hotkey: String,
    pub epoch_id: String,
    pub epoch_nonce: String,
    pub scores: EpochScoreSet,
    /// Hex SHA-256 of the canonical score representation.
    pub consensus_hash: String,
    pub published_at: DateTime<Utc>,
}

/// Classification of cross-validator agreement for an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusStatus {
    /// Every reporting validator published the same hash.
    PerfectConsensus,
    /// No peer records were found; this validator is authoritative.
    NoOtherValidators,
    /// The majority hash reached the configured threshold.
    MajorityConsensus,
    /// Below threshold but above the fallback floor; proceed with a warning.
    MajorityFallback,
    /// Insufficient agreement. Weight publication is withheld.
    ConsensusFailed,
}

impl ConsensusStatus {
    /// Whether scores may be released for weight publication.
    pub fn allows_publication(&self) -> bool {
        !matches!(self, ConsensusStatus::ConsensusFailed)
    }
}

impl fmt::Display for ConsensusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusStatus::PerfectConsensus => write!(f, "PERFECT_CONSENSUS"),
            ConsensusStatus::NoOtherValidators => write!(f, "NO_OTHER_VALIDATORS"),
            ConsensusStatus::MajorityConsensus => write!(f, "MAJORITY_CONSENSUS"),
            ConsensusStatus::MajorityFallback => write!(f, "MAJORITY_FALLBACK"),
            ConsensusStatus::ConsensusFailed => write!(f, "CONSENSUS_FAILED"),
        }
    }
}

/// Result of comparing this validator's hash against its peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusVerdict {
    pub epoch_id: String,
    pub status: ConsensusStatus,
    /// Fraction of reporting validators holding the majority hash.
    pub agreement_rate: f64,
    pub majority_hash: String,
    /// Validators whose hash differs from the majority, sorted.
    pub outliers: Vec<String>,
    /// Number of validators counted, including this one.
    pub reporting_validators: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&ConsensusStatus::MajorityFallback).unwrap();
        assert_eq!(json, "\"MAJORITY_FALLBACK\"");
        assert_eq!(
            ConsensusStatus::NoOtherValidators.to_string(),
            "NO_OTHER_VALIDATORS"
        );
    }

    #[test]
    fn test_only_failed_blocks_publication() {
        assert!(ConsensusStatus::PerfectConsensus.allows_publication());
        assert!(ConsensusStatus::MajorityFallback.allows_publication());
        assert!(!ConsensusStatus::ConsensusFailed.allows_publication());
    }
}
