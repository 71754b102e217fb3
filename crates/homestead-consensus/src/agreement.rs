// crates/homestead-consensus/src/agreement.rs
//
// Cross-validator agreement on an epoch's consensus hash.
//
// Each validator publishes a ConsensusRecord to shared object storage, then
// reads its peers' records for the same epoch and classifies agreement:
//
//   all hashes equal                     -> PERFECT_CONSENSUS
//   no peers                             -> NO_OTHER_VALIDATORS
//   majority share >= majority threshold -> MAJORITY_CONSENSUS
//   majority share >= fallback threshold -> MAJORITY_FALLBACK
//   otherwise                            -> CONSENSUS_FAILED
//
// The majority hash is the most common one; ties go to the lexicographically
// smallest hash so every validator picks the same one.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use homestead_core::paths;
use homestead_core::{
    ConsensusRecord, ConsensusStatus, ConsensusVerdict, EpochScoreSet, HomesteadError, ObjectStore,
};

use crate::hashing::consensus_hash;

/// Agreement thresholds, as fractions of reporting validators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusThresholds {
    pub majority: f64,
    pub fallback: f64,
}

impl Default for ConsensusThresholds {
    fn default() -> Self {
        Self {
            majority: 0.90,
            fallback: 0.70,
        }
    }
}

/// Classify agreement between this validator's hash and its peers' hashes.
///
/// `peers` holds `(validator_hotkey, hash)` pairs and must not include this
/// validator.
pub fn classify(
    epoch_id: &str,
    self_hotkey: &str,
    my_hash: &str,
    peers: &[(String, String)],
    thresholds: &ConsensusThresholds,
) -> ConsensusVerdict {
    if peers.is_empty() {
        return ConsensusVerdict {
            epoch_id: epoch_id.to_string(),
            status: ConsensusStatus::NoOtherValidators,
            agreement_rate: 1.0,
            majority_hash: my_hash.to_string(),
            outliers: Vec::new(),
            reporting_validators: 1,
        };
    }

    let mut all: Vec<(&str, &str)> = Vec::with_capacity(peers.len() + 1);
    all.push((self_hotkey, my_hash));
    all.extend(peers.iter().map(|(v, h)| (v.as_str(), h.as_str())));

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (_, hash) in &all {
        *counts.entry(hash).or_insert(0) += 1;
    }

    // Ascending iteration with strict `>` keeps the smallest hash on ties.
    let mut majority_hash = my_hash;
    let mut majority_count = 0;
    for (hash, &count) in &counts {
        if count > majority_count {
            majority_hash = hash;
            majority_count = count;
        }
    }

    let total = all.len();
    let agreement_rate = majority_count as f64 / total as f64;

    let mut outliers: Vec<String> = all
        .iter()
        .filter(|(_, hash)| *hash != majority_hash)
        .map(|(validator, _)| validator.to_string())
        .collect();
    outliers.sort();

    let status = if majority_count == total {
        ConsensusStatus::PerfectConsensus
    } else if agreement_rate >= thresholds.majority {
        ConsensusStatus::MajorityConsensus
    } else if agreement_rate >= thresholds.fallback {
        ConsensusStatus::MajorityFallback
    } else {
        ConsensusStatus::ConsensusFailed
    };

    ConsensusVerdict {
        epoch_id: epoch_id.to_string(),
        status,
        agreement_rate,
        majority_hash: majority_hash.to_string(),
        outliers,
        reporting_validators: total,
    }
}

/// Publishes this validator's consensus record and checks it against peers.
#[derive(Clone)]
pub struct ConsensusManager {
    validator_hotkey: String,
    store: Arc<dyn ObjectStore>,
    thresholds: ConsensusThresholds,
}

impl ConsensusManager {
    pub fn new(
        validator_hotkey: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        thresholds: ConsensusThresholds,
    ) -> Self {
        Self {
            validator_hotkey: validator_hotkey.into(),
            store,
            thresholds,
        }
    }

    pub fn validator_hotkey(&self) -> &str {
        &self.validator_hotkey
    }

    /// Canonical hash of a score set.
    pub fn hash(&self, scores: &EpochScoreSet, epoch_nonce: &str) -> String {
        consensus_hash(scores, epoch_nonce)
    }

    /// Build this validator's record for an epoch.
    pub fn build_record(&self, scores: EpochScoreSet, epoch_nonce: &str) -> ConsensusRecord {
        let consensus_hash = self.hash(&scores, epoch_nonce);
        ConsensusRecord {
            validator_hotkey: self.validator_hotkey.clone(),
            epoch_id: scores.epoch_id.clone(),
            epoch_nonce: epoch_nonce.to_string(),
            scores,
            consensus_hash,
            published_at: Utc::now(),
        }
    }

    /// Write this validator's record to shared storage.
    pub async fn publish(&self, record: &ConsensusRecord) -> Result<(), HomesteadError> {
        let path = paths::consensus_path(&record.epoch_id, &record.validator_hotkey);
        let bytes = serde_json::to_vec(record)?;
        self.store.put(&path, bytes).await?;
        tracing::info!(
            "Epoch {}: published consensus hash {} to {}",
            record.epoch_id,
            record.consensus_hash,
            path
        );
        Ok(())
    }

    /// Fetch peers' records for an epoch. This validator's own record and
    /// unreadable records are skipped.
    pub async fn fetch_peer_records(
        &self,
        epoch_id: &str,
    ) -> Result<Vec<ConsensusRecord>, HomesteadError> {
        let record_paths = self.store.list(&paths::consensus_prefix(epoch_id)).await?;
        let mut records = Vec::new();

        for path in record_paths {
            if paths::validator_from_consensus_path(&path) == Some(self.validator_hotkey.as_str()) {
                continue;
            }
            let Some(bytes) = self.store.get(&path).await? else {
                continue;
            };
            match serde_json::from_slice::<ConsensusRecord>(&bytes) {
                Ok(record) if record.epoch_id == epoch_id => records.push(record),
                Ok(record) => {
                    tracing::warn!(
                        "Consensus record {} claims epoch {}, expected {}",
                        path,
                        record.epoch_id,
                        epoch_id
                    );
                }
                Err(e) => {
                    tracing::warn!("Unreadable consensus record {}: {}", path, e);
                }
            }
        }

        Ok(records)
    }

    /// Compare this validator's hash against the peers' published hashes.
    pub async fn verify(
        &self,
        my_hash: &str,
        epoch_id: &str,
    ) -> Result<ConsensusVerdict, HomesteadError> {
        let peers: Vec<(String, String)> = self
            .fetch_peer_records(epoch_id)
            .await?
            .into_iter()
            .map(|r| (r.validator_hotkey, r.consensus_hash))
            .collect();

        let verdict = classify(
            epoch_id,
            &self.validator_hotkey,
            my_hash,
            &peers,
            &self.thresholds,
        );

        match verdict.status {
            ConsensusStatus::MajorityFallback => tracing::warn!(
                "Epoch {}: {} at {:.3} agreement, proceeding with majority hash {} (outliers {:?})",
                epoch_id,
                verdict.status,
                verdict.agreement_rate,
                verdict.majority_hash,
                verdict.outliers
            ),
            ConsensusStatus::ConsensusFailed => tracing::error!(
                "Epoch {}: {} at {:.3} agreement across {} validators \
                 (my hash {}, majority {}, outliers {:?})",
                epoch_id,
                verdict.status,
                verdict.agreement_rate,
                verdict.reporting_validators,
                my_hash,
                verdict.majority_hash,
                verdict.outliers
            ),
            _ => tracing::info!(
                "Epoch {}: {} at {:.3} agreement across {} validators",
                epoch_id,
                verdict.status,
                verdict.agreement_rate,
                verdict.reporting_validators
            ),
        }

        Ok(verdict)
    }

    /// Decide which score set to release for weight publication.
    ///
    /// Returns this validator's own scores when it holds the majority hash,
    /// the majority peer's scores when it is an outlier, and a
    /// `ConsensusFailed` error when agreement is insufficient.
    pub async fn resolve(
        &self,
        verdict: &ConsensusVerdict,
        mine: &ConsensusRecord,
    ) -> Result<EpochScoreSet, HomesteadError> {
        if !verdict.status.allows_publication() {
            return Err(HomesteadError::ConsensusFailed {
                epoch_id: verdict.epoch_id.clone(),
                agreement_rate: verdict.agreement_rate,
                outliers: verdict.outliers.clone(),
            });
        }

        if verdict.majority_hash == mine.consensus_hash {
            return Ok(mine.scores.clone());
        }

        tracing::warn!(
            "Epoch {}: local hash {} is an outlier, adopting majority hash {}",
            verdict.epoch_id,
            mine.consensus_hash,
            verdict.majority_hash
        );
        let peers = self.fetch_peer_records(&verdict.epoch_id).await?;
        peers
            .into_iter()
            .filter(|r| r.consensus_hash == verdict.majority_hash)
            // Only trust a peer whose scores actually hash to what it claims.
            .find(|r| consensus_hash(&r.scores, &r.epoch_nonce) == r.consensus_hash)
            .map(|r| r.scores)
            .ok_or_else(|| {
                HomesteadError::NotFound(format!(
                    "No verifiable record with majority hash {} for epoch {}",
                    verdict.majority_hash, verdict.epoch_id
                ))
            })
    }
}
