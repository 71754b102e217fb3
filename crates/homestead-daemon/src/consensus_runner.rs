// crates/homestead-daemon/src/consensus_runner.rs
//
// Epoch finalization for the Homestead validator daemon.
//
// Called by the scheduler once every registered miner has been evaluated:
//
// 1. Rank every zipcode's submissions (parallel across zipcodes, bounded
//    by the evaluation timeout)
// 2. Aggregate zipcode results into one normalized score set
// 3. Hash and publish this validator's consensus record      (Pending -> Hashed)
// 4. Compare against peers' records                          (Hashed -> Agreed | Fallback | Failed)
// 5. Resolve the score set to release (own, or the majority's)
// 6. Publish weights and announce the epoch winner
//
// A failed consensus returns `HomesteadError::ConsensusFailed` and a ranking
// that overruns its bound returns `HomesteadError::Timeout`. Nothing is
// published in either case; the scheduler retries the epoch on its next
// completion.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use homestead_consensus::aggregation::aggregate;
use homestead_consensus::agreement::ConsensusManager;
use homestead_consensus::scoring::ZipcodeScorer;
use homestead_consensus::state::{EpochConsensusMachine, EpochConsensusState};
use homestead_core::paths;
use homestead_core::{
    ChainClient, ConsensusStatus, EpochContext, EpochScoreSet, HomesteadError, ObjectStore,
    Submission,
};

use crate::epoch_events::EpochEvent;
use crate::shared::DaemonSharedState;

/// Public record of an epoch's top miner, written to `winners/{epoch}.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerAnnouncement {
    pub epoch_id: String,
    pub miner_hotkey: String,
    pub score: f64,
    pub consensus_status: ConsensusStatus,
    pub agreement_rate: f64,
    pub total_listings: usize,
    pub announced_by: String,
    pub announced_at: DateTime<Utc>,
}

pub struct ConsensusRunner {
    scorer: ZipcodeScorer,
    consensus: ConsensusManager,
    store: Arc<dyn ObjectStore>,
    chain: Arc<dyn ChainClient>,
    shared: DaemonSharedState,
    events: broadcast::Sender<EpochEvent>,
    /// Delay between publishing our record and reading peers'.
    peer_wait: Duration,
    /// Upper bound on ranking, which includes every tier-3 re-scrape.
    ranking_timeout: Duration,
}

impl ConsensusRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scorer: ZipcodeScorer,
        consensus: ConsensusManager,
        store: Arc<dyn ObjectStore>,
        chain: Arc<dyn ChainClient>,
        shared: DaemonSharedState,
        events: broadcast::Sender<EpochEvent>,
        peer_wait: Duration,
        ranking_timeout: Duration,
    ) -> Self {
        Self {
            scorer,
            consensus,
            store,
            chain,
            shared,
            events,
            peer_wait,
            ranking_timeout,
        }
    }

    /// Score, agree on, and publish one epoch.
    ///
    /// Returns the released score set.
    pub async fn run_epoch(
        &self,
        epoch: &EpochContext,
        submissions_by_zipcode: BTreeMap<String, Vec<Submission>>,
    ) -> Result<EpochScoreSet, HomesteadError> {
        let mut machine = EpochConsensusMachine::new(&epoch.epoch_id);

        let ranking = self.scorer.rank_epoch(epoch, submissions_by_zipcode);
        let zipcode_results = tokio::time::timeout(self.ranking_timeout, ranking)
            .await
            .map_err(|_| {
                HomesteadError::Timeout(format!(
                    "ranking epoch {} exceeded {:?}",
                    epoch.epoch_id, self.ranking_timeout
                ))
            })?;
        let scores = aggregate(&epoch.epoch_id, &zipcode_results);

        let record = self.consensus.build_record(scores, &epoch.nonce);
        self.consensus.publish(&record).await?;
        machine.transition(EpochConsensusState::Hashed)?;

        if !self.peer_wait.is_zero() {
            tokio::time::sleep(self.peer_wait).await;
        }

        let verdict = self
            .consensus
            .verify(&record.consensus_hash, &epoch.epoch_id)
            .await?;
        *self.shared.last_verdict.write().await = Some(verdict.clone());
        let _ = self.events.send(EpochEvent::ConsensusVerified {
            verdict: verdict.clone(),
        });
        machine.apply_status(verdict.status)?;

        let released = self.consensus.resolve(&verdict, &record).await?;
        debug_assert!(machine.current().is_publishable());

        if released.is_empty() {
            tracing::warn!(
                "Epoch {}: no miner earned a score, weights not published",
                epoch.epoch_id
            );
        } else {
            self.chain
                .publish_weights(&epoch.epoch_id, &released.miner_scores)
                .await?;
            self.announce_winner(&released, verdict.status, verdict.agreement_rate)
                .await?;
        }

        self.log_turnover(&released).await;
        *self.shared.baseline.write().await = Some(released.clone());
        *self.shared.last_finalized_epoch.write().await = Some(epoch.epoch_id.clone());

        let _ = self.events.send(EpochEvent::WeightsPublished {
            epoch_id: epoch.epoch_id.clone(),
            miners: released.miner_scores.len(),
            top_miner: released.top_miner().map(|(m, _)| m.to_string()),
        });
        Ok(released)
    }

    async fn announce_winner(
        &self,
        scores: &EpochScoreSet,
        status: ConsensusStatus,
        agreement_rate: f64,
    ) -> Result<(), HomesteadError> {
        let Some((miner, score)) = scores.top_miner() else {
            return Ok(());
        };
        let announcement = WinnerAnnouncement {
            epoch_id: scores.epoch_id.clone(),
            miner_hotkey: miner.to_string(),
            score,
            consensus_status: status,
            agreement_rate,
            total_listings: scores.summary.total_listings,
            announced_by: self.consensus.validator_hotkey().to_string(),
            announced_at: Utc::now(),
        };
        let path = paths::winner_path(&scores.epoch_id);
        self.store
            .put(&path, serde_json::to_vec(&announcement)?)
            .await?;
        tracing::info!(
            "Epoch {}: winner {} (score {:.4}) announced at {}",
            scores.epoch_id,
            miner,
            score,
            path
        );
        Ok(())
    }

    /// Compare the released scores against the previous epoch's baseline.
    async fn log_turnover(&self, released: &EpochScoreSet) {
        let baseline = self.shared.baseline.read().await;
        let Some(previous) = baseline.as_ref() else {
            return;
        };
        let retained = released
            .miner_scores
            .keys()
            .filter(|m| previous.miner_scores.contains_key(*m))
            .count();
        tracing::info!(
            "Epoch {}: {} of {} scored miners also scored in {}",
            released.epoch_id,
            retained,
            released.miner_scores.len(),
            previous.epoch_id
        );
    }
}
