// crates/homestead-daemon/src/scheduler.rs
//
// Epoch scheduler for the Homestead validator daemon.
//
// Every poll interval:
//   1. Resolve the epoch being scored (last completed window) and its
//      assignment from the epoch cache.
//   2. Read block height and registered miners from the chain.
//   3. Evaluate this block's deterministic batch, skipping miners already
//      evaluated this epoch, and pool their submissions.
//   4. Once every registered miner is evaluated, hand the pool to the
//      consensus runner.
//
// The evaluated set is reset only after a finalization attempt. An epoch in
// progress is kept when the wall-clock window rolls over, so registries that
// need more batch cycles than one window holds still complete; the newest
// window is picked up once it finalizes. A failed attempt keeps the pooled
// submissions and the epoch is retried on the next completion, unless the
// window has already moved on, in which case it is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use homestead_consensus::batch::{select_batch, EpochTracker};
use homestead_consensus::epoch::EpochClock;
use homestead_core::{ChainClient, EpochContext, EpochScoreSet, HomesteadError};

use crate::consensus_runner::ConsensusRunner;
use crate::epoch_cache::EpochCache;
use crate::epoch_events::EpochEvent;
use crate::evaluation::{BatchEvaluator, SubmissionPool};
use crate::shared::DaemonSharedState;

/// What a single scheduler tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The current epoch is already finalized.
    Idle,
    /// A batch was evaluated; the epoch is not complete yet.
    Evaluated { evaluated: usize, registered: usize },
    /// The epoch completed and its scores were released.
    Finalized(EpochScoreSet),
    /// The epoch completed but could not be finalized; it will be retried.
    Deferred(String),
}

struct EpochProgress {
    context: EpochContext,
    tracker: EpochTracker,
    pool: SubmissionPool,
}

pub struct EpochScheduler {
    chain: Arc<dyn ChainClient>,
    cache: EpochCache,
    evaluator: BatchEvaluator,
    runner: ConsensusRunner,
    shared: DaemonSharedState,
    events: broadcast::Sender<EpochEvent>,
    clock: EpochClock,
    batch_size: usize,
    blocks_per_cycle: u64,
    poll_interval: Duration,
    current: Option<EpochProgress>,
}

impl EpochScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        cache: EpochCache,
        evaluator: BatchEvaluator,
        runner: ConsensusRunner,
        shared: DaemonSharedState,
        events: broadcast::Sender<EpochEvent>,
        clock: EpochClock,
        batch_size: usize,
        blocks_per_cycle: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            chain,
            cache,
            evaluator,
            runner,
            shared,
            events,
            clock,
            batch_size,
            blocks_per_cycle,
            poll_interval,
            current: None,
        }
    }

    /// Run the scheduler loop until ctrl-c.
    pub async fn run(&mut self) -> Result<(), HomesteadError> {
        tracing::info!(
            "Epoch scheduler started (batch_size={}, blocks_per_cycle={}, poll={:?})",
            self.batch_size,
            self.blocks_per_cycle,
            self.poll_interval
        );

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Epoch scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    match self.tick(Utc::now()).await {
                        Ok(TickOutcome::Idle) => tracing::trace!("Epoch already finalized"),
                        Ok(TickOutcome::Evaluated { evaluated, registered }) => {
                            tracing::debug!("Epoch progress {}/{}", evaluated, registered)
                        }
                        Ok(TickOutcome::Finalized(scores)) => tracing::info!(
                            "Epoch {} finalized: {} miners scored",
                            scores.epoch_id,
                            scores.miner_scores.len()
                        ),
                        Ok(TickOutcome::Deferred(reason)) => {
                            tracing::warn!("Epoch finalization deferred: {}", reason)
                        }
                        // Collaborator outages degrade to "no work this tick".
                        Err(e) => tracing::warn!("Scheduler tick failed: {}", e),
                    }
                }
            }
        }

        Ok(())
    }

    /// Start scoring `epoch_id`.
    async fn enter_epoch(&mut self, epoch_id: &str) -> Result<(), HomesteadError> {
        let assignment = self.cache.get_or_fetch(epoch_id).await?;
        tracing::info!(
            "Scoring epoch {} ({} zipcodes)",
            epoch_id,
            assignment.zipcodes.len()
        );
        self.current = Some(EpochProgress {
            context: assignment.context(),
            tracker: EpochTracker::default(),
            pool: SubmissionPool::new(epoch_id),
        });
        Ok(())
    }

    /// The epoch to work on: the one in progress, otherwise the last
    /// completed window unless it is already finalized.
    async fn target_epoch(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, HomesteadError> {
        let latest = self.clock.epoch_id_for(now);
        if let Some(progress) = &self.current {
            if progress.context.epoch_id != latest {
                let (done, total) = progress.tracker.progress();
                tracing::debug!(
                    "Epoch {} still in progress ({}/{}), window {} is waiting",
                    progress.context.epoch_id,
                    done,
                    total,
                    latest
                );
            }
            return Ok(Some(progress.context.epoch_id.clone()));
        }
        if self.shared.is_finalized(&latest).await {
            return Ok(None);
        }
        self.enter_epoch(&latest).await?;
        Ok(Some(latest))
    }

    /// Run one scheduling step as of `now`.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, HomesteadError> {
        let Some(epoch_id) = self.target_epoch(now).await? else {
            return Ok(TickOutcome::Idle);
        };

        let block = self.chain.current_block().await?;
        let miners = self.chain.registered_miners().await?;

        let Some(progress) = self.current.as_mut() else {
            return Err(HomesteadError::InvalidState(
                "No epoch in progress after entering one".to_string(),
            ));
        };
        progress.tracker.update_registered(miners.iter().cloned());

        let batch: Vec<String> =
            select_batch(block, &miners, self.batch_size, self.blocks_per_cycle)
                .into_iter()
                .filter(|m| !progress.tracker.is_evaluated(m))
                .collect();

        if !batch.is_empty() {
            let outcome = self.evaluator.evaluate_batch(&progress.context, &batch).await;
            let found = outcome.submissions.len();
            let timed_out = outcome.timed_out.len();
            tracing::debug!(
                "Epoch {}: {} miners completed, {} objects rejected",
                epoch_id,
                outcome.completed.len(),
                outcome.rejected
            );
            for submission in outcome.submissions {
                progress.pool.insert(submission);
            }
            // Timed-out miners count as evaluated with nothing found.
            progress.tracker.record_batch(&batch);

            let (evaluated, registered) = progress.tracker.progress();
            let _ = self.events.send(EpochEvent::BatchEvaluated {
                epoch_id: epoch_id.clone(),
                block,
                miners: batch.len(),
                submissions: found,
                timed_out,
                evaluated,
                registered,
            });
        }

        if !progress.tracker.is_epoch_complete() {
            let (evaluated, registered) = progress.tracker.progress();
            return Ok(TickOutcome::Evaluated {
                evaluated,
                registered,
            });
        }

        let _ = self.events.send(EpochEvent::EpochCompleted {
            epoch_id: epoch_id.clone(),
            submissions: progress.pool.len(),
        });
        let by_zipcode = progress.pool.by_zipcode(&progress.context);
        let result = self.runner.run_epoch(&progress.context, by_zipcode).await;
        progress.tracker.reset(miners);

        match result {
            Ok(scores) => {
                self.current = None;
                Ok(TickOutcome::Finalized(scores))
            }
            Err(e) => {
                let reason = e.to_string();
                if self.clock.epoch_id_for(now) != epoch_id {
                    tracing::warn!(
                        "Epoch {} not finalized before its successor window, dropping it: {}",
                        epoch_id,
                        reason
                    );
                    self.current = None;
                }
                let _ = self.events.send(EpochEvent::EpochDeferred {
                    epoch_id,
                    reason: reason.clone(),
                });
                Ok(TickOutcome::Deferred(reason))
            }
        }
    }
}
