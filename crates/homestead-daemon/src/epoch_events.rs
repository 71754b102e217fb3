// crates/homestead-daemon/src/epoch_events.rs
//
// Events broadcast from the scheduler and consensus runner.
//
// The reporter task subscribes and turns them into the operator-facing log
// lines: per batch progress and, per epoch, consensus status, agreement
// rate, majority hash and outliers.

use tokio::sync::broadcast;

use homestead_core::ConsensusVerdict;

#[derive(Debug, Clone)]
pub enum EpochEvent {
    /// A batch finished evaluating.
    BatchEvaluated {
        epoch_id: String,
        block: u64,
        miners: usize,
        submissions: usize,
        timed_out: usize,
        evaluated: usize,
        registered: usize,
    },
    /// Every registered miner has been evaluated; consensus is starting.
    EpochCompleted { epoch_id: String, submissions: usize },
    /// Peer comparison finished.
    ConsensusVerified { verdict: ConsensusVerdict },
    /// Weights were accepted by the chain.
    WeightsPublished {
        epoch_id: String,
        miners: usize,
        top_miner: Option<String>,
    },
    /// The epoch could not be finalized and will be retried.
    EpochDeferred { epoch_id: String, reason: String },
}

/// Log every event until the channel closes.
pub async fn run_event_reporter(mut rx: broadcast::Receiver<EpochEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => report(&event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!("Event reporter lagged, {} events dropped", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn report(event: &EpochEvent) {
    match event {
        EpochEvent::BatchEvaluated {
            epoch_id,
            block,
            miners,
            submissions,
            timed_out,
            evaluated,
            registered,
        } => tracing::info!(
            "Epoch {} block {}: evaluated {} miners ({} submissions, {} timed out), progress {}/{}",
            epoch_id,
            block,
            miners,
            submissions,
            timed_out,
            evaluated,
            registered
        ),
        EpochEvent::EpochCompleted {
            epoch_id,
            submissions,
        } => tracing::info!(
            "Epoch {} complete with {} submissions, running consensus",
            epoch_id,
            submissions
        ),
        EpochEvent::ConsensusVerified { verdict } => {
            let line = format!(
                "Epoch {} consensus: status={} rate={:.3} validators={} majority={} outliers={:?}",
                verdict.epoch_id,
                verdict.status,
                verdict.agreement_rate,
                verdict.reporting_validators,
                verdict.majority_hash,
                verdict.outliers
            );
            if verdict.status.allows_publication() {
                tracing::info!("{}", line);
            } else {
                tracing::error!("{}", line);
            }
        }
        EpochEvent::WeightsPublished {
            epoch_id,
            miners,
            top_miner,
        } => tracing::info!(
            "Epoch {}: weights published for {} miners (winner {})",
            epoch_id,
            miners,
            top_miner.as_deref().unwrap_or("none")
        ),
        EpochEvent::EpochDeferred { epoch_id, reason } => {
            tracing::warn!("Epoch {} deferred: {}", epoch_id, reason)
        }
    }
}
