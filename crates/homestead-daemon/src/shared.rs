// crates/homestead-daemon/src/shared.rs
//
// DaemonSharedState: state shared between the scheduler and the consensus
// runner, plus what an operator would want to inspect.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use homestead_core::{ConsensusVerdict, EpochScoreSet};

#[derive(Clone)]
pub struct DaemonSharedState {
    /// Scores of the last finalized epoch; the baseline for the next one.
    pub baseline: Arc<RwLock<Option<EpochScoreSet>>>,
    /// Verdict of the most recent peer comparison.
    pub last_verdict: Arc<RwLock<Option<ConsensusVerdict>>>,
    /// Last epoch whose weights were published.
    pub last_finalized_epoch: Arc<RwLock<Option<String>>>,
    pub start_time: Instant,
}

impl DaemonSharedState {
    pub fn new() -> Self {
        Self {
            baseline: Arc::new(RwLock::new(None)),
            last_verdict: Arc::new(RwLock::new(None)),
            last_finalized_epoch: Arc::new(RwLock::new(None)),
            start_time: Instant::now(),
        }
    }

    pub async fn is_finalized(&self, epoch_id: &str) -> bool {
        self.last_finalized_epoch.read().await.as_deref() == Some(epoch_id)
    }
}

impl Default for DaemonSharedState {
    fn default() -> Self {
        Self::new()
    }
}
