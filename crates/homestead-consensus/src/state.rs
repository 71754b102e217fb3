// crates/homestead-consensus/src/state.rs
//
// Per-epoch consensus state machine.
//
// Valid transitions:
//   Pending -> Hashed -> Agreed | Fallback | Failed
//   Failed  -> Pending   (the epoch is retried on the next completion cycle)

use std::fmt;

use homestead_core::{ConsensusStatus, HomesteadError};

/// Consensus lifecycle of one epoch on this validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochConsensusState {
    /// Scores not yet computed.
    Pending,
    /// Score set hashed and published; waiting on peer comparison.
    Hashed,
    /// Perfect, majority, or solo agreement.
    Agreed,
    /// Agreement below the majority threshold but above the fallback floor.
    Fallback,
    /// Insufficient agreement; nothing may be published.
    Failed,
}

impl EpochConsensusState {
    /// Whether the epoch's scores may be released.
    pub fn is_publishable(&self) -> bool {
        matches!(
            self,
            EpochConsensusState::Agreed | EpochConsensusState::Fallback
        )
    }
}

impl fmt::Display for EpochConsensusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpochConsensusState::Pending => write!(f, "Pending"),
            EpochConsensusState::Hashed => write!(f, "Hashed"),
            EpochConsensusState::Agreed => write!(f, "Agreed"),
            EpochConsensusState::Fallback => write!(f, "Fallback"),
            EpochConsensusState::Failed => write!(f, "Failed"),
        }
    }
}

impl From<ConsensusStatus> for EpochConsensusState {
    fn from(status: ConsensusStatus) -> Self {
        match status {
            ConsensusStatus::PerfectConsensus
            | ConsensusStatus::NoOtherValidators
            | ConsensusStatus::MajorityConsensus => EpochConsensusState::Agreed,
            ConsensusStatus::MajorityFallback => EpochConsensusState::Fallback,
            ConsensusStatus::ConsensusFailed => EpochConsensusState::Failed,
        }
    }
}

/// Tracks the consensus state of a single epoch.
#[derive(Debug)]
pub struct EpochConsensusMachine {
    epoch_id: String,
    current: EpochConsensusState,
}

impl EpochConsensusMachine {
    /// Create a machine for an epoch, starting in `Pending`.
    pub fn new(epoch_id: impl Into<String>) -> Self {
        Self {
            epoch_id: epoch_id.into(),
            current: EpochConsensusState::Pending,
        }
    }

    pub fn epoch_id(&self) -> &str {
        &self.epoch_id
    }

    pub fn current(&self) -> EpochConsensusState {
        self.current
    }

    /// Attempt to transition to a new state.
    pub fn transition(&mut self, new_state: EpochConsensusState) -> Result<(), HomesteadError> {
        use EpochConsensusState::*;

        let valid = matches!(
            (self.current, new_state),
            (Pending, Hashed)
                | (Hashed, Agreed)
                | (Hashed, Fallback)
                | (Hashed, Failed)
                | (Failed, Pending)
        );

        if valid {
            tracing::info!(
                "Epoch {} consensus: {} -> {}",
                self.epoch_id,
                self.current,
                new_state
            );
            self.current = new_state;
            Ok(())
        } else {
            Err(HomesteadError::InvalidState(format!(
                "Invalid consensus transition for epoch {}: {} -> {}",
                self.epoch_id, self.current, new_state
            )))
        }
    }

    /// Move out of `Hashed` according to a verification status.
    pub fn apply_status(
        &mut self,
        status: ConsensusStatus,
    ) -> Result<EpochConsensusState, HomesteadError> {
        let next = EpochConsensusState::from(status);
        self.transition(next)?;
        Ok(next)
    }
}
