// crates/homestead-core/src/assignment.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A zipcode assigned for an epoch, with the number of listings the
/// assignment service expects a diligent miner to find there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipcodeAssignment {
    pub zipcode: String,
    pub expected_listings: u32,
}

/// The full assignment for one epoch, as supplied by the assignment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochAssignment {
    pub epoch_id: String,
    /// Per-epoch nonce that seeds spot-check sampling and the consensus hash.
    pub nonce: String,
    pub zipcodes: Vec<ZipcodeAssignment>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl EpochAssignment {
    /// Build the read-only context validators and scorers work from.
    pub fn context(&self) -> EpochContext {
        EpochContext::new(
            self.epoch_id.clone(),
            self.nonce.clone(),
            self.zipcodes
                .iter()
                .map(|z| (z.zipcode.clone(), z.expected_listings)),
        )
    }
}

/// Read-only view of an epoch used during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochContext {
    pub epoch_id: String,
    pub nonce: String,
    /// zipcode -> expected listing count.
    pub expected: BTreeMap<String, u32>,
}

impl EpochContext {
    pub fn new(
        epoch_id: impl Into<String>,
        nonce: impl Into<String>,
        zipcodes: impl IntoIterator<Item = (String, u32)>,
    ) -> Self {
        Self {
            epoch_id: epoch_id.into(),
            nonce: nonce.into(),
            expected: zipcodes.into_iter().collect(),
        }
    }

    /// Expected listing count for a zipcode, if it was assigned.
    pub fn expected_for(&self, zipcode: &str) -> Option<u32> {
        self.expected.get(zipcode).copied()
    }

    /// The set of zipcodes assigned this epoch.
    pub fn zipcode_set(&self) -> BTreeSet<String> {
        self.expected.keys().cloned().collect()
    }
}
