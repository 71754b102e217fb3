// crates/homestead-core/src/traits.rs
//
// Interfaces of the external collaborators. The judgment engine only ever
// talks to the outside world through these traits.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::assignment::EpochAssignment;
use crate::error::HomesteadError;
use crate::listing::Listing;

/// Shared object storage used to exchange submissions and consensus records.
///
/// Implemented by homestead-store (RocksDB and in-memory backends).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes at a path. Overwrites if the path already exists.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), HomesteadError>;

    /// Retrieve the bytes stored at a path.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, HomesteadError>;

    /// List all paths starting with `prefix`, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, HomesteadError>;
}

/// Re-scrape service used by the tier-3 spot-check.
#[async_trait]
pub trait ListingVerifier: Send + Sync {
    /// Re-fetch the listing from its source and report whether it matches.
    async fn verify(&self, listing: &Listing) -> Result<bool, HomesteadError>;
}

/// Chain/registry client.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Hotkeys of all currently registered miners.
    async fn registered_miners(&self) -> Result<Vec<String>, HomesteadError>;

    /// Current chain block height.
    async fn current_block(&self) -> Result<u64, HomesteadError>;

    /// Publish a normalized miner weight map for an epoch.
    async fn publish_weights(
        &self,
        epoch_id: &str,
        weights: &BTreeMap<String, f64>,
    ) -> Result<(), HomesteadError>;
}

/// Service that assigns zipcodes and nonces to epochs.
#[async_trait]
pub trait AssignmentSource: Send + Sync {
    async fn get_epoch_assignment(&self, epoch_id: &str)
        -> Result<EpochAssignment, HomesteadError>;
}
