// crates/homestead-consensus/src/batch.rs
//
// Deterministic batch selection and per-epoch evaluation tracking.
//
// The registered miner list is sorted and split into batches of
// `batch_size`. Which batch is evaluated depends only on the block height:
//
//   cycle = (current_block / blocks_per_cycle) mod ceil(n / batch_size)
//
// so every validator reading the same block evaluates the same miners.

use std::collections::BTreeSet;

/// Select the miners to evaluate at `current_block`.
///
/// Hotkeys are sorted and deduplicated first. When there are no more miners
/// than `batch_size` every miner is returned. The last batch may be short.
pub fn select_batch(
    current_block: u64,
    miners: &[String],
    batch_size: usize,
    blocks_per_cycle: u64,
) -> Vec<String> {
    let sorted: Vec<String> = miners
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let batch_size = batch_size.max(1);
    if sorted.len() <= batch_size {
        return sorted;
    }

    let batches = sorted.len().div_ceil(batch_size) as u64;
    let cycle = (current_block / blocks_per_cycle.max(1)) % batches;
    let start = cycle as usize * batch_size;
    let end = (start + batch_size).min(sorted.len());
    sorted[start..end].to_vec()
}

/// Tracks which registered miners have been evaluated in the current epoch.
#[derive(Debug, Clone, Default)]
pub struct EpochTracker {
    registered: BTreeSet<String>,
    evaluated: BTreeSet<String>,
}

impl EpochTracker {
    pub fn new(registered: impl IntoIterator<Item = String>) -> Self {
        Self {
            registered: registered.into_iter().collect(),
            evaluated: BTreeSet::new(),
        }
    }

    /// Replace the registered set. Evaluated miners that deregistered no
    /// longer count towards completion.
    pub fn update_registered(&mut self, registered: impl IntoIterator<Item = String>) {
        self.registered = registered.into_iter().collect();
    }

    /// Mark a batch of miners as evaluated.
    pub fn record_batch<'a>(&mut self, miners: impl IntoIterator<Item = &'a String>) {
        self.evaluated.extend(miners.into_iter().cloned());
    }

    /// An epoch is complete once every registered miner has been evaluated.
    /// An empty registry never completes.
    pub fn is_epoch_complete(&self) -> bool {
        !self.registered.is_empty() && self.registered.is_subset(&self.evaluated)
    }

    /// Clear the evaluated set and start tracking a new registered set.
    pub fn reset(&mut self, registered: impl IntoIterator<Item = String>) {
        self.registered = registered.into_iter().collect();
        self.evaluated.clear();
    }

    /// `(evaluated registered miners, registered miners)`.
    pub fn progress(&self) -> (usize, usize) {
        let done = self.registered.intersection(&self.evaluated).count();
        (done, self.registered.len())
    }

    pub fn is_evaluated(&self, miner: &str) -> bool {
        self.evaluated.contains(miner)
    }
}
