// crates/homestead-consensus/src/aggregation.rs
//
// Cross-zipcode aggregation of one epoch's results into normalized miner
// scores.
//
// 1. zipcode_weight[z] = listings_found[z] / total listings found.
// 2. Each winner earns reward_fraction * zipcode_weight[z], accumulated
//    across every zipcode it won.
// 3. Participants that won nowhere split a flat PARTICIPANT_POOL equally.
// 4. Scores are normalized to sum to 1.0.
//
// Results are folded in zipcode order so float accumulation is identical on
// every validator regardless of the order the results arrived in.

use std::collections::{BTreeMap, BTreeSet};

use homestead_core::{EpochScoreSet, ScoreSummary, ZipcodeResult};

/// Flat reward shared by all non-winning participants of an epoch.
pub const PARTICIPANT_POOL: f64 = 0.05;

/// Per-epoch score accumulator keyed by miner hotkey.
///
/// Built fresh for every epoch and consumed by `into_normalized`, so no
/// score survives from one epoch to the next.
#[derive(Debug, Default)]
pub struct ScoreArena {
    scores: BTreeMap<String, f64>,
}

impl ScoreArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to a miner's running score.
    pub fn credit(&mut self, miner: &str, amount: f64) {
        *self.scores.entry(miner.to_string()).or_insert(0.0) += amount;
    }

    pub fn get(&self, miner: &str) -> f64 {
        self.scores.get(miner).copied().unwrap_or(0.0)
    }

    /// Normalize scores to sum to 1.0.
    ///
    /// If the scores sum to zero the map is returned unchanged.
    pub fn into_normalized(self) -> BTreeMap<String, f64> {
        let sum: f64 = self.scores.values().sum();
        if sum > 0.0 {
            self.scores
                .into_iter()
                .map(|(miner, score)| (miner, score / sum))
                .collect()
        } else {
            self.scores
        }
    }
}

/// Combine all zipcode results of an epoch into one score set.
///
/// An epoch with no counted listings yields an empty score set.
pub fn aggregate(epoch_id: &str, zipcode_results: &[ZipcodeResult]) -> EpochScoreSet {
    let mut ordered: Vec<&ZipcodeResult> = zipcode_results.iter().collect();
    ordered.sort_by(|a, b| a.zipcode.cmp(&b.zipcode));

    let total_epoch_listings: usize = ordered.iter().map(|r| r.total_listings_found).sum();
    if total_epoch_listings == 0 {
        tracing::info!("Epoch {}: no listings counted, empty score set", epoch_id);
        return EpochScoreSet::empty(epoch_id);
    }

    let mut listings_by_zipcode: BTreeMap<&str, usize> = BTreeMap::new();
    for result in &ordered {
        if result.total_listings_found > 0 {
            *listings_by_zipcode.entry(result.zipcode.as_str()).or_insert(0) +=
                result.total_listings_found;
        }
    }
    let zipcode_weights: BTreeMap<String, f64> = listings_by_zipcode
        .iter()
        .map(|(zip, &count)| (zip.to_string(), count as f64 / total_epoch_listings as f64))
        .collect();

    let mut arena = ScoreArena::new();
    let mut winners: BTreeSet<&str> = BTreeSet::new();
    let mut total_winners = 0;
    for result in &ordered {
        let weight = zipcode_weights.get(&result.zipcode).copied().unwrap_or(0.0);
        for winner in &result.winners {
            arena.credit(&winner.miner_hotkey, winner.reward_fraction * weight);
            winners.insert(winner.miner_hotkey.as_str());
            total_winners += 1;
        }
    }

    let participants: BTreeSet<&str> = ordered
        .iter()
        .flat_map(|r| r.participants.iter().map(String::as_str))
        .filter(|miner| !winners.contains(miner))
        .collect();
    if !participants.is_empty() {
        let share = PARTICIPANT_POOL / participants.len() as f64;
        for miner in &participants {
            arena.credit(miner, share);
        }
    }

    let miner_scores = arena.into_normalized();
    tracing::info!(
        "Epoch {}: aggregated {} zipcodes, {} winner placements, {} participants, {} listings",
        epoch_id,
        zipcode_weights.len(),
        total_winners,
        participants.len(),
        total_epoch_listings
    );

    EpochScoreSet {
        epoch_id: epoch_id.to_string(),
        zipcode_weights,
        miner_scores,
        summary: ScoreSummary {
            total_participants: participants.len(),
            total_winners,
            total_listings: total_epoch_listings,
        },
    }
}
