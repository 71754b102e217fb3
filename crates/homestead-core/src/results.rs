// crates/homestead-core/src/results.rs
//
// Per-zipcode ranking results and the per-epoch aggregated score set.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of ranked winners per zipcode.
pub const MAX_WINNERS: usize = 3;

/// Share of a zipcode's reward weight paid to ranks 1, 2 and 3.
pub const WINNER_REWARDS: [f64; MAX_WINNERS] = [0.55, 0.30, 0.10];

/// A ranked winner within one zipcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipcodeWinner {
    pub miner_hotkey: String,
    /// 1-based rank.
    pub rank: u8,
    /// Fraction of the zipcode's weight this rank earns.
    pub reward_fraction: f64,
    pub listing_count: usize,
    pub submitted_at: DateTime<Utc>,
}

/// Outcome of the competitive ranking for one zipcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipcodeResult {
    pub zipcode: String,
    /// Winners in rank order. At most `MAX_WINNERS`.
    pub winners: Vec<ZipcodeWinner>,
    /// Miners that cleared tier 1 but failed tier 2 or 3.
    pub participants: BTreeSet<String>,
    /// Sum of winners' listing counts. Participants do not contribute.
    pub total_listings_found: usize,
    /// Submissions that went through the validator.
    pub evaluated: usize,
    /// Submissions never evaluated because three winners were already found.
    pub skipped: usize,
}

impl ZipcodeResult {
    /// Create an empty result for a zipcode.
    pub fn new(zipcode: impl Into<String>) -> Self {
        Self {
            zipcode: zipcode.into(),
            winners: Vec::new(),
            participants: BTreeSet::new(),
            total_listings_found: 0,
            evaluated: 0,
            skipped: 0,
        }
    }

    /// Whether all winner slots are taken.
    pub fn is_full(&self) -> bool {
        self.winners.len() >= MAX_WINNERS
    }

    /// Whether the given miner already holds a winner slot.
    pub fn is_winner(&self, miner_hotkey: &str) -> bool {
        self.winners.iter().any(|w| w.miner_hotkey == miner_hotkey)
    }

    /// Append the next-ranked winner.
    ///
    /// # Panics
    /// Panics if all winner slots are already taken; callers must check
    /// `is_full` first. A fourth winner is a logic bug, not a data condition.
    pub fn push_winner(
        &mut self,
        miner_hotkey: impl Into<String>,
        listing_count: usize,
        submitted_at: DateTime<Utc>,
    ) -> &ZipcodeWinner {
        assert!(
            !self.is_full(),
            "zipcode {} already has {} winners",
            self.zipcode,
            MAX_WINNERS
        );
        let idx = self.winners.len();
        let miner_hotkey = miner_hotkey.into();
        self.participants.remove(&miner_hotkey);
        self.winners.push(ZipcodeWinner {
            miner_hotkey,
            rank: (idx + 1) as u8,
            reward_fraction: WINNER_REWARDS[idx],
            listing_count,
            submitted_at,
        });
        self.total_listings_found += listing_count;
        &self.winners[idx]
    }

    /// Check the cardinality and rank-contiguity invariants.
    pub fn ranks_are_contiguous(&self) -> bool {
        self.winners.len() <= MAX_WINNERS
            && self
                .winners
                .iter()
                .enumerate()
                .all(|(i, w)| w.rank as usize == i + 1)
    }
}

/// Summary counts carried alongside the epoch's score maps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Distinct miners paid from the flat participant pool.
    pub total_participants: usize,
    /// Winner placements across all zipcodes.
    pub total_winners: usize,
    /// Listings counted toward zipcode weights.
    pub total_listings: usize,
}

/// Aggregated scores for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochScoreSet {
    pub epoch_id: String,
    /// zipcode -> share of the epoch's listings. Sums to 1.0 when non-empty.
    pub zipcode_weights: BTreeMap<String, f64>,
    /// miner hotkey -> normalized score. Sums to 1.0 when non-empty.
    pub miner_scores: BTreeMap<String, f64>,
    pub summary: ScoreSummary,
}

impl EpochScoreSet {
    /// A score set with no winners and no scores.
    pub fn empty(epoch_id: impl Into<String>) -> Self {
        Self {
            epoch_id: epoch_id.into(),
            zipcode_weights: BTreeMap::new(),
            miner_scores: BTreeMap::new(),
            summary: ScoreSummary::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.miner_scores.is_empty()
    }

    /// The single highest-scoring miner of the epoch.
    ///
    /// Ties go to the lexicographically smallest hotkey.
    pub fn top_miner(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        // BTreeMap iterates in ascending key order, so strict `>` keeps the
        // smallest hotkey on ties.
        for (miner, &score) in &self.miner_scores {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((miner.as_str(), score)),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_winner_assigns_ranks_and_fractions() {
        let now = Utc::now();
        let mut result = ZipcodeResult::new("90210");
        result.participants.insert("m2".to_string());

        result.push_winner("m1", 98, now);
        result.push_winner("m2", 95, now);
        result.push_winner("m4", 97, now);

        assert!(result.is_full());
        assert!(result.ranks_are_contiguous());
        assert_eq!(result.total_listings_found, 98 + 95 + 97);
        assert_eq!(result.winners[1].rank, 2);
        assert!((result.winners[1].reward_fraction - 0.30).abs() < 1e-12);
        // A winner is never also a participant.
        assert!(!result.participants.contains("m2"));
    }

    #[test]
    #[should_panic(expected = "already has 3 winners")]
    fn test_fourth_winner_panics() {
        let now = Utc::now();
        let mut result = ZipcodeResult::new("90210");
        for m in ["a", "b", "c", "d"] {
            result.push_winner(m, 10, now);
        }
    }

    #[test]
    fn test_top_miner_tie_breaks_on_hotkey() {
        let mut set = EpochScoreSet::empty("e");
        set.miner_scores.insert("b".to_string(), 0.4);
        set.miner_scores.insert("a".to_string(), 0.4);
        set.miner_scores.insert("c".to_string(), 0.2);
        assert_eq!(set.top_miner(), Some(("a", 0.4)));

        assert_eq!(EpochScoreSet::empty("e").top_miner(), None);
    }
}
