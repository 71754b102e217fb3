// crates/homestead-consensus/src/scoring.rs
//
// Per-zipcode competitive ranking.
//
// Submissions for a zipcode are evaluated strictly in submission-time order.
// The first three that pass every tier become winners (rank 1..3); those
// that clear tier 1 but fail tier 2 or 3 become participants; duplicate and
// tier-1 failures are excluded. Evaluation stops at the third winner: later
// submissions are never validated and so never become participants. All
// validators see the same sorted input and therefore stop at the same point.

use std::collections::BTreeMap;

use tokio::task::JoinSet;

use homestead_core::{EpochContext, Submission, ZipcodeResult};
use homestead_validate::MultiTierValidator;

/// Ranks the submissions of one zipcode.
#[derive(Clone)]
pub struct ZipcodeScorer {
    validator: MultiTierValidator,
}

/// Order submissions earliest-first; equal timestamps fall back to the
/// miner hotkey so the order is total.
pub fn sort_submissions(submissions: &mut [Submission]) {
    submissions.sort_by(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.miner_hotkey.cmp(&b.miner_hotkey))
    });
}

impl ZipcodeScorer {
    pub fn new(validator: MultiTierValidator) -> Self {
        Self { validator }
    }

    /// Rank one zipcode's submissions.
    ///
    /// Submissions addressed to a different zipcode are ignored.
    pub async fn rank(
        &self,
        zipcode: &str,
        mut submissions: Vec<Submission>,
        expected_count: Option<u32>,
        epoch: &EpochContext,
    ) -> ZipcodeResult {
        let before = submissions.len();
        submissions.retain(|s| s.zipcode == zipcode);
        if submissions.len() != before {
            tracing::warn!(
                "Zipcode {}: ignored {} submissions addressed to other zipcodes",
                zipcode,
                before - submissions.len()
            );
        }
        sort_submissions(&mut submissions);

        let epoch_zipcodes = epoch.zipcode_set();
        let mut result = ZipcodeResult::new(zipcode);

        for (idx, submission) in submissions.iter().enumerate() {
            if result.is_full() {
                result.skipped = submissions.len() - idx;
                break;
            }
            if result.is_winner(&submission.miner_hotkey) {
                tracing::debug!(
                    "Zipcode {}: miner {} already ranked, ignoring extra submission",
                    zipcode,
                    submission.miner_hotkey
                );
                continue;
            }

            let outcome = self
                .validator
                .validate(submission, expected_count, &epoch_zipcodes, &epoch.nonce)
                .await;
            result.evaluated += 1;

            if outcome.passed_all() {
                let winner = result.push_winner(
                    submission.miner_hotkey.clone(),
                    submission.listing_count(),
                    submission.submitted_at,
                );
                tracing::info!(
                    "Zipcode {}: miner {} ranked #{} ({} listings)",
                    zipcode,
                    winner.miner_hotkey,
                    winner.rank,
                    winner.listing_count
                );
            } else if outcome.is_participant() {
                result.participants.insert(submission.miner_hotkey.clone());
            }
        }

        debug_assert!(result.ranks_are_contiguous());
        tracing::info!(
            "Zipcode {}: {} winners, {} participants, {} evaluated, {} skipped",
            zipcode,
            result.winners.len(),
            result.participants.len(),
            result.evaluated,
            result.skipped
        );
        result
    }

    /// Rank every zipcode of an epoch.
    ///
    /// Zipcodes are independent and run as parallel tasks; within a zipcode
    /// evaluation stays sequential. Results are returned sorted by zipcode.
    pub async fn rank_epoch(
        &self,
        epoch: &EpochContext,
        submissions_by_zipcode: BTreeMap<String, Vec<Submission>>,
    ) -> Vec<ZipcodeResult> {
        let mut tasks = JoinSet::new();
        for (zipcode, submissions) in submissions_by_zipcode {
            let scorer = self.clone();
            let epoch = epoch.clone();
            tasks.spawn(async move {
                let expected = epoch.expected_for(&zipcode);
                scorer.rank(&zipcode, submissions, expected, &epoch).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                // A panicking zipcode task is an invariant violation.
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => tracing::error!("Zipcode ranking task cancelled: {}", e),
            }
        }
        results.sort_by(|a, b| a.zipcode.cmp(&b.zipcode));
        results
    }
}
